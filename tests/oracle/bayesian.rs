use feijoa::oracle::bayesian::{Acquisition, Bayesian, RegressorKind};
use feijoa::{Configuration, Error, Oracle, Parameter, SearchSpace, Value};

fn space() -> SearchSpace {
    SearchSpace::new().with(Parameter::real("x", 0.0, 1.0).unwrap())
}

/// Fits on three fixed observations and scores three fixed candidates.
fn scores(acquisition: &str) -> Vec<f64> {
    let mut oracle = Bayesian::builder()
        .acquisition(acquisition)
        .seed(0)
        .build(space())
        .unwrap();
    for (x, y) in [(0.1, 1.0), (0.5, 0.2), (0.9, 0.7)] {
        oracle
            .tell(&Configuration::new("user").with("x", x), y)
            .unwrap();
    }
    oracle
        .score_candidates(&[vec![0.3], vec![0.7], vec![0.5]])
        .unwrap()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-8, "{actual:?} != {expected:?}");
    }
}

#[test]
fn test_ei_scores_are_reproducible() {
    assert_close(
        &scores("ei"),
        &[0.368_743_719_144_611_4, 0.191_078_213_528_033_17, 0.000_161_659_924_663_538],
    );
}

#[test]
fn test_poi_scores_are_reproducible() {
    assert_close(
        &scores("poi"),
        &[0.987_265_063_254_571_8, 0.862_154_273_715_312_3, 0.500_847_106_157_047_9],
    );
}

#[test]
fn test_ucb_scores_are_reproducible() {
    assert_close(
        &scores("ucb"),
        &[0.979_809_676_339_721, 0.791_347_143_465_261, 0.201_011_220_392_747_9],
    );
}

#[test]
fn test_warmup_then_guided_batches() {
    let mut oracle = Bayesian::builder()
        .n_warmup(4)
        .n_samples(200)
        .seed(3)
        .build(space())
        .unwrap();
    assert_eq!(oracle.acquisition(), Acquisition::Ei);

    let warmup = oracle.ask(1).unwrap();
    assert_eq!(warmup.len(), 4);
    for c in &warmup {
        let x = c.get("x").and_then(Value::as_f64).unwrap();
        oracle.tell(c, (x - 0.3).powi(2)).unwrap();
    }
    assert_eq!(oracle.n_observations(), 4);

    let guided = oracle.ask(3).unwrap();
    assert_eq!(guided.len(), 3);
    assert!(guided.iter().all(|c| c.requestor() == "bayesian"));
}

#[test]
fn test_non_finite_results_are_ignored() {
    let mut oracle = Bayesian::new(space(), 0);
    let c = Configuration::new("user").with("x", 0.5);
    oracle.tell(&c, f64::NAN).unwrap();
    oracle.tell(&c, f64::INFINITY).unwrap();
    assert_eq!(oracle.n_observations(), 0);
    assert!(oracle.score_candidates(&[vec![0.5]]).is_err());
}

#[test]
fn test_std_free_regressor_rejects_std_acquisitions() {
    let err = Bayesian::builder()
        .regressor(RegressorKind::parse("knn").unwrap())
        .acquisition("ucb")
        .build(space())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedAcquisition { .. }));

    let mut oracle = Bayesian::builder()
        .regressor(RegressorKind::parse("knn").unwrap())
        .acquisition("naive0")
        .n_warmup(2)
        .n_samples(50)
        .build(space())
        .unwrap();
    for c in oracle.ask(1).unwrap() {
        oracle.tell(&c, 1.0).unwrap();
    }
    assert_eq!(oracle.ask(2).unwrap().len(), 2);
}
