use feijoa::oracle::genetic::{
    Algorithm, CmaEs, DifferentialEvolution, GeneticAlgorithm, GeneticOracle, ParticleSwarm,
};
use feijoa::{Configuration, Oracle, Parameter, SearchSpace, Value};

fn space() -> SearchSpace {
    SearchSpace::new()
        .with(Parameter::real("x", -5.0, 5.0).unwrap())
        .with(Parameter::real("y", -5.0, 5.0).unwrap())
}

fn sphere(c: &Configuration) -> f64 {
    let x = c.get("x").and_then(Value::as_f64).unwrap();
    let y = c.get("y").and_then(Value::as_f64).unwrap();
    (x - 1.0).powi(2) + (y + 2.0).powi(2)
}

/// Runs `generations` full ask/tell rounds and returns the best result.
fn run<A: Algorithm>(oracle: &mut GeneticOracle<A>, generations: usize) -> f64 {
    for _ in 0..generations {
        for c in oracle.ask(1).unwrap() {
            let r = sphere(&c);
            oracle.tell(&c, r).unwrap();
        }
    }
    oracle.best()
}

#[test]
fn test_every_backend_improves_on_sphere() {
    let mut de = GeneticOracle::new("de", space(), DifferentialEvolution::new(1));
    let mut cma = GeneticOracle::new("cmaes", space(), CmaEs::new(2));
    let mut pso = GeneticOracle::new("pso", space(), ParticleSwarm::new(3));
    let mut ga = GeneticOracle::new("ga", space(), GeneticAlgorithm::new(4));

    assert!(run(&mut de, 40) < 0.5, "de stalled at {}", de.best());
    assert!(run(&mut cma, 40) < 0.5, "cmaes stalled at {}", cma.best());
    assert!(run(&mut pso, 40) < 0.5, "pso stalled at {}", pso.best());
    assert!(run(&mut ga, 40) < 0.5, "ga stalled at {}", ga.best());
}

#[test]
fn test_generation_members_stay_in_bounds() {
    let mut oracle = GeneticOracle::new("cmaes", space(), CmaEs::new(9));
    for _ in 0..5 {
        for c in oracle.ask(1).unwrap() {
            for name in ["x", "y"] {
                let v = c.get(name).and_then(Value::as_f64).unwrap();
                assert!((-5.0..=5.0).contains(&v));
            }
            assert!(c.request_id().is_some());
            oracle.tell(&c, 100.0).unwrap();
        }
    }
}

#[test]
fn test_foreign_improvement_enters_elite() {
    let mut oracle = GeneticOracle::new("de", space(), DifferentialEvolution::new(5));
    run(&mut oracle, 2);
    let before = oracle.best();
    assert!(before > 0.0);

    let optimum = Configuration::new("random").with("x", 1.0).with("y", -2.0);
    oracle.tell(&optimum, 0.0).unwrap();
    assert!((oracle.best() - 0.0).abs() < f64::EPSILON);
    assert_eq!(oracle.elite()[0], (vec![1.0, -2.0], 0.0));

    // The restarted population is still asked and told normally
    let next = oracle.ask(1).unwrap();
    assert!(!next.is_empty());
    for c in &next {
        oracle.tell(c, sphere(c)).unwrap();
    }
}

#[test]
fn test_foreign_configuration_outside_space_is_an_error() {
    let mut oracle = GeneticOracle::new("pso", space(), ParticleSwarm::new(0));
    let stray = Configuration::new("random").with("z", 1.0);
    assert!(oracle.tell(&stray, 1.0).is_err());
}
