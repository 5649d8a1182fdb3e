use feijoa::oracle::SeedOracle;
use feijoa::{Configuration, Oracle};

#[test]
fn test_seeds_are_emitted_once() {
    let seeds = vec![
        Configuration::new("user").with("x", 1),
        Configuration::new("user").with("x", 2),
        Configuration::new("user").with("x", 3),
    ];
    let mut oracle = SeedOracle::new(seeds.clone());
    assert!(oracle.is_seed());

    let batch = oracle.ask(1).unwrap();
    assert_eq!(batch.len(), 3);
    for (emitted, seed) in batch.iter().zip(&seeds) {
        assert!(emitted.same_params(seed));
        assert_eq!(emitted.requestor(), "seed");
    }
    for _ in 0..3 {
        assert!(oracle.ask(10).is_none());
    }
    oracle.tell(&batch[0], 0.5).unwrap();
}
