use std::io::Write;

use feijoa::parameter::{ParameterKind, ParameterMeta};
use feijoa::{Configuration, Error, Parameter, SearchSpace, Value};
use proptest::prelude::*;

#[test]
fn test_invalid_declarations_are_rejected() {
    assert!(matches!(
        Parameter::integer("x", 5, 1),
        Err(Error::IncorrectInputValues { .. })
    ));
    assert!(matches!(
        Parameter::real("y", 1.0, 0.0),
        Err(Error::IncorrectInputValues { .. })
    ));
    assert!(Parameter::real("y", f64::NEG_INFINITY, 0.0).is_err());
    assert!(Parameter::real("", 0.0, 1.0).is_err());
    assert!(Parameter::categorical("z", Vec::<&str>::new()).is_err());
    assert!(Parameter::categorical("z", ["a", "b", "a"]).is_err());

    // Degenerate ranges are allowed
    assert!(Parameter::integer("x", 3, 3).is_ok());
    assert!(Parameter::real("y", 0.5, 0.5).is_ok());
}

#[test]
fn test_integer_unit_values_stay_inside_the_interval() {
    let x = Parameter::integer("x", 0, 10).unwrap();
    let low = x.get_unit_value(&Value::Int(0)).unwrap();
    let high = x.get_unit_value(&Value::Int(10)).unwrap();
    assert!((low - 0.045_454_545).abs() < 1e-6, "low maps to {low}");
    assert!((high - 0.954_545_454).abs() < 1e-6, "high maps to {high}");

    for (lo, hi) in [(0, 0), (-5, 5), (1, 2), (-100, 3)] {
        let p = Parameter::integer("n", lo, hi).unwrap();
        for v in [lo, hi] {
            let u = p.get_unit_value(&Value::Int(v)).unwrap();
            assert!(u > 0.0 && u < 1.0, "{v} in [{lo}, {hi}] maps to {u}");
            assert_eq!(p.from_unit_value(u).unwrap(), Value::Int(v));
        }
    }
}

#[test]
fn test_categorical_has_no_unit_mapping() {
    let z = Parameter::categorical("z", ["foo", "bar"]).unwrap();
    assert!(!z.is_primitive());
    assert!(z.get_unit_value(&Value::from("foo")).is_err());
    assert!(z.from_unit_value(0.5).is_err());
}

#[test]
fn test_vector_encoding() {
    let space = SearchSpace::new()
        .with(Parameter::integer("n", 1, 4).unwrap())
        .with(Parameter::real("lr", 0.0, 1.0).unwrap())
        .with(Parameter::categorical("opt", ["sgd", "adam", "rmsprop"]).unwrap());
    assert_eq!(space.bounds(), vec![(1.0, 4.0), (0.0, 1.0), (0.0, 2.0)]);

    let config = Configuration::new("user")
        .with("n", 3)
        .with("lr", 0.25)
        .with("opt", "adam");
    assert_eq!(space.to_vector(&config).unwrap(), vec![3.0, 0.25, 1.0]);

    // Out-of-range coordinates are rounded and clamped on the way back
    let back = space.from_vector(&[3.6, 1.7, -0.2], "de");
    assert_eq!(back.get("n"), Some(&Value::Int(4)));
    assert_eq!(back.get("lr"), Some(&Value::Real(1.0)));
    assert_eq!(back.get("opt"), Some(&Value::from("sgd")));
    assert_eq!(back.requestor(), "de");

    let missing = Configuration::new("user").with("n", 3);
    assert!(matches!(
        space.to_vector(&missing),
        Err(Error::UnknownParameter(name)) if name == "lr"
    ));
}

#[test]
fn test_search_space_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "params:
  - name: depth
    type: integer
    low: 1
    high: 8
  - name: lr
    type: real
    low: 0.0001
    high: 0.1
  - name: opt
    type: categorical
    choices: [sgd, adam]"
    )
    .unwrap();

    let space = SearchSpace::from_yaml_file(file.path()).unwrap();
    assert_eq!(space.names(), vec!["depth", "lr", "opt"]);
    assert_eq!(space.get("depth"), Some(&Parameter::integer("depth", 1, 8).unwrap()));
    assert_eq!(space.bounds()[1], (0.0001, 0.1));
}

#[test]
fn test_yaml_bare_sequence_and_aliases() {
    let space = SearchSpace::from_yaml_str(
        "- {name: n, type: int, low: 0, high: 3}
- {name: x, type: float, low: -1, high: 1}",
    )
    .unwrap();
    assert_eq!(space.len(), 2);
    assert_eq!(space.bounds(), vec![(0.0, 3.0), (-1.0, 1.0)]);
}

#[test]
fn test_bad_yaml_is_reported() {
    assert!(matches!(
        SearchSpace::from_yaml_str("params: [1, 2"),
        Err(Error::Yaml(_))
    ));
    assert!(matches!(
        SearchSpace::from_yaml_str("- {name: n, type: integer, low: 4, high: 1}"),
        Err(Error::IncorrectInputValues { .. })
    ));
    assert!(matches!(
        SearchSpace::from_yaml_file("/definitely/not/here.yaml"),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_metadata_round_trip() {
    let space = SearchSpace::new()
        .with(Parameter::integer("n", -2, 2).unwrap())
        .with(Parameter::categorical("flag", [true, false]).unwrap());
    let metas = space.to_metadata();
    assert_eq!(metas[0].kind, ParameterKind::Integer);
    assert_eq!(SearchSpace::from_metadata(&metas).unwrap(), space);

    let json = serde_json::to_string(&metas).unwrap();
    let back: Vec<ParameterMeta> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, metas);
}

proptest! {
    /// Property: both bounds of any integer range map strictly inside (0, 1)
    #[test]
    fn prop_integer_bounds_stay_inside_unit_interval(a in any::<i64>(), b in any::<i64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p = Parameter::integer("n", lo, hi).unwrap();
        for v in [lo, hi] {
            let u = p.get_unit_value(&Value::Int(v)).unwrap();
            prop_assert!(u > 0.0 && u < 1.0, "{} in [{}, {}] maps to {}", v, lo, hi, u);
        }
    }

    /// Property: every integer maps back to itself
    #[test]
    fn prop_integer_unit_value_round_trips(
        lo in -(1_i64 << 40)..(1_i64 << 40),
        width in 0_i64..(1 << 20),
        pick in 0_i64..(1 << 20),
    ) {
        let hi = lo + width;
        let v = lo + pick % (width + 1);
        let p = Parameter::integer("n", lo, hi).unwrap();
        let u = p.get_unit_value(&Value::Int(v)).unwrap();
        prop_assert_eq!(p.from_unit_value(u).unwrap(), Value::Int(v));
    }
}
