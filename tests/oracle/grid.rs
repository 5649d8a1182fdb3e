use feijoa::oracle::Grid;
use feijoa::{Oracle, Parameter, SearchSpace, Value};

fn space() -> SearchSpace {
    SearchSpace::new()
        .with(Parameter::integer("x", 0, 2).unwrap())
        .with(Parameter::real("y", 0.0, 0.5).unwrap())
        .with(Parameter::categorical("z", ["foo", "bar"]).unwrap())
}

#[test]
fn test_grid_enumerates_product_in_order() {
    let mut grid = Grid::new(space());
    assert_eq!(grid.grid_size(), 36);

    let mut seen = Vec::new();
    while let Some(batch) = grid.ask(5) {
        assert!(batch.len() <= 5);
        seen.extend(batch);
    }
    assert_eq!(seen.len(), 36);
    assert!(grid.is_exhausted());
    assert!(grid.ask(1).is_none());

    let ys = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5];
    let mut i = 0;
    for x in 0..=2 {
        for y in ys {
            for z in ["foo", "bar"] {
                let c = &seen[i];
                assert_eq!(c.get("x"), Some(&Value::Int(x)), "config {i}");
                assert_eq!(c.get("y"), Some(&Value::Real(y)), "config {i}");
                assert_eq!(c.get("z"), Some(&Value::from(z)), "config {i}");
                assert_eq!(c.requestor(), "grid");
                i += 1;
            }
        }
    }
}

#[test]
fn test_grid_step_controls_real_axis() {
    let mut grid = Grid::builder().step(0.25).build(space()).unwrap();
    assert_eq!(grid.grid_size(), 3 * 3 * 2);
    assert_eq!(grid.ask(100).unwrap().len(), 18);

    assert!(Grid::builder().step(0.0).build(space()).is_err());
}
