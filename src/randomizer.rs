//! Seeded baseline sampler.

use crate::configuration::Configuration;
use crate::parameter::{Categorical, Integer, ParametersVisitor, Real};
use crate::rng_util;
use crate::space::SearchSpace;
use crate::value::Value;

/// Draws one legal value per parameter from a seeded generator.
///
/// Used as the whole strategy of the random oracle and as the warm-up
/// sampler of the model-based oracles. The same seed always yields the same
/// sequence of draws, visiting parameters in search-space order.
///
/// # Examples
///
/// ```
/// use feijoa::{Parameter, Randomizer, SearchSpace};
///
/// let space = SearchSpace::new().with(Parameter::real("x", 0.0, 1.0).unwrap());
/// let mut a = Randomizer::new(7);
/// let mut b = Randomizer::new(7);
/// assert_eq!(a.sample(&space, "random"), b.sample(&space, "random"));
/// ```
#[derive(Clone, Debug)]
pub struct Randomizer {
    rng: fastrand::Rng,
}

impl Randomizer {
    /// Creates a randomizer with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Draws a full configuration tagged with `requestor`.
    pub fn sample(&mut self, space: &SearchSpace, requestor: &str) -> Configuration {
        let pairs = space
            .iter()
            .map(|p| (p.name().to_owned(), p.accept(self)))
            .collect();
        Configuration::from_pairs(pairs, requestor)
    }

    /// A uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.f64()
    }

    /// Mutable access to the underlying generator.
    pub(crate) fn rng(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }
}

impl ParametersVisitor for Randomizer {
    type Output = Value;

    fn visit_integer(&mut self, param: &Integer) -> Value {
        Value::Int(self.rng.i64(param.low()..=param.high()))
    }

    fn visit_real(&mut self, param: &Real) -> Value {
        Value::Real(rng_util::f64_range(
            &mut self.rng,
            param.low(),
            param.high(),
        ))
    }

    fn visit_categorical(&mut self, param: &Categorical) -> Value {
        let idx = self.rng.usize(0..param.choices().len());
        param.choices()[idx].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;

    #[test]
    fn draws_stay_in_bounds() {
        let space = SearchSpace::new()
            .with(Parameter::integer("n", -2, 2).unwrap())
            .with(Parameter::real("x", 1.0, 3.0).unwrap())
            .with(Parameter::categorical("c", ["a", "b"]).unwrap());
        let mut r = Randomizer::new(42);
        for _ in 0..200 {
            let c = r.sample(&space, "t");
            let n = c.get("n").and_then(Value::as_i64).unwrap();
            assert!((-2..=2).contains(&n));
            let x = c.get("x").and_then(Value::as_f64).unwrap();
            assert!((1.0..3.0).contains(&x));
            let s = c.get("c").and_then(Value::as_str).unwrap();
            assert!(s == "a" || s == "b");
        }
    }

    #[test]
    fn different_seeds_differ() {
        let space = SearchSpace::new().with(Parameter::real("x", 0.0, 1.0).unwrap());
        let a = Randomizer::new(1).sample(&space, "t");
        let b = Randomizer::new(2).sample(&space, "t");
        assert_ne!(a, b);
    }
}
