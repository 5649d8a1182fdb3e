//! Pattern (template) search.
//!
//! Starting from a random center, the oracle probes one parameter at a time:
//! numeric parameters are moved by `± step` in unit space, categorical ones
//! are re-drawn. After a full sweep the best configuration told so far
//! becomes the new center; when the center does not move the step is halved.

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::randomizer::Randomizer;
use crate::space::SearchSpace;

const DEFAULT_STEP: f64 = 0.1;

/// Where the next `ask` resumes.
#[derive(Clone, Copy, Debug)]
enum Phase {
    /// No center yet.
    Uninitialized,
    /// Sweeping; the next probed parameter.
    Sweep(usize),
}

/// Coordinate pattern search around the best known configuration.
#[derive(Clone, Debug)]
pub struct PatternSearch {
    name: String,
    space: SearchSpace,
    randomizer: Randomizer,
    step: f64,
    phase: Phase,
    center: Option<Configuration>,
    best: Option<(Configuration, f64)>,
}

impl PatternSearch {
    /// Creates a pattern search with the default initial step of 0.1.
    #[must_use]
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            name: "pattern".to_owned(),
            space,
            randomizer: Randomizer::new(seed),
            step: DEFAULT_STEP,
            phase: Phase::Uninitialized,
            center: None,
            best: None,
        }
    }

    /// Creates an oracle with a custom initial step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] unless `0 < step <= 1`.
    pub fn with_step(space: SearchSpace, seed: u64, step: f64) -> Result<Self> {
        if !(step > 0.0 && step <= 1.0) {
            return Err(Error::invalid_param("pattern", "step", "must be in (0, 1]"));
        }
        let mut oracle = Self::new(space, seed);
        oracle.step = step;
        Ok(oracle)
    }

    /// Current step size in unit space.
    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Current center, once the first batch has been produced.
    #[must_use]
    pub fn center(&self) -> Option<&Configuration> {
        self.center.as_ref()
    }

    /// Moves the center to the best told configuration, halving the step
    /// when that does not change anything.
    fn recenter(&mut self) {
        let moved = match (&self.center, &self.best) {
            (None, _) => return,
            (Some(center), Some((best, _))) if !best.same_params(center) => Some(best.clone()),
            (Some(_), _) => None,
        };
        if let Some(mut next) = moved {
            next.set_requestor(self.name.clone());
            self.center = Some(next);
        } else {
            self.step *= 0.5;
            trace_debug!(oracle = %self.name, step = self.step, "pattern step halved");
        }
    }

    /// Probes around `center` along parameter `index`.
    fn probe(&mut self, center: &Configuration, index: usize) -> Vec<Configuration> {
        let Some(param) = self.space.iter().nth(index) else {
            return Vec::new();
        };
        let name = param.name().to_owned();

        if !param.is_primitive() {
            let value = param.accept(&mut self.randomizer);
            return vec![center.clone().with(name, value)];
        }

        let unit = center
            .get(&name)
            .and_then(|v| param.get_unit_value(v).ok())
            .unwrap_or(0.5);
        [unit - self.step, unit + self.step]
            .into_iter()
            .filter_map(|u| param.from_unit_value(u.clamp(0.0, 1.0)).ok())
            .map(|value| center.clone().with(name.clone(), value))
            .collect()
    }
}

impl Oracle for PatternSearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, _n: usize) -> Option<Vec<Configuration>> {
        let index = match self.phase {
            Phase::Uninitialized => {
                let center = self.randomizer.sample(&self.space, &self.name);
                self.center = Some(center.clone());
                self.phase = Phase::Sweep(0);
                return Some(vec![center]);
            }
            Phase::Sweep(i) if i >= self.space.len() => {
                self.recenter();
                0
            }
            Phase::Sweep(i) => i,
        };
        self.phase = Phase::Sweep(index + 1);

        let center = self.center.clone()?;
        if self.space.is_empty() {
            return Some(vec![center]);
        }
        let mut batch = self.probe(&center, index);
        for config in &mut batch {
            config.set_requestor(self.name.clone());
        }
        Some(batch)
    }

    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()> {
        if result.is_nan() {
            return Ok(());
        }
        let improves = self.best.as_ref().is_none_or(|(_, best)| result < *best);
        if improves {
            self.best = Some((config.clone(), result));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use crate::value::Value;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with(Parameter::real("x", 0.0, 1.0).unwrap())
            .with(Parameter::categorical("c", ["a", "b", "c"]).unwrap())
    }

    #[test]
    fn first_ask_is_the_center() {
        let mut oracle = PatternSearch::new(space(), 3);
        let first = oracle.ask(10).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(oracle.center(), Some(&first[0]));
    }

    #[test]
    fn sweeps_numeric_then_categorical() {
        let mut oracle = PatternSearch::new(space(), 3);
        let center = oracle.ask(1).unwrap().remove(0);
        let x0 = center.get("x").and_then(Value::as_f64).unwrap();

        let numeric = oracle.ask(1).unwrap();
        assert_eq!(numeric.len(), 2);
        for probe in &numeric {
            let x = probe.get("x").and_then(Value::as_f64).unwrap();
            assert!((x - x0).abs() <= 0.1 + 1e-12);
            assert_eq!(probe.get("c"), center.get("c"));
        }

        let categorical = oracle.ask(1).unwrap();
        assert_eq!(categorical.len(), 1);
        assert_eq!(categorical[0].get("x"), center.get("x"));
    }

    #[test]
    fn halves_step_when_center_does_not_move() {
        let mut oracle = PatternSearch::new(space(), 3);
        let center = oracle.ask(1).unwrap().remove(0);
        oracle.tell(&center, 0.0).unwrap();
        for batch in [oracle.ask(1).unwrap(), oracle.ask(1).unwrap()] {
            for c in &batch {
                oracle.tell(c, 1.0).unwrap();
            }
        }
        oracle.ask(1).unwrap();
        assert!((oracle.step() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn moves_to_better_configuration() {
        let mut oracle = PatternSearch::new(space(), 3);
        let center = oracle.ask(1).unwrap().remove(0);
        oracle.tell(&center, 5.0).unwrap();
        let probes = oracle.ask(1).unwrap();
        oracle.tell(&probes[0], 1.0).unwrap();
        oracle.ask(1).unwrap();
        oracle.ask(1).unwrap();
        assert!(oracle.center().unwrap().same_params(&probes[0]));
        assert!((oracle.step() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn probes_wide_integer_ranges() {
        let wide = SearchSpace::new().with(Parameter::integer("n", -(1 << 62), 1 << 62).unwrap());
        let mut oracle = PatternSearch::new(wide, 5);
        let center = oracle.ask(1).unwrap().remove(0);
        let n0 = center.get("n").and_then(Value::as_i64).unwrap();
        let probes = oracle.ask(1).unwrap();
        assert_eq!(probes.len(), 2);
        for probe in &probes {
            let n = probe.get("n").and_then(Value::as_i64).unwrap();
            assert_ne!(n, n0);
        }
    }

    #[test]
    fn rejects_bad_step() {
        assert!(PatternSearch::with_step(space(), 0, 0.0).is_err());
        assert!(PatternSearch::with_step(space(), 0, 1.5).is_err());
    }
}
