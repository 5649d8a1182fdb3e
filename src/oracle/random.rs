//! Random oracle implementation.

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::Result;
use crate::randomizer::Randomizer;
use crate::space::SearchSpace;

/// Samples every configuration uniformly at random.
///
/// Ignores told results. Serves as a baseline and as the exploration arm
/// of a meta-oracle.
///
/// # Examples
///
/// ```
/// use feijoa::oracle::RandomOracle;
/// use feijoa::{Oracle, Parameter, SearchSpace};
///
/// let space = SearchSpace::new().with(Parameter::integer("n", 1, 8).unwrap());
/// let mut oracle = RandomOracle::new(space, 42);
/// assert_eq!(oracle.ask(3).unwrap().len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct RandomOracle {
    name: String,
    space: SearchSpace,
    randomizer: Randomizer,
}

impl RandomOracle {
    /// Creates a random oracle with a fixed seed.
    #[must_use]
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            name: "random".to_owned(),
            space,
            randomizer: Randomizer::new(seed),
        }
    }
}

impl Oracle for RandomOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
        Some(
            (0..n)
                .map(|_| self.randomizer.sample(&self.space, &self.name))
                .collect(),
        )
    }

    fn tell(&mut self, _config: &Configuration, _result: f64) -> Result<()> {
        Ok(())
    }
}
