//! Replays user-supplied configurations.

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::Result;

/// Emits every seed configuration on the first `ask`, then nothing.
///
/// A meta-oracle drains seed oracles before it starts scheduling the others,
/// so seeds are always evaluated first.
#[derive(Clone, Debug)]
pub struct SeedOracle {
    name: String,
    seeds: Option<Vec<Configuration>>,
}

impl SeedOracle {
    /// Creates a seed oracle over `seeds`.
    #[must_use]
    pub fn new(seeds: Vec<Configuration>) -> Self {
        Self {
            name: "seed".to_owned(),
            seeds: Some(seeds),
        }
    }

    /// `true` once the seeds have been handed out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.seeds.is_none()
    }
}

impl Oracle for SeedOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, _n: usize) -> Option<Vec<Configuration>> {
        let mut seeds = self.seeds.take()?;
        if seeds.is_empty() {
            return None;
        }
        for config in &mut seeds {
            config.set_requestor(self.name.clone());
        }
        trace_debug!(oracle = %self.name, count = seeds.len(), "seeds emitted");
        Some(seeds)
    }

    fn tell(&mut self, _config: &Configuration, _result: f64) -> Result<()> {
        Ok(())
    }

    fn is_seed(&self) -> bool {
        true
    }
}
