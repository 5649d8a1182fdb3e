//! Search strategies speaking the ask/tell protocol.
//!
//! An [`Oracle`] proposes configurations with [`ask`](Oracle::ask) and learns
//! from results passed to [`tell`](Oracle::tell). Oracles are single-threaded
//! state machines: every call takes `&mut self` and nothing is locked
//! internally. The caller evaluates a batch (possibly in parallel) and then
//! tells results back one at a time.
//!
//! Lower results are better throughout.

pub mod bayesian;
pub mod genetic;
mod grid;
mod pattern;
mod random;
mod seed;

pub use grid::{Grid, GridBuilder};
pub use pattern::PatternSearch;
pub use random::RandomOracle;
pub use seed::SeedOracle;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::plugin::Subscriber;

/// A pluggable search strategy.
///
/// `ask` returns up to `n` configurations, or `None` once the oracle is
/// exhausted; `n` is advisory and some oracles return a fixed batch size.
/// `tell` receives every result the driver observes, including results of
/// configurations produced by other oracles: the requestor tag on the
/// configuration tells them apart.
pub trait Oracle: Send {
    /// Instance name, used as the requestor tag on produced configurations.
    fn name(&self) -> &str;

    /// Renames the instance.
    fn set_name(&mut self, name: String);

    /// Proposes the next batch.
    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>>;

    /// Records the result of evaluating `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not fit the oracle's search space,
    /// or if internal bookkeeping rejects the observation.
    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()>;

    /// Best-effort [`tell`](Self::tell) used when flushing the last batch of
    /// a budget: failures are logged and dropped.
    fn tell_forced(&mut self, config: &Configuration, result: f64) {
        if let Err(err) = self.tell(config, result) {
            trace_warn!(oracle = self.name(), error = %err, "forced tell failed");
            let _ = err;
        }
    }

    /// `true` for oracles that only replay pre-supplied configurations.
    fn is_seed(&self) -> bool {
        false
    }

    /// Attaches a plugin to the oracle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginUnsupported`] unless the oracle keeps active
    /// bounds a plugin can act on.
    fn attach(&mut self, plugin: Box<dyn Subscriber>) -> Result<()> {
        let _ = plugin;
        Err(Error::PluginUnsupported {
            oracle: self.name().to_owned(),
        })
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn set_name(&mut self, name: String) {
        (**self).set_name(name);
    }

    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
        (**self).ask(n)
    }

    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()> {
        (**self).tell(config, result)
    }

    fn tell_forced(&mut self, config: &Configuration, result: f64) {
        (**self).tell_forced(config, result);
    }

    fn is_seed(&self) -> bool {
        (**self).is_seed()
    }

    fn attach(&mut self, plugin: Box<dyn Subscriber>) -> Result<()> {
        (**self).attach(plugin)
    }
}
