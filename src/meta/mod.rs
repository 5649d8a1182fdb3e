//! Bandit scheduling over a pool of oracles.
//!
//! A [`MetaOracle`] is itself an [`Oracle`]. Each `ask` is delegated to one
//! child, chosen by walking the ranking produced by a [`Bandit`]; each `tell`
//! rewards the child that proposed the configuration when it improved on the
//! best result so far, and is then broadcast to every child so they all learn
//! from each other's evaluations.

mod bandit;

pub use bandit::{Bandit, BanditFactory, Thompson, Ucb1, UcbTuned, thompson, ucb_tuned, ucb1};

use std::collections::VecDeque;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::oracle::Oracle;
use crate::plugin::Subscriber;

/// Relative improvement below which no reward is paid.
const REWARD_THRESHOLD: f64 = 0.005;

/// Initial reward multiplier.
const INITIAL_MULTIPLIER: f64 = 10.0;

/// The multiplier grows by this factor every [`MULTIPLIER_PERIOD`] tells.
const MULTIPLIER_GROWTH: f64 = 1.2;
const MULTIPLIER_PERIOD: usize = 10;

/// Composite oracle scheduling its children with a multi-armed bandit.
///
/// # Examples
///
/// ```
/// use feijoa::meta::{MetaOracle, ucb1};
/// use feijoa::oracle::{Grid, RandomOracle};
/// use feijoa::{Oracle, Parameter, SearchSpace};
///
/// let space = SearchSpace::new().with(Parameter::integer("x", 0, 3).unwrap());
/// let mut meta = MetaOracle::new("ucb", ucb1, 0);
/// meta.add_oracle(Box::new(RandomOracle::new(space.clone(), 1)));
/// meta.add_oracle(Box::new(Grid::new(space)));
///
/// let batch = meta.ask(2).unwrap();
/// for config in &batch {
///     meta.tell(config, 1.0).unwrap();
/// }
/// ```
pub struct MetaOracle {
    name: String,
    oracles: Vec<Box<dyn Oracle>>,
    factory: BanditFactory,
    bandit: Option<Box<dyn Bandit>>,
    select_count: usize,
    seed: u64,
    /// Names of children still to be asked in the current pass.
    pending: VecDeque<String>,
    history: Vec<f64>,
    best: Option<f64>,
    multiplier: f64,
    /// Oracle name credited by every reward paid so far.
    rewards: Vec<String>,
}

impl MetaOracle {
    /// Creates an empty scheduler named `name` using bandits from `factory`.
    #[must_use]
    pub fn new(name: impl Into<String>, factory: BanditFactory, seed: u64) -> Self {
        Self {
            name: name.into(),
            oracles: Vec::new(),
            factory,
            bandit: None,
            select_count: 1,
            seed,
            pending: VecDeque::new(),
            history: Vec::new(),
            best: None,
            multiplier: INITIAL_MULTIPLIER,
            rewards: Vec::new(),
        }
    }

    /// Sets how many oracles a ranking pass visits, at least every oracle.
    #[must_use]
    pub fn with_select_count(mut self, select_count: usize) -> Self {
        self.select_count = select_count;
        self
    }

    /// Names of the children, in insertion order.
    #[must_use]
    pub fn oracle_names(&self) -> Vec<&str> {
        self.oracles.iter().map(|o| o.name()).collect()
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    /// `true` when no children remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    /// Every result told so far.
    #[must_use]
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Best result told so far.
    #[must_use]
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Current reward multiplier.
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Number of rewards credited to the child named `name`.
    #[must_use]
    pub fn rewards_of(&self, name: &str) -> usize {
        self.rewards.iter().filter(|r| *r == name).count()
    }

    /// Adds a child, renaming it with an `@n` suffix if its name is taken.
    pub fn add_oracle(&mut self, mut oracle: Box<dyn Oracle>) {
        let base = oracle.name().to_owned();
        let mut name = base.clone();
        let mut suffix = 1;
        while self.position(&name).is_some() {
            name = format!("{base}@{suffix}");
            suffix += 1;
        }
        if name != base {
            oracle.set_name(name);
        }
        self.oracles.push(oracle);
        self.reset_bandit();
    }

    /// Removes the child named `name` and returns it.
    ///
    /// Rewards already paid to the remaining children are kept.
    pub fn remove_oracle(&mut self, name: &str) -> Option<Box<dyn Oracle>> {
        let index = self.position(name)?;
        let oracle = self.oracles.remove(index);
        self.pending.retain(|n| n != name);
        self.rewards.retain(|r| r != name);
        self.reset_bandit();
        trace_info!(meta = %self.name, oracle = name, remaining = self.oracles.len(), "oracle removed");
        Some(oracle)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.oracles.iter().position(|o| o.name() == name)
    }

    /// Drops the bandit so it is rebuilt, sized to the pool, on next use.
    fn reset_bandit(&mut self) {
        self.bandit = None;
    }

    /// Bandit sized to the current pool, with historical rewards replayed.
    fn bandit(&mut self) -> Result<&mut Box<dyn Bandit>> {
        if self.bandit.is_none() {
            let mut bandit = (self.factory)(self.oracles.len(), self.seed);
            for name in &self.rewards {
                if let Some(arm) = self.oracles.iter().position(|o| o.name() == name.as_str()) {
                    bandit.reward(arm)?;
                }
            }
            self.bandit = Some(bandit);
        }
        self.bandit.as_mut().ok_or(Error::Internal("bandit not initialized"))
    }

    /// Children in the order the bandit currently ranks them.
    ///
    /// Takes the first `max(len, select_count)` entries of the ranking, so
    /// every child is always included.
    ///
    /// # Errors
    ///
    /// Returns an error if replaying historical rewards fails.
    pub fn order(&mut self) -> Result<Vec<String>> {
        if self.oracles.is_empty() {
            return Ok(Vec::new());
        }
        let take = self.oracles.len().max(self.select_count);
        let (_, ranking) = self.bandit()?.select();
        Ok(ranking
            .into_iter()
            .take(take)
            .filter_map(|arm| self.oracles.get(arm).map(|o| o.name().to_owned()))
            .collect())
    }

    /// Asks the first remaining seed child and removes it.
    fn drain_seed(&mut self, n: usize) -> Option<Option<Vec<Configuration>>> {
        let index = self.oracles.iter().position(|o| o.is_seed())?;
        let batch = self.oracles[index].ask(n);
        let name = self.oracles[index].name().to_owned();
        self.remove_oracle(&name);
        Some(batch)
    }

    /// Reward bookkeeping for one result.
    ///
    /// The best result is updated even when crediting the bandit fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn reward(&mut self, config: &Configuration, result: f64) -> Result<()> {
        let credited = match self.best {
            Some(best) if result.is_finite() => {
                let delta = best - result;
                let rel = delta.signum() * delta.abs() / (f64::EPSILON + result.abs() + best.abs());
                (rel > REWARD_THRESHOLD).then(|| ((rel * self.multiplier).floor() as usize).max(1))
            }
            _ => None,
        };
        if !result.is_nan() {
            self.best = Some(self.best.map_or(result, |b| b.min(result)));
        }

        let Some(times) = credited else {
            return Ok(());
        };
        let Some(arm) = self.position(config.requestor()) else {
            return Ok(());
        };
        let name = config.requestor().to_owned();
        for _ in 0..times {
            self.bandit()?.reward(arm)?;
            self.rewards.push(name.clone());
        }
        trace_debug!(meta = %self.name, oracle = %name, rewards = times, "oracle rewarded");
        Ok(())
    }

    fn record(&mut self, config: &Configuration, result: f64) -> Result<()> {
        self.history.push(result);
        let rewarded = self.reward(config, result);
        if self.history.len() % MULTIPLIER_PERIOD == 0 {
            self.multiplier *= MULTIPLIER_GROWTH;
        }
        rewarded
    }
}

impl Oracle for MetaOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
        while let Some(batch) = self.drain_seed(n) {
            if batch.is_some() {
                return batch;
            }
        }

        // Every pass over the ranking hands each child at most one ask
        while !self.oracles.is_empty() {
            if self.pending.is_empty() {
                match self.order() {
                    Ok(order) => self.pending = order.into(),
                    Err(err) => {
                        trace_warn!(meta = %self.name, error = %err, "ranking failed");
                        let _ = err;
                        self.pending = self.oracle_names().into_iter().map(str::to_owned).collect();
                    }
                }
            }
            let name = self.pending.pop_front()?;
            let Some(index) = self.position(&name) else {
                continue;
            };
            match self.oracles[index].ask(n) {
                Some(batch) => return Some(batch),
                None => {
                    trace_info!(meta = %self.name, oracle = %name, "oracle exhausted");
                    self.remove_oracle(&name);
                }
            }
        }
        None
    }

    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()> {
        // Bookkeeping errors are reported after every child has been told
        let mut first_err = self.record(config, result).err();
        for oracle in &mut self.oracles {
            if let Err(err) = oracle.tell(config, result) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn tell_forced(&mut self, config: &Configuration, result: f64) {
        if let Err(err) = self.record(config, result) {
            trace_warn!(meta = %self.name, error = %err, "reward bookkeeping failed");
            let _ = err;
        }
        for oracle in &mut self.oracles {
            oracle.tell_forced(config, result);
        }
    }

    fn attach(&mut self, plugin: Box<dyn Subscriber>) -> Result<()> {
        let _ = plugin;
        Err(Error::PluginUnsupported {
            oracle: self.name.clone(),
        })
    }
}

impl core::fmt::Debug for MetaOracle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MetaOracle")
            .field("name", &self.name)
            .field("oracles", &self.oracle_names())
            .field("select_count", &self.select_count)
            .field("best", &self.best)
            .field("multiplier", &self.multiplier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Grid, RandomOracle, SeedOracle};
    use crate::parameter::Parameter;
    use crate::space::SearchSpace;

    /// Counts tells and hands out a fixed configuration.
    struct Stub {
        name: String,
        told: usize,
        asks: usize,
    }

    impl Stub {
        fn boxed(name: &str) -> Box<dyn Oracle> {
            Box::new(Self {
                name: name.to_owned(),
                told: 0,
                asks: 0,
            })
        }
    }

    impl Oracle for Stub {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: String) {
            self.name = name;
        }

        fn ask(&mut self, _n: usize) -> Option<Vec<Configuration>> {
            self.asks += 1;
            Some(vec![Configuration::new(self.name.clone()).with("x", 1)])
        }

        fn tell(&mut self, _config: &Configuration, _result: f64) -> Result<()> {
            self.told += 1;
            Ok(())
        }
    }

    fn space() -> SearchSpace {
        SearchSpace::new().with(Parameter::integer("x", 0, 1).unwrap())
    }

    #[test]
    fn colliding_names_are_mangled() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        meta.add_oracle(Stub::boxed("a"));
        meta.add_oracle(Stub::boxed("a"));
        assert_eq!(meta.oracle_names(), vec!["a", "a@1", "a@2"]);
    }

    #[test]
    fn improvement_rewards_requestor() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        meta.add_oracle(Stub::boxed("b"));
        meta.tell(&Configuration::new("a"), 10.0).unwrap();
        assert_eq!(meta.rewards_of("a"), 0);
        // rel = 9 / 11 ≈ 0.818, times 10 -> 8 rewards
        meta.tell(&Configuration::new("b"), 1.0).unwrap();
        assert_eq!(meta.rewards_of("b"), 8);
        // Worse result: nothing
        meta.tell(&Configuration::new("a"), 2.0).unwrap();
        assert_eq!(meta.rewards_of("a"), 0);
        assert_eq!(meta.best(), Some(1.0));
    }

    #[test]
    fn small_improvement_is_not_rewarded() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        meta.tell(&Configuration::new("a"), 1.0).unwrap();
        meta.tell(&Configuration::new("a"), 0.995).unwrap();
        assert_eq!(meta.rewards_of("a"), 0);
        meta.tell(&Configuration::new("a"), 0.9).unwrap();
        assert_eq!(meta.rewards_of("a"), 1);
    }

    #[test]
    fn multiplier_grows_every_ten_tells() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        for _ in 0..20 {
            meta.tell(&Configuration::new("a"), 1.0).unwrap();
        }
        assert!((meta.multiplier() - 10.0 * 1.2 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn seeds_are_drained_first() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        let seeds = vec![
            Configuration::new("user").with("x", 0),
            Configuration::new("user").with("x", 1),
        ];
        meta.add_oracle(Box::new(SeedOracle::new(seeds)));
        let first = meta.ask(1).unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|c| c.requestor() == "seed"));
        assert_eq!(meta.oracle_names(), vec!["a"]);
        assert_eq!(meta.ask(1).unwrap()[0].requestor(), "a");
    }

    #[test]
    fn exhausted_children_are_removed() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Box::new(Grid::new(space())));
        meta.add_oracle(Box::new(RandomOracle::new(space(), 3)));
        let mut from_grid = 0;
        for _ in 0..10 {
            let batch = meta.ask(5).unwrap();
            if batch[0].requestor() == "grid" {
                from_grid += batch.len();
            }
        }
        assert_eq!(from_grid, 2);
        assert_eq!(meta.oracle_names(), vec!["random"]);
    }

    #[test]
    fn empty_pool_is_exhausted() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        assert!(meta.ask(1).is_none());
        meta.add_oracle(Box::new(Grid::new(space())));
        assert_eq!(meta.ask(10).unwrap().len(), 2);
        assert!(meta.ask(10).is_none());
        assert!(meta.is_empty());
    }

    #[test]
    fn order_covers_every_child() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0).with_select_count(1);
        for name in ["a", "b", "c"] {
            meta.add_oracle(Stub::boxed(name));
        }
        let mut order = meta.order().unwrap();
        order.sort();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn removal_replays_remaining_rewards() {
        let mut meta = MetaOracle::new("ucb", ucb1, 0);
        meta.add_oracle(Stub::boxed("a"));
        meta.add_oracle(Stub::boxed("b"));
        meta.add_oracle(Stub::boxed("c"));
        meta.tell(&Configuration::new("a"), 10.0).unwrap();
        meta.tell(&Configuration::new("c"), 1.0).unwrap();
        assert!(meta.remove_oracle("a").is_some());
        assert_eq!(meta.rewards_of("c"), 8);
        // Pull both remaining arms once, then "c" leads on its replayed wins
        meta.order().unwrap();
        meta.order().unwrap();
        assert_eq!(meta.order().unwrap()[0], "c");
    }
}
