//! Bayesian optimization oracle.
//!
//! A surrogate model is refitted on every `ask` and used to rank a large
//! batch of uniform random candidates drawn inside the oracle's active
//! bounds.
//!
//! # Algorithm overview
//!
//! 1. **Warm-up** — the first `ask` returns `n_warmup` random
//!    configurations, whatever `n` is.
//! 2. **Fit** — the regressor (or, for the likelihood-free acquisitions,
//!    the classifier) is fitted on everything told so far. With no data, or
//!    when fitting fails, the oracle falls back to random sampling.
//! 3. **Score** — `n_samples` candidates are scored with the acquisition
//!    function, sorted ascending and the lowest `n` returned.
//!
//! Categorical parameters are encoded by choice index. Attached plugins are
//! notified after each `tell` once more than five results are known, and
//! may narrow the active bounds.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `acq` | `ei` | Acquisition function (see [`Acquisition`]) |
//! | `regr` | `gp` | Regressor: `gp` or `knn` |
//! | `n_warmup` | 10 | Random configurations on the first `ask` |
//! | `n_samples` | 100 000 | Candidates scored per `ask` |
//!
//! # Examples
//!
//! ```
//! use feijoa::oracle::bayesian::Bayesian;
//! use feijoa::{Oracle, Parameter, SearchSpace};
//!
//! let space = SearchSpace::new().with(Parameter::real("x", -1.0, 1.0).unwrap());
//! let mut oracle = Bayesian::builder()
//!     .n_warmup(4)
//!     .n_samples(256)
//!     .seed(7)
//!     .build(space)
//!     .unwrap();
//!
//! let warmup = oracle.ask(1).unwrap();
//! assert_eq!(warmup.len(), 4);
//! ```

mod acquisition;
mod classifier;
mod regressor;

pub use acquisition::Acquisition;
pub use classifier::{Classifier, KNeighborsClassifier};
pub use regressor::{GaussianProcess, KNeighbors, Regressor, RegressorKind};

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::plugin::{Event, Notifier, Subscriber};
use crate::randomizer::Randomizer;
use crate::rng_util;
use crate::space::SearchSpace;

const DEFAULT_N_WARMUP: usize = 10;
const DEFAULT_N_SAMPLES: usize = 100_000;

/// Plugins hear about tells only once more than this many results are known.
const NOTIFY_AFTER: usize = 5;

/// Phase of the Bayesian state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Nothing asked yet; the next `ask` is the warm-up batch.
    Uninitialized,
    /// Model-guided sampling.
    Fitted,
}

/// Surrogate-model oracle.
pub struct Bayesian {
    name: String,
    space: SearchSpace,
    randomizer: Randomizer,
    regressor: Box<dyn Regressor>,
    classifier: Box<dyn Classifier>,
    acquisition: Acquisition,
    n_warmup: usize,
    n_samples: usize,
    phase: Phase,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    bounds: Vec<(f64, f64)>,
    notifier: Notifier,
}

impl Bayesian {
    /// Creates an oracle with the default GP regressor and `ei`.
    #[must_use]
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        let bounds = space.bounds();
        Self {
            name: "bayesian".to_owned(),
            space,
            randomizer: Randomizer::new(seed),
            regressor: Box::new(GaussianProcess::new()),
            classifier: Box::new(KNeighborsClassifier::default()),
            acquisition: Acquisition::Ei,
            n_warmup: DEFAULT_N_WARMUP,
            n_samples: DEFAULT_N_SAMPLES,
            phase: Phase::Uninitialized,
            x: Vec::new(),
            y: Vec::new(),
            bounds,
            notifier: Notifier::new(),
        }
    }

    /// Creates a builder for configuring a `Bayesian` oracle.
    #[must_use]
    pub fn builder() -> BayesianBuilder {
        BayesianBuilder::default()
    }

    /// The configured acquisition function.
    #[must_use]
    pub fn acquisition(&self) -> Acquisition {
        self.acquisition
    }

    /// Active per-dimension bounds (narrowed by plugins).
    #[must_use]
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Number of results told so far.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.y.len()
    }

    /// Fits the surrogate on the told data and scores `candidates`.
    ///
    /// Lower is better. Fails if the model cannot be fitted.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing has been told yet or fitting fails.
    pub fn score_candidates(&mut self, candidates: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.y.is_empty() {
            return Err(Error::Internal("no observations to fit"));
        }
        if self.acquisition.is_likelihood_free() {
            let (labels, weights) = self.acquisition.likelihood_free_targets(&self.y);
            self.classifier.fit(&self.x, &labels, &weights)?;
            return Ok(candidates
                .iter()
                .map(|c| -self.classifier.predict_proba(c))
                .collect());
        }

        self.regressor.fit(&self.x, &self.y)?;
        let best = self.y.iter().copied().fold(f64::INFINITY, f64::min);
        let acquisition = self.acquisition;
        Ok(candidates
            .iter()
            .map(|c| {
                if acquisition.needs_std() {
                    let (mean, std) = self
                        .regressor
                        .predict_with_std(c)
                        .unwrap_or_else(|| (self.regressor.predict(c), 0.0));
                    acquisition.score(mean, std, best)
                } else {
                    acquisition.score(self.regressor.predict(c), 0.0, best)
                }
            })
            .collect())
    }

    fn random_batch(&mut self, n: usize) -> Vec<Configuration> {
        (0..n)
            .map(|_| self.randomizer.sample(&self.space, &self.name))
            .collect()
    }

    /// One uniform candidate inside the active bounds; categorical
    /// coordinates are drawn as whole choice indices.
    #[allow(clippy::cast_precision_loss)]
    fn draw_candidate(&mut self) -> Vec<f64> {
        let rng = self.randomizer.rng();
        self.space
            .iter()
            .zip(&self.bounds)
            .map(|(param, &(lo, hi))| match param {
                Parameter::Categorical(_) => {
                    let (lo, hi) = (lo.round() as i64, hi.round() as i64);
                    rng.i64(lo.min(hi)..=hi.max(lo)) as f64
                }
                _ => rng_util::f64_range(rng, lo, hi),
            })
            .collect()
    }

    fn guided_batch(&mut self, n: usize) -> Vec<Configuration> {
        let candidates: Vec<Vec<f64>> = (0..self.n_samples).map(|_| self.draw_candidate()).collect();
        let scores = match self.score_candidates(&candidates) {
            Ok(scores) => scores,
            Err(err) => {
                trace_debug!(oracle = %self.name, error = %err, "model fit failed, sampling randomly");
                let _ = err;
                return self.random_batch(n);
            }
        };

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
        order
            .into_iter()
            .take(n)
            .map(|i| self.space.from_vector(&candidates[i], &self.name))
            .collect()
    }
}

impl Oracle for Bayesian {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Fitted;
            if self.n_warmup > 0 {
                return Some(self.random_batch(self.n_warmup));
            }
        }
        if self.y.is_empty() {
            return Some(self.random_batch(n));
        }
        Some(self.guided_batch(n))
    }

    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()> {
        let x = self.space.to_vector(config)?;
        if !result.is_finite() {
            return Ok(());
        }
        self.x.push(x);
        self.y.push(result);
        if self.y.len() > NOTIFY_AFTER {
            let event = Event::Told {
                x: &self.x,
                y: &self.y,
            };
            self.notifier.notify(&event, &self.name, &mut self.bounds);
        }
        Ok(())
    }

    fn attach(&mut self, plugin: Box<dyn Subscriber>) -> Result<()> {
        self.notifier.attach(plugin);
        Ok(())
    }
}

impl core::fmt::Debug for Bayesian {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bayesian")
            .field("name", &self.name)
            .field("regressor", &self.regressor.name())
            .field("acquisition", &self.acquisition)
            .field("n_warmup", &self.n_warmup)
            .field("n_samples", &self.n_samples)
            .field("observations", &self.y.len())
            .field("plugins", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`Bayesian`] oracle.
///
/// All options have defaults:
/// - `acquisition`: `ei`
/// - `regressor`: `gp`
/// - `n_warmup`: 10
/// - `n_samples`: 100 000
/// - `seed`: 0
#[derive(Debug, Clone, Default)]
pub struct BayesianBuilder {
    acquisition: Option<String>,
    regressor: Option<RegressorKind>,
    n_warmup: Option<usize>,
    n_samples: Option<usize>,
    seed: Option<u64>,
}

impl BayesianBuilder {
    /// Sets the acquisition function by name.
    #[must_use]
    pub fn acquisition(mut self, name: impl Into<String>) -> Self {
        self.acquisition = Some(name.into());
        self
    }

    /// Sets the regressor.
    #[must_use]
    pub fn regressor(mut self, kind: RegressorKind) -> Self {
        self.regressor = Some(kind);
        self
    }

    /// Sets the size of the warm-up batch.
    #[must_use]
    pub fn n_warmup(mut self, n: usize) -> Self {
        self.n_warmup = Some(n);
        self
    }

    /// Sets the number of candidates scored per `ask`.
    #[must_use]
    pub fn n_samples(mut self, n: usize) -> Self {
        self.n_samples = Some(n);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the oracle over `space`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAcquisition`] if the acquisition is unknown
    /// or needs a predictive std the regressor lacks, and
    /// [`Error::InvalidOracleParameter`] if `n_samples` is zero.
    pub fn build(self, space: SearchSpace) -> Result<Bayesian> {
        let kind = self.regressor.unwrap_or_default();
        let regressor = kind.build();
        let acquisition = Acquisition::parse(
            self.acquisition.as_deref().unwrap_or("ei"),
            regressor.name(),
            regressor.has_std(),
        )?;
        let n_samples = self.n_samples.unwrap_or(DEFAULT_N_SAMPLES);
        if n_samples == 0 {
            return Err(Error::invalid_param("bayesian", "n_samples", "must be positive"));
        }

        let mut oracle = Bayesian::new(space, self.seed.unwrap_or(0));
        oracle.regressor = regressor;
        oracle.acquisition = acquisition;
        oracle.n_warmup = self.n_warmup.unwrap_or(DEFAULT_N_WARMUP);
        oracle.n_samples = n_samples;
        Ok(oracle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with(Parameter::real("x", -2.0, 2.0).unwrap())
            .with(Parameter::categorical("c", ["a", "b"]).unwrap())
    }

    fn objective(c: &Configuration) -> f64 {
        let x = c.get("x").and_then(Value::as_f64).unwrap();
        let penalty = if c.get("c") == Some(&Value::from("a")) { 0.0 } else { 1.0 };
        x * x + penalty
    }

    fn small(acq: &str, regressor: RegressorKind) -> Bayesian {
        Bayesian::builder()
            .acquisition(acq)
            .regressor(regressor)
            .n_warmup(6)
            .n_samples(200)
            .seed(11)
            .build(space())
            .unwrap()
    }

    #[test]
    fn warmup_ignores_n() {
        let mut oracle = small("ei", RegressorKind::GaussianProcess);
        assert_eq!(oracle.ask(1).unwrap().len(), 6);
        // Nothing told: still random, now honouring n
        assert_eq!(oracle.ask(3).unwrap().len(), 3);
    }

    #[test]
    fn guided_batches_stay_in_bounds() {
        for (acq, regr) in [
            ("ei", RegressorKind::GaussianProcess),
            ("poi", RegressorKind::GaussianProcess),
            ("ucb", RegressorKind::GaussianProcess),
            ("naive0", RegressorKind::KNeighbors),
            ("lfboei", RegressorKind::KNeighbors),
            ("lfbopoi", RegressorKind::GaussianProcess),
        ] {
            let mut oracle = small(acq, regr);
            for c in oracle.ask(1).unwrap() {
                oracle.tell(&c, objective(&c)).unwrap();
            }
            let batch = oracle.ask(4).unwrap();
            assert_eq!(batch.len(), 4, "{acq}");
            for c in &batch {
                let x = c.get("x").and_then(Value::as_f64).unwrap();
                assert!((-2.0..=2.0).contains(&x));
                assert_eq!(c.requestor(), "bayesian");
            }
        }
    }

    #[test]
    fn same_seed_same_proposals() {
        let run = || {
            let mut oracle = small("ei", RegressorKind::GaussianProcess);
            for c in oracle.ask(1).unwrap() {
                oracle.tell(&c, objective(&c)).unwrap();
            }
            oracle.ask(2).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn non_gp_rejects_ei() {
        let err = Bayesian::builder()
            .acquisition("ei")
            .regressor(RegressorKind::KNeighbors)
            .build(space())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAcquisition { .. }));
    }

    #[test]
    fn tell_rejects_foreign_configuration() {
        let mut oracle = small("ei", RegressorKind::GaussianProcess);
        let foreign = Configuration::new("other").with("y", 1.0);
        assert!(oracle.tell(&foreign, 1.0).is_err());
        assert_eq!(oracle.n_observations(), 0);
    }
}
