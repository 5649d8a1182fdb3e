#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Black-box hyperparameter optimization built around an ask/tell loop.
//!
//! Search strategies ("oracles") propose [`Configuration`]s, the caller
//! evaluates them against an objective, and the results are told back so the
//! oracle can refine its next proposals. Oracles are usually composed into a
//! bandit [`MetaOracle`] that spends the budget on whichever strategy is
//! currently paying off, assembled from a one-line description:
//!
//! ```
//! use feijoa::prelude::*;
//!
//! let space = SearchSpace::new()
//!     .with(Parameter::real("x", 0.0, 1.0).unwrap())
//!     .with(Parameter::real("y", 0.0, 1.0).unwrap());
//!
//! let mut oracle = feijoa::maker("ucb<random, pattern>", &space, 0).unwrap();
//! let batch = oracle.ask(2).unwrap();
//! for config in &batch {
//!     let x = config.get("x").and_then(Value::as_f64).unwrap();
//!     let y = config.get("y").and_then(Value::as_f64).unwrap();
//!     oracle.tell(config, (1.0 - x).powi(2) + (1.0 - y).powi(2)).unwrap();
//! }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`SearchSpace`] | Ordered set of [`Parameter`]s (integer, real, categorical). |
//! | [`Configuration`] | One concrete point, tagged with the oracle that produced it. |
//! | [`Oracle`] | A search strategy speaking the ask/tell protocol. |
//! | [`MetaOracle`] | Bandit scheduler over child oracles. |
//! | [`Registry`] | Name/alias table used to build oracles from the DSL. |
//! | [`Job`] | Drives an oracle against an [`Objective`] and records [`Experiment`]s. |
//!
//! # Oracle Guide
//!
//! | Anchor | Aliases | Strategy |
//! |--------|---------|----------|
//! | `random` | `rand` | Uniform random sampling |
//! | `bayesian` | `bayes`, `gp` | Surrogate model + acquisition function |
//! | `pattern` | `template`, `patternsearch`, `templatesearch` | Coordinate pattern search |
//! | `grid` | `gridsearch` | Exhaustive grid, terminates |
//! | `seed` | `seeds` | Replays user-supplied configurations once |
//! | `de` | `differential_evolution` | Differential evolution |
//! | `cmaes` | `cma`, `cma_es` | CMA-ES |
//! | `pso` | `particle_swarm` | Particle swarm |
//! | `ga` | `genetic` | SBX genetic algorithm |
//!
//! Meta-oracles: `ucb` (UCB1), `ucb_tuned`, `thompson`. Plugins: `reducer`.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key optimization points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod configuration;
pub mod dsl;
mod error;
pub mod experiment;
pub mod job;
pub mod meta;
pub mod objective;
pub mod oracle;
pub mod parameter;
pub mod plugin;
mod randomizer;
pub mod registry;
mod rng_util;
pub mod space;
pub mod storage;
mod value;

pub use configuration::Configuration;
pub use error::{Error, Result};
pub use experiment::{Experiment, ExperimentState, Outcome};
pub use job::Job;
pub use meta::MetaOracle;
pub use objective::Objective;
pub use oracle::Oracle;
pub use parameter::Parameter;
pub use randomizer::Randomizer;
pub use registry::{Registry, maker};
pub use space::SearchSpace;
pub use value::Value;

/// Convenient wildcard import for the most common types.
///
/// ```
/// use feijoa::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{Error, Result};
    pub use crate::experiment::{Experiment, ExperimentState, Outcome};
    pub use crate::job::Job;
    pub use crate::meta::{Bandit, MetaOracle, Thompson, Ucb1, UcbTuned};
    pub use crate::objective::Objective;
    pub use crate::oracle::bayesian::{Acquisition, Bayesian};
    pub use crate::oracle::genetic::{
        CmaEs, DifferentialEvolution, GeneticAlgorithm, GeneticOracle, ParticleSwarm,
    };
    pub use crate::oracle::{Grid, Oracle, PatternSearch, RandomOracle, SeedOracle};
    pub use crate::parameter::Parameter;
    pub use crate::plugin::DomainReducer;
    pub use crate::randomizer::Randomizer;
    pub use crate::registry::{OracleContext, Registry, maker};
    pub use crate::space::SearchSpace;
    pub use crate::storage::{MemoryStorage, Storage};
    pub use crate::value::Value;
}
