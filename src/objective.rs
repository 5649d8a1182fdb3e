//! The [`Objective`] trait defines what gets optimized.
//!
//! For simple closures, pass them directly to
//! [`Job::optimize`](crate::Job::optimize):
//!
//! ```
//! use std::sync::Arc;
//!
//! use feijoa::prelude::*;
//!
//! let space = SearchSpace::new().with(Parameter::real("x", -10.0, 10.0).unwrap());
//! let oracle = feijoa::maker("ucb<random, pattern>", &space, 1).unwrap();
//! let mut job = Job::new("quadratic", space, oracle, Arc::new(MemoryStorage::new()));
//!
//! job.optimize(50, |e: &Experiment| {
//!     let x = e.param("x").and_then(Value::as_f64).ok_or("missing x")?;
//!     Ok::<_, &str>((x - 3.0).powi(2))
//! })
//! .unwrap();
//! assert_eq!(job.experiments().len(), 50);
//! ```
//!
//! For early stopping or extra metrics, implement [`Objective`] on a
//! struct:
//!
//! ```
//! use std::ops::ControlFlow;
//! use std::sync::Arc;
//!
//! use feijoa::prelude::*;
//!
//! struct StopBelow {
//!     target: f64,
//! }
//!
//! impl Objective for StopBelow {
//!     type Error = String;
//!
//!     fn evaluate(&self, e: &Experiment) -> core::result::Result<Outcome, String> {
//!         let x = e.param("x").and_then(Value::as_f64).ok_or("missing x")?;
//!         Ok(Outcome::new(x.abs()).with_metric("x", x))
//!     }
//!
//!     fn after_experiment(&self, _job: &Job, e: &Experiment) -> ControlFlow<()> {
//!         match e.objective_result() {
//!             Some(v) if v < self.target => ControlFlow::Break(()),
//!             _ => ControlFlow::Continue(()),
//!         }
//!     }
//! }
//!
//! let space = SearchSpace::new().with(Parameter::real("x", -1.0, 1.0).unwrap());
//! let oracle = feijoa::maker("random", &space, 4).unwrap();
//! let mut job = Job::new("stop", space, oracle, Arc::new(MemoryStorage::new()));
//! job.optimize(10_000, StopBelow { target: 0.5 }).unwrap();
//! assert!(job.best_experiment().unwrap().objective_result().unwrap() < 0.5);
//! ```

use core::ops::ControlFlow;

use crate::experiment::{Experiment, Outcome};
use crate::job::Job;

/// An objective function with lifecycle hooks for optimization.
///
/// The only required method is [`evaluate`](Objective::evaluate). Lower
/// results are better.
///
/// # When to use `Objective` vs a closure
///
/// - **Closure**: any `Fn(&Experiment) -> Result<O, E>` with
///   `O: Into<Outcome>` is an objective.
/// - **`Objective` struct**: implement this trait when you need the
///   hooks.
pub trait Objective {
    /// The error type returned by [`evaluate`](Objective::evaluate).
    type Error: ToString + 'static;

    /// Evaluate the objective on the experiment's configuration.
    ///
    /// # Errors
    ///
    /// Any error whose type implements `ToString`. The experiment is stored
    /// as failed and its configuration is not told to the oracle.
    fn evaluate(&self, experiment: &Experiment) -> Result<Outcome, Self::Error>;

    /// Called before each batch is asked from the oracle.
    ///
    /// Return `ControlFlow::Break(())` to stop the optimization loop.
    ///
    /// Default: always continues.
    fn before_batch(&self, _job: &Job) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called after each experiment is stored, failed or not.
    ///
    /// Return `ControlFlow::Break(())` to stop the optimization loop; the
    /// rest of the current batch is dropped.
    ///
    /// Default: always continues.
    fn after_experiment(&self, _job: &Job, _experiment: &Experiment) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F, O, E> Objective for F
where
    F: Fn(&Experiment) -> Result<O, E>,
    O: Into<Outcome>,
    E: ToString + 'static,
{
    type Error = E;

    fn evaluate(&self, experiment: &Experiment) -> Result<Outcome, E> {
        self(experiment).map(Into::into)
    }
}
