//! Driving an oracle against an objective.
//!
//! A [`Job`] pairs a search space with an oracle and a storage. Each round
//! of [`optimize`](Job::optimize) asks the oracle for a batch, evaluates
//! every configuration, stores the resulting [`Experiment`]s and tells the
//! successful ones back.

use core::ops::ControlFlow;
use std::sync::Arc;

use crate::error::Result;
use crate::experiment::{Experiment, ExperimentState};
use crate::objective::Objective;
use crate::oracle::Oracle;
use crate::space::SearchSpace;
use crate::storage::{JobRecord, MemoryStorage, Storage};

/// One optimization run.
pub struct Job {
    id: u64,
    name: String,
    space: SearchSpace,
    oracle: Box<dyn Oracle>,
    storage: Arc<dyn Storage>,
}

impl Job {
    /// Registers a job named `name` in `storage`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        space: SearchSpace,
        oracle: Box<dyn Oracle>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let name = name.into();
        let id = storage.next_id();
        storage.insert_job(JobRecord::new(id, name.clone(), oracle.name(), &space));
        trace_info!(job = %name, id, oracle = oracle.name(), "job registered");
        Self {
            id,
            name,
            space,
            oracle,
            storage,
        }
    }

    /// Registers a job in a fresh [`MemoryStorage`].
    #[must_use]
    pub fn in_memory(name: impl Into<String>, space: SearchSpace, oracle: Box<dyn Oracle>) -> Self {
        Self::new(name, space, oracle, Arc::new(MemoryStorage::new()))
    }

    /// Job id within its storage.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Search space being explored.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// The driving oracle.
    #[must_use]
    pub fn oracle(&self) -> &dyn Oracle {
        self.oracle.as_ref()
    }

    /// Shared handle to the storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Every experiment of this job, in id order.
    #[must_use]
    pub fn experiments(&self) -> Vec<Experiment> {
        self.storage.get_experiments_by_job_id(self.id)
    }

    /// Successful experiment with the lowest result.
    #[must_use]
    pub fn best_experiment(&self) -> Option<Experiment> {
        self.experiments()
            .into_iter()
            .filter(|e| e.state() == ExperimentState::Ok)
            .filter(|e| e.objective_result().is_some_and(|v| !v.is_nan()))
            .min_by(|a, b| {
                let a = a.objective_result().unwrap_or(f64::INFINITY);
                let b = b.objective_result().unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            })
    }

    /// Runs up to `n_trials` evaluations of `objective`.
    ///
    /// Stops early when the oracle is exhausted or a hook breaks. Failed
    /// evaluations are stored with state `Error` and never told; they still
    /// count toward the budget. Results of the batch that completes the
    /// budget are told with [`Oracle::tell_forced`].
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Oracle::tell`].
    pub fn optimize<O: Objective>(&mut self, n_trials: usize, objective: O) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("optimize", job = %self.name, n_trials).entered();

        let mut done = 0;
        'outer: while done < n_trials {
            if let ControlFlow::Break(()) = objective.before_batch(self) {
                break;
            }
            let remaining = n_trials - done;
            let Some(mut batch) = self.oracle.ask(remaining) else {
                trace_info!(job = %self.name, done, "oracle exhausted");
                break;
            };
            if batch.is_empty() {
                break;
            }
            batch.truncate(remaining);
            let last_batch = done + batch.len() >= n_trials;

            for config in batch {
                let mut experiment = Experiment::new(self.storage.next_id(), self.id, config);
                self.storage.insert_experiment(experiment.clone());

                match objective.evaluate(&experiment) {
                    Ok(outcome) => {
                        let result = outcome.objective_result;
                        experiment.apply_outcome(outcome);
                        self.storage.insert_experiment(experiment.clone());
                        if last_batch {
                            self.oracle.tell_forced(&experiment.params, result);
                        } else {
                            self.oracle.tell(&experiment.params, result)?;
                        }
                        trace_debug!(job = %self.name, id = experiment.id, result, "experiment finished");
                    }
                    Err(err) => {
                        let message = err.to_string();
                        trace_warn!(job = %self.name, id = experiment.id, error = %message, "experiment failed");
                        experiment.fail(message);
                        self.storage.insert_experiment(experiment.clone());
                    }
                }
                done += 1;

                if let ControlFlow::Break(()) = objective.after_experiment(self, &experiment) {
                    break 'outer;
                }
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Job {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("oracle", &self.oracle.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::oracle::Grid;
    use crate::parameter::Parameter;
    use crate::value::Value;

    fn space() -> SearchSpace {
        SearchSpace::new().with(Parameter::integer("n", 0, 9).unwrap())
    }

    /// Records every tell, forced or not.
    struct Recorder {
        inner: Grid,
        told: Arc<parking_lot::Mutex<Vec<(i64, bool)>>>,
    }

    impl Oracle for Recorder {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn set_name(&mut self, name: String) {
            self.inner.set_name(name);
        }

        fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
            self.inner.ask(n)
        }

        fn tell(&mut self, config: &Configuration, _result: f64) -> Result<()> {
            let n = config.get("n").and_then(Value::as_i64).unwrap_or(-1);
            self.told.lock().push((n, false));
            Ok(())
        }

        fn tell_forced(&mut self, config: &Configuration, _result: f64) {
            let n = config.get("n").and_then(Value::as_i64).unwrap_or(-1);
            self.told.lock().push((n, true));
        }
    }

    fn n_of(e: &Experiment) -> i64 {
        e.param("n").and_then(Value::as_i64).unwrap()
    }

    #[test]
    fn budget_and_forced_final_batch() {
        let told = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let oracle = Recorder {
            inner: Grid::new(space()),
            told: Arc::clone(&told),
        };
        let mut job = Job::in_memory("grid", space(), Box::new(oracle));
        job.optimize(7, |e: &Experiment| Ok::<_, String>(n_of(e) as f64))
            .unwrap();

        assert_eq!(job.experiments().len(), 7);
        // Grid hands out the whole budget in one batch, so every tell is forced
        assert!(told.lock().iter().all(|(_, forced)| *forced));
        assert_eq!(job.best_experiment().map(|e| n_of(&e)), Some(0));
    }

    #[test]
    fn stops_when_oracle_is_exhausted() {
        let mut job = Job::in_memory("grid", space(), Box::new(Grid::new(space())));
        job.optimize(100, |e: &Experiment| Ok::<_, String>(-(n_of(e) as f64)))
            .unwrap();
        assert_eq!(job.experiments().len(), 10);
        assert_eq!(job.best_experiment().map(|e| n_of(&e)), Some(9));
    }

    #[test]
    fn failures_are_stored_but_not_told() {
        let told = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let oracle = Recorder {
            inner: Grid::new(space()),
            told: Arc::clone(&told),
        };
        let mut job = Job::in_memory("flaky", space(), Box::new(oracle));
        job.optimize(4, |e: &Experiment| {
            if n_of(e) % 2 == 0 {
                Err("even".to_owned())
            } else {
                Ok(1.0)
            }
        })
        .unwrap();

        let states: Vec<ExperimentState> = job.experiments().iter().map(Experiment::state).collect();
        assert_eq!(
            states,
            vec![
                ExperimentState::Error,
                ExperimentState::Ok,
                ExperimentState::Error,
                ExperimentState::Ok
            ]
        );
        assert_eq!(job.experiments()[0].error(), Some("even"));
        let told_n: Vec<i64> = told.lock().iter().map(|(n, _)| *n).collect();
        assert_eq!(told_n, vec![1, 3]);
    }

    #[test]
    fn experiments_share_the_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut a = Job::new("a", space(), Box::new(Grid::new(space())), Arc::clone(&storage));
        let mut b = Job::new("b", space(), Box::new(Grid::new(space())), Arc::clone(&storage));
        a.optimize(3, |_: &Experiment| Ok::<_, String>(1.0)).unwrap();
        b.optimize(2, |_: &Experiment| Ok::<_, String>(2.0)).unwrap();
        assert_eq!(storage.get_experiments_by_job_id(a.id()).len(), 3);
        assert_eq!(storage.get_experiments_by_job_id(b.id()).len(), 2);
        assert_eq!(storage.get_job(b.id()).unwrap().oracle, "grid");
    }
}
