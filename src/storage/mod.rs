//! Job and experiment storage backends.
//!
//! The [`Storage`] trait defines how jobs and their experiments are
//! persisted and retrieved. Every [`Job`](crate::Job) owns an
//! `Arc<dyn Storage>` so storage is transparently shared across threads.
//!
//! # Available backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStorage`] | In-memory maps behind a read-write lock (the default) |
//!
//! # Implementing a custom backend
//!
//! Implement the [`Storage`] trait to plug in your own backend (e.g. a
//! database). Experiments are written twice: once when created and again,
//! under the same id, once evaluated, so
//! [`insert_experiment`](Storage::insert_experiment) must replace.
//!
//! ```
//! use std::sync::Arc;
//!
//! use feijoa::prelude::*;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let space = SearchSpace::new().with(Parameter::real("x", 0.0, 1.0).unwrap());
//! let oracle = feijoa::maker("random", &space, 0).unwrap();
//! let job = Job::new("demo", space, oracle, storage.clone());
//! assert!(storage.get_search_space_by_job_id(job.id()).is_some());
//! ```

mod memory;

use chrono::{DateTime, Utc};
pub use memory::MemoryStorage;
use serde::{Deserialize, Serialize};

use crate::experiment::Experiment;
use crate::parameter::ParameterMeta;
use crate::space::SearchSpace;

/// Stored description of a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Identifier, unique within a storage.
    pub id: u64,
    /// Human-readable job name.
    pub name: String,
    /// Name of the top-level oracle driving the job.
    pub oracle: String,
    /// Search space, in serializable form.
    pub search_space: Vec<ParameterMeta>,
    /// When the job was registered.
    pub create_time: DateTime<Utc>,
}

impl JobRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, oracle: impl Into<String>, space: &SearchSpace) -> Self {
        Self {
            id,
            name: name.into(),
            oracle: oracle.into(),
            search_space: space.to_metadata(),
            create_time: Utc::now(),
        }
    }
}

/// Trait for storing and retrieving jobs and experiments.
///
/// Implementations must be `Send + Sync` because a storage may be shared
/// by jobs running on different threads.
pub trait Storage: Send + Sync {
    /// Atomically return the next unique id.
    ///
    /// Jobs and experiments draw from the same counter, so consecutive
    /// calls always produce distinct ids.
    fn next_id(&self) -> u64;

    /// Stores a job, replacing any job with the same id.
    fn insert_job(&self, job: JobRecord);

    /// Stores an experiment, replacing any experiment with the same id.
    fn insert_experiment(&self, experiment: Experiment);

    /// Experiments of a job, in id order.
    fn get_experiments_by_job_id(&self, job_id: u64) -> Vec<Experiment>;

    /// The search space a job was registered with.
    fn get_search_space_by_job_id(&self, job_id: u64) -> Option<SearchSpace>;

    /// The job record itself.
    fn get_job(&self, job_id: u64) -> Option<JobRecord>;
}
