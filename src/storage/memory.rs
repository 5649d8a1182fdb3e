use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{JobRecord, Storage};
use crate::experiment::Experiment;
use crate::space::SearchSpace;

/// In-memory storage (the default).
///
/// Jobs and experiments live in ordered maps keyed by id, each behind its
/// own read-write lock.
#[derive(Debug)]
pub struct MemoryStorage {
    jobs: RwLock<BTreeMap<u64, JobRecord>>,
    experiments: RwLock<BTreeMap<u64, Experiment>>,
    next_id: AtomicU64,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            experiments: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates a store pre-populated with `experiments`.
    ///
    /// The id counter starts past the largest id present.
    #[must_use]
    pub fn with_experiments(experiments: Vec<Experiment>) -> Self {
        let next_id = experiments
            .iter()
            .map(|e| e.id.max(e.job_id))
            .max()
            .map_or(0, |id| id + 1);
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            experiments: RwLock::new(experiments.into_iter().map(|e| (e.id, e)).collect()),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Number of stored experiments across all jobs.
    #[must_use]
    pub fn n_experiments(&self) -> usize {
        self.experiments.read().len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn insert_job(&self, job: JobRecord) {
        self.jobs.write().insert(job.id, job);
    }

    fn insert_experiment(&self, experiment: Experiment) {
        self.experiments.write().insert(experiment.id, experiment);
    }

    fn get_experiments_by_job_id(&self, job_id: u64) -> Vec<Experiment> {
        self.experiments
            .read()
            .values()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    fn get_search_space_by_job_id(&self, job_id: u64) -> Option<SearchSpace> {
        let jobs = self.jobs.read();
        let record = jobs.get(&job_id)?;
        SearchSpace::from_metadata(&record.search_space).ok()
    }

    fn get_job(&self, job_id: u64) -> Option<JobRecord> {
        self.jobs.read().get(&job_id).cloned()
    }
}
