//! Probabilistic classifiers for likelihood-free acquisition.

use super::regressor::{DEFAULT_NEIGHBORS, nearest};
use crate::error::{Error, Result};

/// A weighted binary classifier.
pub trait Classifier: Send {
    /// Fits on rows `x` with labels (`true` = good) and sample weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are empty or misaligned.
    fn fit(&mut self, x: &[Vec<f64>], labels: &[bool], weights: &[f64]) -> Result<()>;

    /// Probability that `x` is labelled good.
    fn predict_proba(&self, x: &[f64]) -> f64;
}

/// Weighted k-nearest-neighbour vote.
///
/// Each neighbour votes with its sample weight divided by its distance; the
/// probability is the share of the vote cast by good neighbours.
#[derive(Clone, Debug)]
pub struct KNeighborsClassifier {
    k: usize,
    x_train: Vec<Vec<f64>>,
    labels: Vec<bool>,
    weights: Vec<f64>,
}

impl KNeighborsClassifier {
    /// Creates an unfitted classifier over `k` neighbours.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            x_train: Vec::new(),
            labels: Vec::new(),
            weights: Vec::new(),
        }
    }
}

impl Default for KNeighborsClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBORS)
    }
}

impl Classifier for KNeighborsClassifier {
    fn fit(&mut self, x: &[Vec<f64>], labels: &[bool], weights: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != labels.len() || x.len() != weights.len() {
            return Err(Error::Internal("classifier needs aligned, non-empty data"));
        }
        self.x_train = x.to_vec();
        self.labels = labels.to_vec();
        self.weights = weights.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> f64 {
        let mut good = 0.0;
        let mut total = 0.0;
        for (i, d) in nearest(&self.x_train, x, self.k) {
            let vote = self.weights[i] / d.max(1e-12);
            if self.labels[i] {
                good += vote;
            }
            total += vote;
        }
        if total > 0.0 { good / total } else { 0.0 }
    }
}
