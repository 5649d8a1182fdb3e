//! Surrogate regressors.
//!
//! The Gaussian process uses a **Matérn 5/2 kernel** with ARD lengthscales
//! set to the per-dimension spread of the training inputs. Targets are
//! standardized before fitting and predictions are mapped back to the
//! original scale, so acquisition functions see raw objective units.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// A regression model the Bayesian oracle can fit and query.
pub trait Regressor: Send {
    /// Short name, as used in the DSL (`gp`, `knn`).
    fn name(&self) -> &'static str;

    /// Fits the model to `x` (one row per observation) and `y`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be fitted; the caller falls back
    /// to random sampling.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Predictive mean at `x`.
    fn predict(&self, x: &[f64]) -> f64;

    /// Predictive mean and standard deviation, for models that have one.
    fn predict_with_std(&self, x: &[f64]) -> Option<(f64, f64)> {
        let _ = x;
        None
    }

    /// `true` if [`predict_with_std`](Self::predict_with_std) returns values.
    fn has_std(&self) -> bool {
        false
    }
}

/// The regressors available by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegressorKind {
    /// [`GaussianProcess`].
    #[default]
    GaussianProcess,
    /// [`KNeighbors`].
    KNeighbors,
}

impl RegressorKind {
    /// Parses a DSL regressor name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "gp" | "gaussian_process" => Ok(Self::GaussianProcess),
            "knn" | "kneighbors" => Ok(Self::KNeighbors),
            other => Err(Error::invalid_param(
                "bayesian",
                "regr",
                format!("unknown regressor '{other}'"),
            )),
        }
    }

    /// Builds a fresh regressor of this kind.
    #[must_use]
    pub fn build(self) -> Box<dyn Regressor> {
        match self {
            Self::GaussianProcess => Box::new(GaussianProcess::new()),
            Self::KNeighbors => Box::new(KNeighbors::new(DEFAULT_NEIGHBORS)),
        }
    }
}

// ---------------------------------------------------------------------------
// Matérn 5/2 kernel
// ---------------------------------------------------------------------------

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Default observation noise variance.
const DEFAULT_NOISE_VAR: f64 = 1e-6;

/// Maximum number of training points used by the GP (the most recent ones).
const MAX_TRAIN_POINTS: usize = 200;

/// Matérn 5/2 kernel with ARD lengthscales and unit signal variance.
///
/// `k(x1, x2) = (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
pub(crate) fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let r = r_sq.sqrt();
    let sqrt5_r = SQRT_5 * r;
    (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// A fitted GP.
#[derive(Clone, Debug)]
struct GpModel {
    /// Lower Cholesky factor of `K + σ²I`.
    l: DMatrix<f64>,
    /// `α = (K + σ²I)^{-1} y`.
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    y_mean: f64,
    y_std: f64,
}

/// Gaussian-process regressor with predictive uncertainty.
///
/// Fitting is deterministic: there is no hyperparameter search, so the same
/// data always yields the same model.
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    noise_variance: f64,
    model: Option<GpModel>,
}

impl GaussianProcess {
    /// Creates an unfitted GP with near-noiseless observations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            noise_variance: DEFAULT_NOISE_VAR,
            model: None,
        }
    }

    /// Creates an unfitted GP with the given observation noise variance.
    #[must_use]
    pub fn with_noise(noise_variance: f64) -> Self {
        Self {
            noise_variance,
            model: None,
        }
    }

    fn kernel_vector(model: &GpModel, x: &[f64]) -> DVector<f64> {
        DVector::from_fn(model.x_train.len(), |i, _| {
            matern52(x, &model.x_train[i], &model.lengthscales)
        })
    }
}

impl Default for GaussianProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GaussianProcess {
    fn name(&self) -> &'static str {
        "gp"
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.model = None;
        if y.is_empty() || x.len() != y.len() {
            return Err(Error::Internal("gaussian process needs aligned, non-empty data"));
        }
        let start = y.len().saturating_sub(MAX_TRAIN_POINTS);
        let (x, y) = (&x[start..], &y[start..]);
        let n = y.len();

        // Standardize y
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let y_var = if n > 1 {
            y.iter().map(|&v| (v - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            1.0
        };
        let y_std = y_var.sqrt().max(1e-10);
        let y_standardized: Vec<f64> = y.iter().map(|&v| (v - y_mean) / y_std).collect();

        // ARD lengthscales: per-dimension std dev of the inputs, clamped
        let d = x[0].len();
        let lengthscales: Vec<f64> = (0..d)
            .map(|j| {
                let mean_j = x.iter().map(|row| row[j]).sum::<f64>() / n as f64;
                let var_j = x.iter().map(|row| (row[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
                var_j.sqrt().max(0.01)
            })
            .collect();

        let k = DMatrix::from_fn(n, n, |i, j| {
            let k = matern52(&x[i], &x[j], &lengthscales);
            if i == j { k + self.noise_variance } else { k }
        });
        let cholesky = nalgebra::linalg::Cholesky::new(k)
            .ok_or(Error::Internal("kernel matrix is not positive definite"))?;
        let alpha = cholesky.solve(&DVector::from_column_slice(&y_standardized));

        self.model = Some(GpModel {
            l: cholesky.l(),
            alpha,
            x_train: x.to_vec(),
            lengthscales,
            y_mean,
            y_std,
        });
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        self.predict_with_std(x).map_or(0.0, |(mean, _)| mean)
    }

    fn predict_with_std(&self, x: &[f64]) -> Option<(f64, f64)> {
        let model = self.model.as_ref()?;
        let k_star = Self::kernel_vector(model, x);

        // Mean: k*^T α
        let mean = k_star.dot(&model.alpha);

        // Variance: k(x*, x*) - |L^{-1} k*|²
        let v = model.l.solve_lower_triangular(&k_star)?;
        let var = (1.0 - v.dot(&v)).max(0.0);

        Some((
            mean * model.y_std + model.y_mean,
            var.sqrt() * model.y_std,
        ))
    }

    fn has_std(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// k-nearest-neighbour regression
// ---------------------------------------------------------------------------

/// Default number of neighbours for the k-NN models.
pub(crate) const DEFAULT_NEIGHBORS: usize = 5;

/// The `k` nearest rows of `x_train` to `x`, as `(index, distance)`.
pub(crate) fn nearest(x_train: &[Vec<f64>], x: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = x_train
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let d = row
                .iter()
                .zip(x)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            (i, d)
        })
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1));
    distances.truncate(k.max(1));
    distances
}

/// Distance-weighted k-nearest-neighbour regressor. Has no predictive std.
#[derive(Clone, Debug)]
pub struct KNeighbors {
    k: usize,
    x_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
}

impl KNeighbors {
    /// Creates an unfitted regressor that averages `k` neighbours.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            x_train: Vec::new(),
            y_train: Vec::new(),
        }
    }
}

impl Regressor for KNeighbors {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if y.is_empty() || x.len() != y.len() {
            return Err(Error::Internal("k-nn needs aligned, non-empty data"));
        }
        self.x_train = x.to_vec();
        self.y_train = y.to_vec();
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, d) in nearest(&self.x_train, x, self.k) {
            if d < 1e-12 {
                return self.y_train[i];
            }
            num += self.y_train[i] / d;
            den += 1.0 / d;
        }
        if den > 0.0 { num / den } else { 0.0 }
    }
}
