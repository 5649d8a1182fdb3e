//! CMA-ES (Covariance Matrix Adaptation Evolution Strategy) backend.
//!
//! Candidates are sampled from a multivariate normal `N(m, σ²C)`. After
//! each generation the best `μ` candidates move the mean, the evolution
//! paths are accumulated, and `C` receives rank-one and rank-μ updates;
//! `σ` follows cumulative step-size adaptation. Eigendecomposition of `C`
//! is refreshed on a schedule.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::Algorithm;
use crate::error::{Error, Result};

/// The CMA-ES algorithm constants, derived from dimension count.
#[derive(Clone, Debug)]
struct Constants {
    n: usize,
    lambda: usize,
    mu: usize,
    /// Recombination weights (length mu).
    weights: Vec<f64>,
    /// Variance effective selection mass.
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    /// Expected norm of N(0, I) in n dimensions.
    chi_n: f64,
}

impl Constants {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn new(n: usize, user_lambda: Option<usize>) -> Self {
        let n_f = (n as f64).max(1.0);

        let lambda = user_lambda.unwrap_or_else(|| 4 + (3.0 * n_f.ln()).max(0.0).floor() as usize);
        let lambda = lambda.max(4);
        let mu = lambda / 2;

        // Log-proportional recombination weights
        let log_half_lambda = f64::midpoint(lambda as f64, 1.0).ln();
        let raw_weights: Vec<f64> = (0..mu)
            .map(|i| log_half_lambda - ((i + 1) as f64).ln())
            .collect();
        let w_sum: f64 = raw_weights.iter().sum();
        let weights: Vec<f64> = raw_weights.iter().map(|w| w / w_sum).collect();

        let w_sq_sum: f64 = weights.iter().map(|w| w * w).sum();
        let mu_eff = 1.0 / w_sq_sum;

        let c_sigma = (mu_eff + 2.0) / (n_f + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n_f + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / n_f) / (n_f + 4.0 + 2.0 * mu_eff / n_f);
        let c_1 = 2.0 / ((n_f + 1.3).powi(2) + mu_eff);
        let c_mu_raw = (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff)) / ((n_f + 2.0).powi(2) + mu_eff);
        let c_mu = c_mu_raw.min(1.0 - c_1);

        let chi_n = n_f.sqrt() * (1.0 - 1.0 / (4.0 * n_f) + 1.0 / (21.0 * n_f * n_f));

        Self {
            n,
            lambda,
            mu,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
        }
    }
}

/// The adapted search distribution.
#[derive(Clone, Debug)]
struct Distribution {
    mean: DVector<f64>,
    sigma: f64,
    c: DMatrix<f64>,
    p_sigma: DVector<f64>,
    p_c: DVector<f64>,
    /// Eigenvectors of C (columns of B).
    b: DMatrix<f64>,
    /// Sqrt of eigenvalues of C (diagonal of D).
    d: DVector<f64>,
    inv_sqrt_c: DMatrix<f64>,
    generation: usize,
    last_eigen_generation: usize,
    constants: Constants,
}

impl Distribution {
    /// Isotropic distribution centred on `mean`.
    fn new(mean: DVector<f64>, sigma: f64, constants: Constants) -> Self {
        let n = constants.n;
        Self {
            mean,
            sigma,
            c: DMatrix::identity(n, n),
            p_sigma: DVector::zeros(n),
            p_c: DVector::zeros(n),
            b: DMatrix::identity(n, n),
            d: DVector::from_element(n, 1.0),
            inv_sqrt_c: DMatrix::identity(n, n),
            generation: 0,
            last_eigen_generation: 0,
            constants,
        }
    }

    /// `x = mean + sigma * B * D * z`, z ~ N(0, I), with rejection sampling
    /// against `bounds` and clipping as a fallback.
    fn sample(&self, rng: &mut StdRng, bounds: &[(f64, f64)]) -> DVector<f64> {
        let n = self.constants.n;
        for _ in 0..100 {
            let z = DVector::from_fn(n, |_, _| sample_standard_normal(rng));
            let x = &self.mean + self.sigma * (&self.b * self.d.component_mul(&z));
            if is_within_bounds(&x, bounds) {
                return x;
            }
        }
        let z = DVector::from_fn(n, |_, _| sample_standard_normal(rng));
        let mut x = &self.mean + self.sigma * (&self.b * self.d.component_mul(&z));
        for (i, &(lo, hi)) in bounds.iter().enumerate().take(n) {
            x[i] = x[i].clamp(lo, hi);
        }
        x
    }

    /// Run the CMA-ES update step given candidates ranked best first.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn update(&mut self, ranked: &[DVector<f64>]) {
        let k = &self.constants;
        let n = k.n;
        let mu = k.mu.min(ranked.len());
        let sigma = self.sigma;

        // Renormalize weights if fewer than mu candidates are available
        let w_sum: f64 = k.weights.iter().take(mu).sum();
        let weights: Vec<f64> = k.weights.iter().take(mu).map(|w| w / w_sum).collect();

        let mut new_mean = DVector::zeros(n);
        for (w, x) in weights.iter().zip(ranked) {
            new_mean += *w * x;
        }
        let mean_diff = &new_mean - &self.mean;

        // Cumulation for sigma control
        let inv_sqrt_c_times_diff = &self.inv_sqrt_c * &mean_diff / sigma;
        self.p_sigma = (1.0 - k.c_sigma) * &self.p_sigma
            + (k.c_sigma * (2.0 - k.c_sigma) * k.mu_eff).sqrt() * &inv_sqrt_c_times_diff;

        // h_sigma: stall indicator
        let p_sigma_norm = self.p_sigma.norm();
        let threshold = (1.0 - (1.0 - k.c_sigma).powi(2 * (self.generation as i32 + 1))).sqrt()
            * (1.4 + 2.0 / (n as f64 + 1.0))
            * k.chi_n;
        let h_sigma = if p_sigma_norm < threshold { 1.0 } else { 0.0 };

        // Cumulation for the rank-one update
        self.p_c = (1.0 - k.c_c) * &self.p_c
            + h_sigma * (k.c_c * (2.0 - k.c_c) * k.mu_eff).sqrt() * &mean_diff / sigma;

        let delta_h = (1.0 - h_sigma) * k.c_c * (2.0 - k.c_c);
        let old_c_weight = 1.0 - k.c_1 - k.c_mu + k.c_1 * delta_h;
        let rank_one = k.c_1 * &self.p_c * self.p_c.transpose();

        let mut rank_mu = DMatrix::zeros(n, n);
        for (w, x) in weights.iter().zip(ranked) {
            let y = (x - &self.mean) / sigma;
            rank_mu += *w * &y * y.transpose();
        }
        let rank_mu = k.c_mu * rank_mu;

        self.c = old_c_weight * &self.c + rank_one + rank_mu;

        // Cumulative step-size adaptation
        self.sigma *= ((k.c_sigma / k.d_sigma) * (p_sigma_norm / k.chi_n - 1.0)).exp();
        self.sigma = self.sigma.clamp(1e-20, 1e10);

        self.mean = new_mean;
        self.generation += 1;

        let eigen_interval = (n / 10).max(1);
        if self.generation - self.last_eigen_generation >= eigen_interval {
            self.update_eigen();
        }
    }

    /// Eigendecomposition of C; refreshes B, D and `C^{-1/2}`.
    fn update_eigen(&mut self) {
        let n = self.constants.n;

        // Enforce symmetry
        self.c = (&self.c + self.c.transpose()) / 2.0;

        let eigen = self.c.clone().symmetric_eigen();
        self.d = DVector::from_fn(n, |i, _| eigen.eigenvalues[i].max(1e-20).sqrt());
        self.b = eigen.eigenvectors;

        let d_inv = DVector::from_fn(n, |i, _| 1.0 / self.d[i]);
        self.inv_sqrt_c = &self.b * DMatrix::from_diagonal(&d_inv) * self.b.transpose();

        self.last_eigen_generation = self.generation;
    }
}

fn is_within_bounds(x: &DVector<f64>, bounds: &[(f64, f64)]) -> bool {
    x.iter()
        .zip(bounds)
        .all(|(v, &(lo, hi))| *v >= lo && *v <= hi)
}

/// Sample a value from the standard normal distribution using Box-Muller transform.
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..=1.0);
    let u2: f64 = rng.random_range(0.0_f64..=core::f64::consts::TAU);
    (-2.0 * u1.ln()).sqrt() * u2.cos()
}

/// CMA-ES backend.
///
/// The initial mean is the centre of the bounds and the initial step size
/// a quarter of the average range, unless set through the builder.
#[derive(Debug)]
pub struct CmaEs {
    rng: StdRng,
    sigma0: Option<f64>,
    user_lambda: Option<usize>,
    distribution: Option<Distribution>,
}

impl CmaEs {
    /// Creates a backend with automatic settings and the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sigma0: None,
            user_lambda: None,
            distribution: None,
        }
    }

    /// Creates a builder for configuring the backend.
    #[must_use]
    pub fn builder() -> CmaEsBuilder {
        CmaEsBuilder::default()
    }

    /// Current step size, once initialized.
    #[must_use]
    pub fn sigma(&self) -> Option<f64> {
        self.distribution.as_ref().map(|d| d.sigma)
    }

    /// Current mean, once initialized.
    #[must_use]
    pub fn mean(&self) -> Option<Vec<f64>> {
        self.distribution.as_ref().map(|d| d.mean.iter().copied().collect())
    }

    #[allow(clippy::cast_precision_loss)]
    fn initial_sigma(&self, bounds: &[(f64, f64)]) -> f64 {
        self.sigma0.unwrap_or_else(|| {
            if bounds.is_empty() {
                1.0
            } else {
                let total: f64 = bounds.iter().map(|(lo, hi)| hi - lo).sum();
                (total / bounds.len() as f64 / 4.0).max(1e-12)
            }
        })
    }

    fn fresh(&self, mean: DVector<f64>, bounds: &[(f64, f64)]) -> Distribution {
        Distribution::new(
            mean,
            self.initial_sigma(bounds),
            Constants::new(bounds.len(), self.user_lambda),
        )
    }
}

impl Algorithm for CmaEs {
    fn ask(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        if self.distribution.is_none() {
            let mean = DVector::from_iterator(
                bounds.len(),
                bounds.iter().map(|(lo, hi)| f64::midpoint(*lo, *hi)),
            );
            self.distribution = Some(self.fresh(mean, bounds));
        }
        let Some(dist) = &self.distribution else {
            return Vec::new();
        };
        (0..dist.constants.lambda)
            .map(|_| dist.sample(&mut self.rng, bounds).iter().copied().collect())
            .collect()
    }

    fn tell(&mut self, population: &[Vec<f64>], fitness: &[f64]) {
        let Some(dist) = &mut self.distribution else {
            return;
        };
        let n = dist.constants.n;
        if n == 0 || population.is_empty() {
            return;
        }
        let mut order: Vec<usize> = (0..population.len().min(fitness.len())).collect();
        order.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));
        let ranked: Vec<DVector<f64>> = order
            .into_iter()
            .map(|i| DVector::from_column_slice(&population[i]))
            .filter(|x| x.len() == n)
            .collect();
        if !ranked.is_empty() {
            dist.update(&ranked);
        }
    }

    fn restart(&mut self, elite: &[(Vec<f64>, f64)], bounds: &[(f64, f64)]) {
        let mean = elite
            .first()
            .filter(|(x, _)| x.len() == bounds.len())
            .map_or_else(
                || {
                    DVector::from_iterator(
                        bounds.len(),
                        bounds.iter().map(|(lo, hi)| f64::midpoint(*lo, *hi)),
                    )
                },
                |(x, _)| DVector::from_column_slice(x),
            );
        self.distribution = Some(self.fresh(mean, bounds));
    }

    fn population_size(&self) -> usize {
        self.distribution.as_ref().map_or_else(
            || self.user_lambda.unwrap_or(4).max(4),
            |d| d.constants.lambda,
        )
    }
}

/// Builder for configuring a [`CmaEs`] backend.
#[derive(Debug, Clone, Default)]
pub struct CmaEsBuilder {
    sigma0: Option<f64>,
    population_size: Option<usize>,
    seed: Option<u64>,
}

impl CmaEsBuilder {
    /// Sets the initial step size. Default: a quarter of the average range.
    #[must_use]
    pub fn sigma0(mut self, sigma0: f64) -> Self {
        self.sigma0 = Some(sigma0);
        self
    }

    /// Sets the population size (lambda). Default: `4 + floor(3 ln n)`.
    #[must_use]
    pub fn population_size(mut self, population_size: usize) -> Self {
        self.population_size = Some(population_size);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if `sigma0` is not positive
    /// or the population is smaller than 4.
    pub fn build(self) -> Result<CmaEs> {
        if let Some(s) = self.sigma0
            && !(s.is_finite() && s > 0.0)
        {
            return Err(Error::invalid_param("cmaes", "sigma0", "must be positive"));
        }
        if let Some(p) = self.population_size
            && p < 4
        {
            return Err(Error::invalid_param("cmaes", "pop_size", "must be at least 4"));
        }
        let mut cma = CmaEs::new(self.seed.unwrap_or(0));
        cma.sigma0 = self.sigma0;
        cma.user_lambda = self.population_size;
        Ok(cma)
    }
}
