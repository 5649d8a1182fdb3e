//! Real-coded genetic algorithm backend.
//!
//! Binary tournament selection, simulated binary crossover (SBX) and
//! polynomial mutation, with (μ+λ) survival: parents and offspring compete
//! and the best `pop_size` carry over.

use super::{Algorithm, random_point};
use crate::error::{Error, Result};
use crate::rng_util;

const DEFAULT_POPULATION: usize = 20;
const DEFAULT_CROSSOVER_ETA: f64 = 15.0;
const DEFAULT_CROSSOVER_PROB: f64 = 0.9;
const DEFAULT_MUTATION_ETA: f64 = 20.0;

/// Genetic algorithm over real vectors.
#[derive(Clone, Debug)]
pub struct GeneticAlgorithm {
    population_size: usize,
    crossover_eta: f64,
    crossover_prob: f64,
    mutation_eta: f64,
    rng: fastrand::Rng,
    /// Surviving individuals with their fitness.
    pool: Vec<(Vec<f64>, f64)>,
}

impl GeneticAlgorithm {
    /// Creates a GA with default settings and the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            population_size: DEFAULT_POPULATION,
            crossover_eta: DEFAULT_CROSSOVER_ETA,
            crossover_prob: DEFAULT_CROSSOVER_PROB,
            mutation_eta: DEFAULT_MUTATION_ETA,
            rng: fastrand::Rng::with_seed(seed),
            pool: Vec::new(),
        }
    }

    /// Creates a builder for configuring the GA.
    #[must_use]
    pub fn builder() -> GeneticAlgorithmBuilder {
        GeneticAlgorithmBuilder::default()
    }

    /// Surviving individuals, best first.
    #[must_use]
    pub fn pool(&self) -> &[(Vec<f64>, f64)] {
        &self.pool
    }

    /// Binary tournament on the pool.
    fn tournament(&mut self) -> usize {
        let a = self.rng.usize(0..self.pool.len());
        let b = self.rng.usize(0..self.pool.len());
        if self.pool[a].1 <= self.pool[b].1 { a } else { b }
    }

    fn offspring(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let mut children = Vec::with_capacity(self.population_size);
        while children.len() < self.population_size {
            let (i, j) = (self.tournament(), self.tournament());
            let p1 = self.pool[i].0.clone();
            let p2 = self.pool[j].0.clone();
            let (mut c1, mut c2) = if self.rng.f64() < self.crossover_prob {
                self.crossover(&p1, &p2, bounds)
            } else {
                (p1, p2)
            };
            self.mutate(&mut c1, bounds);
            self.mutate(&mut c2, bounds);
            children.push(c1);
            if children.len() < self.population_size {
                children.push(c2);
            }
        }
        children
    }

    /// SBX, each dimension crossed with probability one half.
    fn crossover(&mut self, p1: &[f64], p2: &[f64], bounds: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
        let mut c1 = p1.to_vec();
        let mut c2 = p2.to_vec();
        for (j, &(lo, hi)) in bounds.iter().enumerate() {
            if self.rng.f64() < 0.5 {
                let (a, b) = sbx(&mut self.rng, p1[j], p2[j], lo, hi, self.crossover_eta);
                c1[j] = a;
                c2[j] = b;
            }
        }
        (c1, c2)
    }

    /// Polynomial mutation with per-dimension probability `1/d`.
    #[allow(clippy::cast_precision_loss)]
    fn mutate(&mut self, x: &mut [f64], bounds: &[(f64, f64)]) {
        if bounds.is_empty() {
            return;
        }
        let prob = 1.0 / bounds.len() as f64;
        for (v, &(lo, hi)) in x.iter_mut().zip(bounds) {
            if self.rng.f64() < prob {
                *v = polynomial_mutation(&mut self.rng, *v, lo, hi, self.mutation_eta);
            }
        }
    }
}

/// Simulated binary crossover of one coordinate.
fn sbx(rng: &mut fastrand::Rng, p1: f64, p2: f64, low: f64, high: f64, eta: f64) -> (f64, f64) {
    let u = rng_util::f64_range(rng, 0.0, 1.0);
    let beta = if u <= 0.5 {
        (2.0 * u).powf(1.0 / (eta + 1.0))
    } else {
        (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
    };
    let c1 = 0.5 * ((1.0 + beta) * p1 + (1.0 - beta) * p2);
    let c2 = 0.5 * ((1.0 - beta) * p1 + (1.0 + beta) * p2);
    (c1.clamp(low, high), c2.clamp(low, high))
}

/// Bounded polynomial mutation of one coordinate.
fn polynomial_mutation(rng: &mut fastrand::Rng, x: f64, low: f64, high: f64, eta: f64) -> f64 {
    let range = high - low;
    if range <= 0.0 {
        return x;
    }
    let u = rng_util::f64_range(rng, 0.0, 1.0);
    let delta1 = (x - low) / range;
    let delta2 = (high - x) / range;
    let delta_q = if u < 0.5 {
        let xy = 1.0 - delta1;
        let val = 2.0 * u + (1.0 - 2.0 * u) * xy.powf(eta + 1.0);
        val.powf(1.0 / (eta + 1.0)) - 1.0
    } else {
        let xy = 1.0 - delta2;
        let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * xy.powf(eta + 1.0);
        1.0 - val.powf(1.0 / (eta + 1.0))
    };
    (x + delta_q * range).clamp(low, high)
}

impl Algorithm for GeneticAlgorithm {
    fn ask(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        if self.pool.is_empty() {
            return (0..self.population_size)
                .map(|_| random_point(&mut self.rng, bounds))
                .collect();
        }
        self.offspring(bounds)
    }

    fn tell(&mut self, population: &[Vec<f64>], fitness: &[f64]) {
        self.pool.extend(
            population
                .iter()
                .cloned()
                .zip(fitness.iter().copied()),
        );
        self.pool.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.pool.truncate(self.population_size);
    }

    fn restart(&mut self, elite: &[(Vec<f64>, f64)], _bounds: &[(f64, f64)]) {
        self.pool = elite.iter().take(self.population_size).cloned().collect();
    }

    fn population_size(&self) -> usize {
        self.population_size
    }
}

/// Builder for configuring a [`GeneticAlgorithm`].
///
/// Defaults: population 20, SBX η = 15 with probability 0.9, mutation η = 20.
#[derive(Debug, Clone, Default)]
pub struct GeneticAlgorithmBuilder {
    population_size: Option<usize>,
    crossover_eta: Option<f64>,
    crossover_prob: Option<f64>,
    mutation_eta: Option<f64>,
    seed: Option<u64>,
}

impl GeneticAlgorithmBuilder {
    /// Sets the number of individuals per generation.
    #[must_use]
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Sets the SBX distribution index.
    #[must_use]
    pub fn crossover_eta(mut self, eta: f64) -> Self {
        self.crossover_eta = Some(eta);
        self
    }

    /// Sets the probability of crossing a pair of parents.
    #[must_use]
    pub fn crossover_prob(mut self, prob: f64) -> Self {
        self.crossover_prob = Some(prob);
        self
    }

    /// Sets the polynomial mutation distribution index.
    #[must_use]
    pub fn mutation_eta(mut self, eta: f64) -> Self {
        self.mutation_eta = Some(eta);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the GA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if a setting is out of range.
    pub fn build(self) -> Result<GeneticAlgorithm> {
        let mut ga = GeneticAlgorithm::new(self.seed.unwrap_or(0));
        ga.population_size = self.population_size.unwrap_or(DEFAULT_POPULATION);
        ga.crossover_eta = self.crossover_eta.unwrap_or(DEFAULT_CROSSOVER_ETA);
        ga.crossover_prob = self.crossover_prob.unwrap_or(DEFAULT_CROSSOVER_PROB);
        ga.mutation_eta = self.mutation_eta.unwrap_or(DEFAULT_MUTATION_ETA);
        if ga.population_size < 2 {
            return Err(Error::invalid_param("ga", "pop_size", "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&ga.crossover_prob) {
            return Err(Error::invalid_param("ga", "cx_prob", "must be in [0, 1]"));
        }
        if !(ga.crossover_eta >= 0.0 && ga.mutation_eta >= 0.0) {
            return Err(Error::invalid_param("ga", "eta", "must be non-negative"));
        }
        Ok(ga)
    }
}
