//! Differential Evolution (DE) backend.
//!
//! Each generation, for every population member *xᵢ*:
//! 1. **Mutation** — create a mutant vector *v* from other population
//!    members using the selected [`DEStrategy`]:
//!    - `Rand1`:  `v = x_r1 + F * (x_r2 - x_r3)`
//!    - `Best1`:  `v = x_best + F * (x_r1 - x_r2)`
//!    - `CurrentToBest1`:  `v = x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`
//! 2. **Crossover** — create a trial vector *u* by mixing *v* and *xᵢ*
//!    dimension-by-dimension with probability CR.
//! 3. **Selection** — replace *xᵢ* with *u* if `f(u) ≤ f(xᵢ)`.

use super::{Algorithm, clamp_to_bounds, random_point};
use crate::error::{Error, Result};

const DEFAULT_POPULATION: usize = 15;
const DEFAULT_F: f64 = 0.8;
const DEFAULT_CR: f64 = 0.9;

/// Differential Evolution mutation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DEStrategy {
    /// DE/rand/1: `v = x_r1 + F * (x_r2 - x_r3)`
    ///
    /// The most robust strategy. Uses three random population members.
    #[default]
    Rand1,
    /// DE/best/1: `v = x_best + F * (x_r1 - x_r2)`
    Best1,
    /// DE/current-to-best/1: `v = x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`
    CurrentToBest1,
}

impl DEStrategy {
    /// Parses a DSL strategy name (`rand1`, `best1`, `current_to_best1`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "rand1" => Ok(Self::Rand1),
            "best1" => Ok(Self::Best1),
            "current_to_best1" => Ok(Self::CurrentToBest1),
            other => Err(Error::invalid_param(
                "de",
                "strategy",
                format!("unknown strategy '{other}'"),
            )),
        }
    }
}

/// Where the population stands relative to the last `ask`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// The last `ask` produced the initial population.
    Initializing,
    /// The last `ask` produced one trial vector per member.
    Evolving,
}

/// Differential Evolution for continuous global optimization.
#[derive(Clone, Debug)]
pub struct DifferentialEvolution {
    population_size: usize,
    mutation_factor: f64,
    crossover_rate: f64,
    strategy: DEStrategy,
    rng: fastrand::Rng,
    phase: Phase,
    population: Vec<Vec<f64>>,
    fitness: Vec<f64>,
}

impl DifferentialEvolution {
    /// Creates a DE backend with default settings and the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            population_size: DEFAULT_POPULATION,
            mutation_factor: DEFAULT_F,
            crossover_rate: DEFAULT_CR,
            strategy: DEStrategy::Rand1,
            rng: fastrand::Rng::with_seed(seed),
            phase: Phase::Initializing,
            population: Vec::new(),
            fitness: Vec::new(),
        }
    }

    /// Creates a builder for configuring the backend.
    #[must_use]
    pub fn builder() -> DifferentialEvolutionBuilder {
        DifferentialEvolutionBuilder::default()
    }

    /// Current population (parents).
    #[must_use]
    pub fn population(&self) -> &[Vec<f64>] {
        &self.population
    }

    /// Fitness of the current population, aligned with [`population`](Self::population).
    #[must_use]
    pub fn fitness(&self) -> &[f64] {
        &self.fitness
    }

    fn best_idx(&self) -> usize {
        self.fitness
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i)
    }

    /// Select `count` distinct random indices from `0..n`, all different from `exclude`.
    fn select_random_indices(&mut self, n: usize, count: usize, exclude: usize) -> Vec<usize> {
        let mut selected = Vec::with_capacity(count);
        while selected.len() < count {
            let idx = self.rng.usize(0..n);
            if idx != exclude && !selected.contains(&idx) {
                selected.push(idx);
            }
        }
        selected
    }

    fn mutant(&mut self, target: usize, best: usize) -> Vec<f64> {
        let n = self.population.len();
        let f = self.mutation_factor;
        let count = if self.strategy == DEStrategy::Rand1 { 3 } else { 2 };
        let r = self.select_random_indices(n, count, target);
        let pop = &self.population;
        let dims = pop[target].len();
        match self.strategy {
            DEStrategy::Rand1 => (0..dims)
                .map(|j| pop[r[0]][j] + f * (pop[r[1]][j] - pop[r[2]][j]))
                .collect(),
            DEStrategy::Best1 => (0..dims)
                .map(|j| pop[best][j] + f * (pop[r[0]][j] - pop[r[1]][j]))
                .collect(),
            DEStrategy::CurrentToBest1 => (0..dims)
                .map(|j| {
                    pop[target][j]
                        + f * (pop[best][j] - pop[target][j])
                        + f * (pop[r[0]][j] - pop[r[1]][j])
                })
                .collect(),
        }
    }

    /// Mutation plus binomial crossover for every member.
    fn trial_vectors(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let best = self.best_idx();
        let mut trials = Vec::with_capacity(self.population.len());
        for i in 0..self.population.len() {
            let mutant = self.mutant(i, best);
            let dims = mutant.len();
            let j_rand = self.rng.usize(0..dims.max(1));
            let mut trial: Vec<f64> = (0..dims)
                .map(|j| {
                    if j == j_rand || self.rng.f64() < self.crossover_rate {
                        mutant[j]
                    } else {
                        self.population[i][j]
                    }
                })
                .collect();
            clamp_to_bounds(&mut trial, bounds);
            trials.push(trial);
        }
        trials
    }
}

impl Algorithm for DifferentialEvolution {
    fn ask(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        if self.population.len() < 4 {
            self.phase = Phase::Initializing;
            return (0..self.population_size)
                .map(|_| random_point(&mut self.rng, bounds))
                .collect();
        }
        self.phase = Phase::Evolving;
        self.trial_vectors(bounds)
    }

    fn tell(&mut self, population: &[Vec<f64>], fitness: &[f64]) {
        match self.phase {
            Phase::Initializing => {
                self.population = population.to_vec();
                self.fitness = fitness.to_vec();
            }
            Phase::Evolving => {
                for (i, (trial, &f)) in population.iter().zip(fitness).enumerate() {
                    if i < self.fitness.len() && f <= self.fitness[i] {
                        self.population[i].clone_from(trial);
                        self.fitness[i] = f;
                    }
                }
            }
        }
    }

    fn restart(&mut self, elite: &[(Vec<f64>, f64)], bounds: &[(f64, f64)]) {
        self.population.clear();
        self.fitness.clear();
        for (x, f) in elite.iter().take(self.population_size) {
            self.population.push(x.clone());
            self.fitness.push(*f);
        }
        while self.population.len() < self.population_size {
            self.population.push(random_point(&mut self.rng, bounds));
            self.fitness.push(f64::INFINITY);
        }
        self.phase = Phase::Evolving;
    }

    fn population_size(&self) -> usize {
        self.population_size
    }
}

/// Builder for configuring a [`DifferentialEvolution`] backend.
///
/// Defaults: population 15, F = 0.8, CR = 0.9, strategy `Rand1`, seed 0.
#[derive(Debug, Clone, Default)]
pub struct DifferentialEvolutionBuilder {
    population_size: Option<usize>,
    mutation_factor: Option<f64>,
    crossover_rate: Option<f64>,
    strategy: Option<DEStrategy>,
    seed: Option<u64>,
}

impl DifferentialEvolutionBuilder {
    /// Sets the number of individuals per generation (at least 4).
    #[must_use]
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Sets the differential weight F, in `(0, 2]`.
    #[must_use]
    pub fn mutation_factor(mut self, f: f64) -> Self {
        self.mutation_factor = Some(f);
        self
    }

    /// Sets the crossover probability CR, in `[0, 1]`.
    #[must_use]
    pub fn crossover_rate(mut self, cr: f64) -> Self {
        self.crossover_rate = Some(cr);
        self
    }

    /// Sets the mutation strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: DEStrategy) -> Self {
        self.strategy = Some(strategy);
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
    /// Returns [`Error::InvalidOracleParameter`] if a setting is out of range.
    pub fn build(self) -> Result<DifferentialEvolution> {
        let mut de = DifferentialEvolution::new(self.seed.unwrap_or(0));
        de.population_size = self.population_size.unwrap_or(DEFAULT_POPULATION);
        de.mutation_factor = self.mutation_factor.unwrap_or(DEFAULT_F);
        de.crossover_rate = self.crossover_rate.unwrap_or(DEFAULT_CR);
        de.strategy = self.strategy.unwrap_or_default();
        if de.population_size < 4 {
            return Err(Error::invalid_param("de", "pop_size", "must be at least 4"));
        }
        if !(de.mutation_factor > 0.0 && de.mutation_factor <= 2.0) {
            return Err(Error::invalid_param("de", "f", "must be in (0, 2]"));
        }
        if !(0.0..=1.0).contains(&de.crossover_rate) {
            return Err(Error::invalid_param("de", "cr", "must be in [0, 1]"));
        }
        Ok(de)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn selection_never_worsens_parents() {
        let bounds = [(-5.0, 5.0), (-5.0, 5.0)];
        let mut de = DifferentialEvolution::builder()
            .population_size(10)
            .seed(4)
            .build()
            .unwrap();
        let mut previous_best = f64::INFINITY;
        for _ in 0..30 {
            let pop = de.ask(&bounds);
            let fitness: Vec<f64> = pop.iter().map(|x| sphere(x)).collect();
            de.tell(&pop, &fitness);
            let best = de.fitness().iter().copied().fold(f64::INFINITY, f64::min);
            assert!(best <= previous_best);
            previous_best = best;
        }
        assert!(previous_best < 1.0);
    }

    #[test]
    fn trial_vectors_respect_bounds() {
        let bounds = [(0.0, 1.0)];
        let mut de = DifferentialEvolution::new(9);
        let pop = de.ask(&bounds);
        de.tell(&pop, &vec![1.0; pop.len()]);
        for x in de.ask(&bounds) {
            assert!((0.0..=1.0).contains(&x[0]));
        }
    }

    #[test]
    fn restart_keeps_elite() {
        let bounds = [(0.0, 1.0)];
        let mut de = DifferentialEvolution::new(1);
        de.restart(&[(vec![0.5], 0.1)], &bounds);
        assert_eq!(de.population().len(), 15);
        assert_eq!(de.population()[0], vec![0.5]);
        assert!(de.fitness()[1].is_infinite());
    }

    #[test]
    fn rejects_small_population() {
        assert!(DifferentialEvolution::builder().population_size(3).build().is_err());
        assert!(DEStrategy::parse("best2").is_err());
    }
}
