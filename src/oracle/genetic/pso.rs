//! Particle Swarm Optimization backend.
//!
//! Each particle keeps a velocity, its personal best and follows the
//! swarm's global best:
//!
//! `v ← w·v + c1·r1·(p_best - x) + c2·r2·(g_best - x)`, `x ← x + v`
//!
//! Velocities are capped at the width of each dimension.

use super::{Algorithm, clamp_to_bounds, random_point};
use crate::error::{Error, Result};

const DEFAULT_SWARM: usize = 20;
const DEFAULT_INERTIA: f64 = 0.7;
const DEFAULT_COGNITIVE: f64 = 1.5;
const DEFAULT_SOCIAL: f64 = 1.5;

#[derive(Clone, Debug)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

/// Inertia-weight particle swarm.
#[derive(Clone, Debug)]
pub struct ParticleSwarm {
    swarm_size: usize,
    inertia: f64,
    cognitive: f64,
    social: f64,
    rng: fastrand::Rng,
    particles: Vec<Particle>,
    global_best: Option<(Vec<f64>, f64)>,
    /// `true` once the current positions have been evaluated.
    told: bool,
}

impl ParticleSwarm {
    /// Creates a swarm with default settings and the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            swarm_size: DEFAULT_SWARM,
            inertia: DEFAULT_INERTIA,
            cognitive: DEFAULT_COGNITIVE,
            social: DEFAULT_SOCIAL,
            rng: fastrand::Rng::with_seed(seed),
            particles: Vec::new(),
            global_best: None,
            told: false,
        }
    }

    /// Creates a builder for configuring the swarm.
    #[must_use]
    pub fn builder() -> ParticleSwarmBuilder {
        ParticleSwarmBuilder::default()
    }

    /// Best position and fitness found by the swarm.
    #[must_use]
    pub fn global_best(&self) -> Option<(&[f64], f64)> {
        self.global_best.as_ref().map(|(x, f)| (x.as_slice(), *f))
    }

    fn spawn(&mut self, position: Vec<f64>, fitness: f64, bounds: &[(f64, f64)]) -> Particle {
        let velocity = bounds
            .iter()
            .map(|&(lo, hi)| (self.rng.f64() - 0.5) * (hi - lo) * 0.1)
            .collect();
        Particle {
            best_position: position.clone(),
            position,
            velocity,
            best_fitness: fitness,
        }
    }

    fn step(&mut self, bounds: &[(f64, f64)]) {
        let Some((g_best, _)) = self.global_best.clone() else {
            return;
        };
        let (w, c1, c2) = (self.inertia, self.cognitive, self.social);
        for p in &mut self.particles {
            for (j, &(lo, hi)) in bounds.iter().enumerate() {
                let r1 = self.rng.f64();
                let r2 = self.rng.f64();
                let v_max = hi - lo;
                let v = w * p.velocity[j]
                    + c1 * r1 * (p.best_position[j] - p.position[j])
                    + c2 * r2 * (g_best[j] - p.position[j]);
                p.velocity[j] = v.clamp(-v_max, v_max);
                p.position[j] += p.velocity[j];
            }
            clamp_to_bounds(&mut p.position, bounds);
        }
    }
}

impl Algorithm for ParticleSwarm {
    fn ask(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        if self.particles.is_empty() {
            for _ in 0..self.swarm_size {
                let x = random_point(&mut self.rng, bounds);
                let particle = self.spawn(x, f64::INFINITY, bounds);
                self.particles.push(particle);
            }
        } else if self.told {
            self.step(bounds);
        }
        self.told = false;
        self.particles.iter().map(|p| p.position.clone()).collect()
    }

    fn tell(&mut self, population: &[Vec<f64>], fitness: &[f64]) {
        for ((p, x), &f) in self.particles.iter_mut().zip(population).zip(fitness) {
            if f < p.best_fitness {
                p.best_fitness = f;
                p.best_position.clone_from(x);
            }
            if self.global_best.as_ref().is_none_or(|(_, g)| f < *g) {
                self.global_best = Some((x.clone(), f));
            }
        }
        self.told = true;
    }

    fn restart(&mut self, elite: &[(Vec<f64>, f64)], bounds: &[(f64, f64)]) {
        self.particles.clear();
        for (x, f) in elite.iter().take(self.swarm_size) {
            let particle = self.spawn(x.clone(), *f, bounds);
            self.particles.push(particle);
        }
        while self.particles.len() < self.swarm_size {
            let x = random_point(&mut self.rng, bounds);
            let particle = self.spawn(x, f64::INFINITY, bounds);
            self.particles.push(particle);
        }
        self.global_best = elite.first().cloned();
        // Elite positions are already evaluated; move before the next ask
        self.told = self.global_best.is_some();
    }

    fn population_size(&self) -> usize {
        self.swarm_size
    }
}

/// Builder for configuring a [`ParticleSwarm`].
///
/// Defaults: 20 particles, w = 0.7, c1 = c2 = 1.5, seed 0.
#[derive(Debug, Clone, Default)]
pub struct ParticleSwarmBuilder {
    swarm_size: Option<usize>,
    inertia: Option<f64>,
    cognitive: Option<f64>,
    social: Option<f64>,
    seed: Option<u64>,
}

impl ParticleSwarmBuilder {
    /// Sets the number of particles.
    #[must_use]
    pub fn population_size(mut self, size: usize) -> Self {
        self.swarm_size = Some(size);
        self
    }

    /// Sets the inertia weight.
    #[must_use]
    pub fn inertia(mut self, w: f64) -> Self {
        self.inertia = Some(w);
        self
    }

    /// Sets the cognitive (personal best) coefficient.
    #[must_use]
    pub fn cognitive(mut self, c1: f64) -> Self {
        self.cognitive = Some(c1);
        self
    }

    /// Sets the social (global best) coefficient.
    #[must_use]
    pub fn social(mut self, c2: f64) -> Self {
        self.social = Some(c2);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the swarm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] for fewer than two particles
    /// or negative coefficients.
    pub fn build(self) -> Result<ParticleSwarm> {
        let mut pso = ParticleSwarm::new(self.seed.unwrap_or(0));
        pso.swarm_size = self.swarm_size.unwrap_or(DEFAULT_SWARM);
        pso.inertia = self.inertia.unwrap_or(DEFAULT_INERTIA);
        pso.cognitive = self.cognitive.unwrap_or(DEFAULT_COGNITIVE);
        pso.social = self.social.unwrap_or(DEFAULT_SOCIAL);
        if pso.swarm_size < 2 {
            return Err(Error::invalid_param("pso", "pop_size", "must be at least 2"));
        }
        for (name, v) in [
            ("w", pso.inertia),
            ("c1", pso.cognitive),
            ("c2", pso.social),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::invalid_param("pso", name, "must be non-negative"));
            }
        }
        Ok(pso)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swarm_improves_on_sphere() {
        let bounds = [(-5.0, 5.0), (-5.0, 5.0)];
        let mut pso = ParticleSwarm::builder()
            .population_size(12)
            .seed(8)
            .build()
            .unwrap();
        let mut first = None;
        for _ in 0..40 {
            let pop = pso.ask(&bounds);
            let fitness: Vec<f64> = pop.iter().map(|x| x[0] * x[0] + x[1] * x[1]).collect();
            pso.tell(&pop, &fitness);
            first.get_or_insert(pso.global_best().unwrap().1);
        }
        let (_, best) = pso.global_best().unwrap();
        assert!(best <= first.unwrap());
        assert!(best < 0.5);
    }

    #[test]
    fn unevaluated_swarm_does_not_move() {
        let bounds = [(0.0, 1.0)];
        let mut pso = ParticleSwarm::new(2);
        let a = pso.ask(&bounds);
        let b = pso.ask(&bounds);
        assert_eq!(a, b);
    }

    #[test]
    fn restart_seeds_global_best() {
        let bounds = [(0.0, 1.0)];
        let mut pso = ParticleSwarm::new(2);
        pso.restart(&[(vec![0.25], 0.5)], &bounds);
        assert_eq!(pso.global_best(), Some((&[0.25][..], 0.5)));
        assert_eq!(pso.ask(&bounds).len(), 20);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(ParticleSwarm::builder().population_size(1).build().is_err());
        assert!(ParticleSwarm::builder().inertia(-0.1).build().is_err());
    }
}
