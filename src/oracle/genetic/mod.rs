//! Population-based oracles.
//!
//! [`GeneticOracle`] adapts any evolutionary [`Algorithm`] to the ask/tell
//! protocol. The backend works on numeric vectors in search-space layout
//! (categoricals as choice index) and sees one whole generation at a time;
//! the oracle tracks which members have been told, pads stragglers with
//! `+∞` when a new generation is requested early, and restarts the backend
//! when another oracle finds something better than anything it has seen.
//!
//! | Backend | Strategy |
//! |---------|----------|
//! | [`DifferentialEvolution`] | DE/rand/1/bin (F = 0.8, CR = 0.9) |
//! | [`CmaEs`] | CMA-ES with full covariance adaptation |
//! | [`ParticleSwarm`] | Inertia-weight PSO (w = 0.7, c1 = c2 = 1.5) |
//! | [`GeneticAlgorithm`] | Tournament selection, SBX, polynomial mutation |

mod cma_es;
mod de;
mod ga;
mod pso;

pub use cma_es::{CmaEs, CmaEsBuilder};
pub use de::{DEStrategy, DifferentialEvolution, DifferentialEvolutionBuilder};
pub use ga::{GeneticAlgorithm, GeneticAlgorithmBuilder};
pub use pso::{ParticleSwarm, ParticleSwarmBuilder};

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::Result;
use crate::plugin::{Event, Notifier, Subscriber};
use crate::rng_util;
use crate::space::SearchSpace;

/// Plugins hear about tells only once more than this many results are known.
const NOTIFY_AFTER: usize = 5;

/// An evolutionary backend driven one generation at a time.
pub trait Algorithm: Send {
    /// Produces the next generation inside `bounds`.
    fn ask(&mut self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>>;

    /// Reports the fitness (lower is better) of the generation last asked.
    fn tell(&mut self, population: &[Vec<f64>], fitness: &[f64]);

    /// Restarts from an elite pool, sorted best first.
    fn restart(&mut self, elite: &[(Vec<f64>, f64)], bounds: &[(f64, f64)]);

    /// Number of individuals per generation.
    fn population_size(&self) -> usize;
}

/// Draws a uniform point inside `bounds`.
pub(crate) fn random_point(rng: &mut fastrand::Rng, bounds: &[(f64, f64)]) -> Vec<f64> {
    bounds
        .iter()
        .map(|&(lo, hi)| rng_util::f64_range(rng, lo, hi))
        .collect()
}

/// Clamps every coordinate of `x` into `bounds`.
pub(crate) fn clamp_to_bounds(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (v, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *v = if v.is_finite() { v.clamp(lo, hi) } else { lo };
    }
}

/// Packs a generation counter and member index into a request id.
fn request_id(generation: u64, index: usize) -> u64 {
    (generation << 32) | (index as u64 & 0xFFFF_FFFF)
}

/// The current generation as handed out by `ask`.
#[derive(Clone, Debug, Default)]
struct Generation {
    id: u64,
    members: Vec<Vec<f64>>,
    fitness: Vec<Option<f64>>,
    /// `false` once reported to the backend (or abandoned by a restart).
    open: bool,
}

/// Adapts an [`Algorithm`] to the [`Oracle`] protocol.
///
/// # Examples
///
/// ```
/// use feijoa::oracle::genetic::{DifferentialEvolution, GeneticOracle};
/// use feijoa::{Oracle, Parameter, SearchSpace};
///
/// let space = SearchSpace::new()
///     .with(Parameter::real("x", -5.0, 5.0).unwrap())
///     .with(Parameter::real("y", -5.0, 5.0).unwrap());
/// let de = DifferentialEvolution::builder().population_size(8).seed(1).build().unwrap();
/// let mut oracle = GeneticOracle::new("de", space, de);
///
/// let population = oracle.ask(1).unwrap();
/// assert_eq!(population.len(), 8);
/// ```
pub struct GeneticOracle<A: Algorithm> {
    name: String,
    space: SearchSpace,
    algorithm: A,
    bounds: Vec<(f64, f64)>,
    generation: Generation,
    elite: Vec<(Vec<f64>, f64)>,
    best: f64,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    notifier: Notifier,
}

impl<A: Algorithm> GeneticOracle<A> {
    /// Wraps `algorithm` as an oracle named `name` over `space`.
    #[must_use]
    pub fn new(name: impl Into<String>, space: SearchSpace, algorithm: A) -> Self {
        let bounds = space.bounds();
        Self {
            name: name.into(),
            space,
            algorithm,
            bounds,
            generation: Generation::default(),
            elite: Vec::new(),
            best: f64::INFINITY,
            x: Vec::new(),
            y: Vec::new(),
            notifier: Notifier::new(),
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Best result seen from any source.
    #[must_use]
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Active per-dimension bounds (narrowed by plugins).
    #[must_use]
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Elite pool, best first, at most one population in size.
    #[must_use]
    pub fn elite(&self) -> &[(Vec<f64>, f64)] {
        &self.elite
    }

    /// Index of `config` in the open generation, if it is one of ours.
    #[allow(clippy::cast_possible_truncation)]
    fn own_slot(&self, config: &Configuration) -> Option<usize> {
        if config.requestor() != self.name || !self.generation.open {
            return None;
        }
        let id = config.request_id()?;
        let index = (id & 0xFFFF_FFFF) as usize;
        (id >> 32 == self.generation.id && index < self.generation.members.len()).then_some(index)
    }

    /// Reports a complete generation to the backend.
    fn close_generation(&mut self) {
        let fitness: Vec<f64> = self
            .generation
            .fitness
            .iter()
            .map(|f| f.unwrap_or(f64::INFINITY))
            .collect();
        self.algorithm.tell(&self.generation.members, &fitness);
        self.generation.open = false;
    }

    /// Records an observation in the elite pool and the plugin history.
    fn observe(&mut self, x: Vec<f64>, result: f64) {
        if !result.is_finite() {
            return;
        }
        self.best = self.best.min(result);

        let pos = self.elite.partition_point(|(_, f)| *f <= result);
        self.elite.insert(pos, (x.clone(), result));
        self.elite.truncate(self.algorithm.population_size().max(1));

        self.x.push(x);
        self.y.push(result);
        if self.y.len() > NOTIFY_AFTER {
            let event = Event::Told {
                x: &self.x,
                y: &self.y,
            };
            self.notifier.notify(&event, &self.name, &mut self.bounds);
        }
    }
}

impl<A: Algorithm> Oracle for GeneticOracle<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, _n: usize) -> Option<Vec<Configuration>> {
        if self.generation.open {
            trace_debug!(
                oracle = %self.name,
                untold = self.generation.fitness.iter().filter(|f| f.is_none()).count(),
                "generation closed early"
            );
            self.close_generation();
        }

        let mut members = self.algorithm.ask(&self.bounds);
        for member in &mut members {
            clamp_to_bounds(member, &self.bounds);
        }
        let id = self.generation.id + 1;
        let configs = members
            .iter()
            .enumerate()
            .map(|(i, m)| {
                self.space
                    .from_vector(m, &self.name)
                    .with_request_id(request_id(id, i))
            })
            .collect();
        self.generation = Generation {
            id,
            fitness: vec![None; members.len()],
            open: !members.is_empty(),
            members,
        };
        Some(configs)
    }

    fn tell(&mut self, config: &Configuration, result: f64) -> Result<()> {
        if let Some(index) = self.own_slot(config) {
            if self.generation.fitness[index].is_some() {
                return Ok(());
            }
            self.generation.fitness[index] = Some(result);
            let x = self.generation.members[index].clone();
            self.observe(x, result);
            if self.generation.fitness.iter().all(Option::is_some) {
                self.close_generation();
            }
            return Ok(());
        }

        let x = self.space.to_vector(config)?;
        let improves = result < self.best;
        self.observe(x, result);
        if improves {
            trace_info!(
                oracle = %self.name,
                source = config.requestor(),
                best = result,
                "restarting from elite pool"
            );
            self.algorithm.restart(&self.elite, &self.bounds);
            self.generation.open = false;
        }
        Ok(())
    }

    fn attach(&mut self, plugin: Box<dyn Subscriber>) -> Result<()> {
        self.notifier.attach(plugin);
        Ok(())
    }
}

impl<A: Algorithm + core::fmt::Debug> core::fmt::Debug for GeneticOracle<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GeneticOracle")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("generation", &self.generation.id)
            .field("best", &self.best)
            .field("plugins", &self.notifier)
            .finish_non_exhaustive()
    }
}
