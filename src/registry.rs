//! Name tables that turn a DSL line into a ready-to-use oracle.
//!
//! Every oracle, plugin and meta-oracle is registered under a canonical
//! anchor plus any number of aliases. [`Registry::default`] knows all the
//! built-ins; third-party strategies are added with
//! [`register_oracle`](Registry::register_oracle) and friends.
//!
//! # Examples
//!
//! ```
//! use feijoa::registry::{OracleContext, ParamReader, Registry};
//! use feijoa::oracle::RandomOracle;
//! use feijoa::{Oracle, Parameter, SearchSpace};
//!
//! let mut registry = Registry::default();
//! registry.register_oracle("lucky", &["dice"], |ctx, params| {
//!     ParamReader::new("lucky", params).finish()?;
//!     let mut oracle = RandomOracle::new(ctx.space.clone(), ctx.seed);
//!     oracle.set_name("lucky".to_owned());
//!     Ok(Box::new(oracle))
//! });
//!
//! let space = SearchSpace::new().with(Parameter::real("x", 0.0, 1.0).unwrap());
//! let mut oracle = registry.make("thompson<dice, pattern>", &space, 3).unwrap();
//! assert!(oracle.ask(4).is_some());
//! ```

use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::dsl::{self, Params};
use crate::error::{Error, Result};
use crate::meta::{self, BanditFactory, MetaOracle};
use crate::oracle::bayesian::{Bayesian, RegressorKind};
use crate::oracle::genetic::{
    CmaEs, DEStrategy, DifferentialEvolution, GeneticAlgorithm, GeneticOracle, ParticleSwarm,
};
use crate::oracle::{Grid, Oracle, PatternSearch, RandomOracle, SeedOracle};
use crate::plugin::{DomainReducer, Subscriber};
use crate::rng_util;
use crate::space::SearchSpace;
use crate::value::Value;

/// What an oracle constructor gets to work with.
#[derive(Clone, Copy, Debug)]
pub struct OracleContext<'a> {
    /// Search space shared by every oracle of the composition.
    pub space: &'a SearchSpace,
    /// Seed for this oracle, derived from the top-level seed and its position.
    pub seed: u64,
    /// User-supplied configurations for the `seed` oracle.
    pub seeds: &'a [Configuration],
}

/// Builds an oracle from its DSL parameters.
pub type OracleMaker =
    Box<dyn Fn(&OracleContext<'_>, &Params) -> Result<Box<dyn Oracle>> + Send + Sync>;

/// Builds a plugin from its DSL parameters.
pub type PluginMaker = Box<dyn Fn(&Params) -> Result<Box<dyn Subscriber>> + Send + Sync>;

/// Builds an empty meta-oracle from its DSL parameters.
pub type MetaMaker = Box<dyn Fn(&OracleContext<'_>, &Params) -> Result<MetaOracle> + Send + Sync>;

/// Anchor/alias table for one kind of component.
struct Table<T> {
    makers: HashMap<String, T>,
    aliases: HashMap<String, String>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            makers: HashMap::new(),
            aliases: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, anchor: &str, aliases: &[&str], maker: T) {
        for alias in aliases {
            self.aliases.insert((*alias).to_owned(), anchor.to_owned());
        }
        self.aliases.insert(anchor.to_owned(), anchor.to_owned());
        self.makers.insert(anchor.to_owned(), maker);
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.aliases.get(name).and_then(|anchor| self.makers.get(anchor))
    }

    fn anchor(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    fn anchors(&self) -> Vec<&str> {
        let mut anchors: Vec<&str> = self.makers.keys().map(String::as_str).collect();
        anchors.sort_unstable();
        anchors
    }
}

/// Typed access to a DSL parameter list.
///
/// Every read marks the key as known; [`finish`](Self::finish) rejects
/// whatever is left.
#[derive(Debug)]
pub struct ParamReader<'a> {
    owner: &'a str,
    params: &'a Params,
    known: Vec<&'a str>,
}

impl<'a> ParamReader<'a> {
    /// Starts reading `params` given to the component `owner`.
    #[must_use]
    pub fn new(owner: &'a str, params: &'a Params) -> Self {
        Self {
            owner,
            params,
            known: Vec::new(),
        }
    }

    fn raw(&mut self, key: &'a str) -> Option<&'a Value> {
        self.known.push(key);
        self.params.get(key)
    }

    fn invalid(&self, key: &str, reason: &str) -> Error {
        Error::invalid_param(self.owner, key, reason)
    }

    /// Reads a number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if the value is not numeric.
    pub fn f64(&mut self, key: &'a str) -> Result<Option<f64>> {
        self.raw(key)
            .map(|v| v.as_f64().ok_or_else(|| self.invalid(key, "expected a number")))
            .transpose()
    }

    /// Reads a non-negative integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if the value is not a
    /// non-negative integer.
    pub fn usize(&mut self, key: &'a str) -> Result<Option<usize>> {
        self.u64(key)?
            .map(|v| usize::try_from(v).map_err(|_| self.invalid(key, "out of range")))
            .transpose()
    }

    /// Reads a non-negative integer as `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if the value is not a
    /// non-negative integer.
    pub fn u64(&mut self, key: &'a str) -> Result<Option<u64>> {
        self.raw(key)
            .map(|v| {
                v.as_i64()
                    .and_then(|i| u64::try_from(i).ok())
                    .ok_or_else(|| self.invalid(key, "expected a non-negative integer"))
            })
            .transpose()
    }

    /// Reads a bare word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if the value is not a word.
    pub fn word(&mut self, key: &'a str) -> Result<Option<&'a str>> {
        self.raw(key)
            .map(|v| v.as_str().ok_or_else(|| self.invalid(key, "expected a word")))
            .transpose()
    }

    /// Fails on any parameter that was never read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] naming the first unknown key.
    pub fn finish(self) -> Result<()> {
        match self.params.keys().find(|k| !self.known.contains(&k.as_str())) {
            Some(key) => Err(self.invalid(key, "unknown parameter")),
            None => Ok(()),
        }
    }
}

/// Maps oracle, plugin and meta-oracle names to constructors.
pub struct Registry {
    oracles: Table<OracleMaker>,
    plugins: Table<PluginMaker>,
    metas: Table<MetaMaker>,
}

impl Registry {
    /// A registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            oracles: Table::default(),
            plugins: Table::default(),
            metas: Table::default(),
        }
    }

    /// Registers an oracle under `anchor` and `aliases`, replacing any
    /// previous entry with the same names.
    pub fn register_oracle<F>(&mut self, anchor: &str, aliases: &[&str], maker: F)
    where
        F: Fn(&OracleContext<'_>, &Params) -> Result<Box<dyn Oracle>> + Send + Sync + 'static,
    {
        self.oracles.insert(anchor, aliases, Box::new(maker));
    }

    /// Registers a plugin under `anchor` and `aliases`.
    pub fn register_plugin<F>(&mut self, anchor: &str, aliases: &[&str], maker: F)
    where
        F: Fn(&Params) -> Result<Box<dyn Subscriber>> + Send + Sync + 'static,
    {
        self.plugins.insert(anchor, aliases, Box::new(maker));
    }

    /// Registers a meta-oracle under `anchor` and `aliases`.
    pub fn register_meta<F>(&mut self, anchor: &str, aliases: &[&str], maker: F)
    where
        F: Fn(&OracleContext<'_>, &Params) -> Result<MetaOracle> + Send + Sync + 'static,
    {
        self.metas.insert(anchor, aliases, Box::new(maker));
    }

    /// Canonical oracle name for `name`, if registered.
    #[must_use]
    pub fn oracle_anchor(&self, name: &str) -> Option<&str> {
        self.oracles.anchor(name)
    }

    /// Registered oracle anchors, sorted.
    #[must_use]
    pub fn oracle_anchors(&self) -> Vec<&str> {
        self.oracles.anchors()
    }

    /// Registered plugin anchors, sorted.
    #[must_use]
    pub fn plugin_anchors(&self) -> Vec<&str> {
        self.plugins.anchors()
    }

    /// Registered meta-oracle anchors, sorted.
    #[must_use]
    pub fn meta_anchors(&self) -> Vec<&str> {
        self.metas.anchors()
    }

    /// Parses `line` and builds the oracle it describes.
    ///
    /// # Errors
    ///
    /// See [`make_with_seeds`](Self::make_with_seeds).
    pub fn make(&self, line: &str, space: &SearchSpace, seed: u64) -> Result<Box<dyn Oracle>> {
        self.make_with_seeds(line, space, seed, &[])
    }

    /// Like [`make`](Self::make), handing `seeds` to any `seed` oracle.
    ///
    /// Child `i` is built with seed `seed + i`; plugins are attached in the
    /// order written.
    ///
    /// # Errors
    ///
    /// - [`Error::Syntax`] if `line` does not parse.
    /// - [`Error::MetaOracleNotFound`], [`Error::OracleNotFound`] or
    ///   [`Error::PluginNotFound`] for unregistered names.
    /// - [`Error::InvalidOracleParameter`] or
    ///   [`Error::UnsupportedAcquisition`] for bad parameters.
    /// - [`Error::PluginUnsupported`] if a plugin is attached to an oracle
    ///   without bounds.
    pub fn make_with_seeds(
        &self,
        line: &str,
        space: &SearchSpace,
        seed: u64,
        seeds: &[Configuration],
    ) -> Result<Box<dyn Oracle>> {
        let spec = dsl::parse(line)?;
        let meta_maker = self
            .metas
            .get(&spec.top_oracle)
            .ok_or_else(|| Error::MetaOracleNotFound(spec.top_oracle.clone()))?;

        let mut children = Vec::with_capacity(spec.oracles.len());
        for (index, entry) in spec.oracles.iter().enumerate() {
            let maker = self
                .oracles
                .get(&entry.name)
                .ok_or_else(|| Error::OracleNotFound(entry.name.clone()))?;
            let ctx = OracleContext {
                space,
                seed: rng_util::derive_seed(seed, index),
                seeds,
            };
            let mut oracle = maker(&ctx, &entry.params)?;
            for plugin in &entry.plugins {
                let plugin_maker = self
                    .plugins
                    .get(&plugin.name)
                    .ok_or_else(|| Error::PluginNotFound(plugin.name.clone()))?;
                oracle.attach(plugin_maker(&plugin.params)?)?;
            }
            children.push(oracle);
        }

        let ctx = OracleContext { space, seed, seeds };
        let mut meta = meta_maker(&ctx, &spec.params)?;
        for child in children {
            meta.add_oracle(child);
        }
        trace_info!(line, oracles = ?meta.oracle_names(), "oracle assembled");
        Ok(Box::new(meta))
    }
}

impl Default for Registry {
    /// Registry with every built-in oracle, plugin and meta-oracle.
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register_oracle("random", &["rand"], |ctx, params| {
            ParamReader::new("random", params).finish()?;
            Ok(Box::new(RandomOracle::new(ctx.space.clone(), ctx.seed)))
        });
        registry.register_oracle("bayesian", &["bayes", "gp"], make_bayesian);
        registry.register_oracle(
            "pattern",
            &["template", "patternsearch", "templatesearch"],
            |ctx, params| {
                let mut reader = ParamReader::new("pattern", params);
                let step = reader.f64("step")?;
                reader.finish()?;
                let oracle = match step {
                    Some(step) => PatternSearch::with_step(ctx.space.clone(), ctx.seed, step)?,
                    None => PatternSearch::new(ctx.space.clone(), ctx.seed),
                };
                Ok(Box::new(oracle))
            },
        );
        registry.register_oracle("grid", &["gridsearch"], |ctx, params| {
            let mut reader = ParamReader::new("grid", params);
            let step = reader.f64("step")?;
            reader.finish()?;
            let mut builder = Grid::builder();
            if let Some(step) = step {
                builder = builder.step(step);
            }
            Ok(Box::new(builder.build(ctx.space.clone())?))
        });
        registry.register_oracle("seed", &["seeds"], |ctx, params| {
            ParamReader::new("seed", params).finish()?;
            Ok(Box::new(SeedOracle::new(ctx.seeds.to_vec())))
        });
        registry.register_oracle("de", &["differential_evolution"], make_de);
        registry.register_oracle("cmaes", &["cma", "cma_es"], make_cmaes);
        registry.register_oracle("pso", &["particle_swarm"], make_pso);
        registry.register_oracle("ga", &["genetic"], make_ga);

        registry.register_plugin("reducer", &["domain_reducer", "sdr"], |params| {
            let mut reader = ParamReader::new("reducer", params);
            let mut builder = DomainReducer::builder();
            if let Some(v) = reader.f64("gamma_osc")? {
                builder = builder.gamma_osc(v);
            }
            if let Some(v) = reader.f64("gamma_pan")? {
                builder = builder.gamma_pan(v);
            }
            if let Some(v) = reader.f64("eta")? {
                builder = builder.eta(v);
            }
            if let Some(v) = reader.f64("minimum_window")? {
                builder = builder.minimum_window(v);
            }
            reader.finish()?;
            Ok(Box::new(builder.build()?))
        });

        registry.register_meta("ucb", &["ucb1"], |ctx, params| {
            make_meta("ucb", meta::ucb1, ctx, params)
        });
        registry.register_meta("ucb_tuned", &["ucbt", "tuned"], |ctx, params| {
            make_meta("ucb_tuned", meta::ucb_tuned, ctx, params)
        });
        registry.register_meta("thompson", &["ts"], |ctx, params| {
            make_meta("thompson", meta::thompson, ctx, params)
        });

        registry
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("oracles", &self.oracle_anchors())
            .field("plugins", &self.plugin_anchors())
            .field("metas", &self.meta_anchors())
            .finish()
    }
}

fn make_meta(
    anchor: &str,
    factory: BanditFactory,
    ctx: &OracleContext<'_>,
    params: &Params,
) -> Result<MetaOracle> {
    let mut reader = ParamReader::new(anchor, params);
    let select_count = match reader.usize("select_count")? {
        Some(v) => Some(v),
        None => reader.usize("ranking")?,
    };
    let seed = reader.u64("seed")?.unwrap_or(ctx.seed);
    reader.finish()?;
    Ok(MetaOracle::new(anchor, factory, seed).with_select_count(select_count.unwrap_or(1)))
}

fn make_bayesian(ctx: &OracleContext<'_>, params: &Params) -> Result<Box<dyn Oracle>> {
    let mut reader = ParamReader::new("bayesian", params);
    let mut builder = Bayesian::builder().seed(ctx.seed);
    if let Some(acq) = reader.word("acq")? {
        builder = builder.acquisition(acq);
    }
    if let Some(regr) = reader.word("regr")? {
        builder = builder.regressor(RegressorKind::parse(regr)?);
    }
    if let Some(n) = reader.usize("n_warmup")? {
        builder = builder.n_warmup(n);
    }
    if let Some(n) = reader.usize("n_samples")? {
        builder = builder.n_samples(n);
    }
    reader.finish()?;
    Ok(Box::new(builder.build(ctx.space.clone())?))
}

fn make_de(ctx: &OracleContext<'_>, params: &Params) -> Result<Box<dyn Oracle>> {
    let mut reader = ParamReader::new("de", params);
    let mut builder = DifferentialEvolution::builder().seed(ctx.seed);
    if let Some(n) = reader.usize("pop_size")? {
        builder = builder.population_size(n);
    }
    if let Some(f) = reader.f64("f")? {
        builder = builder.mutation_factor(f);
    }
    if let Some(cr) = reader.f64("cr")? {
        builder = builder.crossover_rate(cr);
    }
    if let Some(strategy) = reader.word("strategy")? {
        builder = builder.strategy(DEStrategy::parse(strategy)?);
    }
    reader.finish()?;
    Ok(Box::new(GeneticOracle::new(
        "de",
        ctx.space.clone(),
        builder.build()?,
    )))
}

fn make_cmaes(ctx: &OracleContext<'_>, params: &Params) -> Result<Box<dyn Oracle>> {
    let mut reader = ParamReader::new("cmaes", params);
    let mut builder = CmaEs::builder().seed(ctx.seed);
    if let Some(n) = reader.usize("pop_size")? {
        builder = builder.population_size(n);
    }
    if let Some(sigma) = reader.f64("sigma0")? {
        builder = builder.sigma0(sigma);
    }
    reader.finish()?;
    Ok(Box::new(GeneticOracle::new(
        "cmaes",
        ctx.space.clone(),
        builder.build()?,
    )))
}

fn make_pso(ctx: &OracleContext<'_>, params: &Params) -> Result<Box<dyn Oracle>> {
    let mut reader = ParamReader::new("pso", params);
    let mut builder = ParticleSwarm::builder().seed(ctx.seed);
    if let Some(n) = reader.usize("pop_size")? {
        builder = builder.population_size(n);
    }
    if let Some(w) = reader.f64("w")? {
        builder = builder.inertia(w);
    }
    if let Some(c1) = reader.f64("c1")? {
        builder = builder.cognitive(c1);
    }
    if let Some(c2) = reader.f64("c2")? {
        builder = builder.social(c2);
    }
    reader.finish()?;
    Ok(Box::new(GeneticOracle::new(
        "pso",
        ctx.space.clone(),
        builder.build()?,
    )))
}

fn make_ga(ctx: &OracleContext<'_>, params: &Params) -> Result<Box<dyn Oracle>> {
    let mut reader = ParamReader::new("ga", params);
    let mut builder = GeneticAlgorithm::builder().seed(ctx.seed);
    if let Some(n) = reader.usize("pop_size")? {
        builder = builder.population_size(n);
    }
    if let Some(p) = reader.f64("cx_prob")? {
        builder = builder.crossover_prob(p);
    }
    if let Some(eta) = reader.f64("cx_eta")? {
        builder = builder.crossover_eta(eta);
    }
    if let Some(eta) = reader.f64("mut_eta")? {
        builder = builder.mutation_eta(eta);
    }
    reader.finish()?;
    Ok(Box::new(GeneticOracle::new(
        "ga",
        ctx.space.clone(),
        builder.build()?,
    )))
}

/// Builds the oracle described by `line` with the built-in [`Registry`].
///
/// # Errors
///
/// See [`Registry::make_with_seeds`].
///
/// # Examples
///
/// ```
/// use feijoa::{Parameter, SearchSpace};
///
/// let space = SearchSpace::new().with(Parameter::integer("n", 1, 8).unwrap());
/// let mut oracle = feijoa::maker("ucb_tuned<grid, de[pop_size=6]>", &space, 42).unwrap();
/// assert!(oracle.ask(3).is_some());
/// ```
pub fn maker(line: &str, space: &SearchSpace, seed: u64) -> Result<Box<dyn Oracle>> {
    Registry::default().make(line, space, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with(Parameter::real("x", -1.0, 1.0).unwrap())
            .with(Parameter::integer("k", 0, 4).unwrap())
    }

    #[test]
    fn aliases_resolve_to_anchors() {
        let registry = Registry::default();
        for (alias, anchor) in [
            ("gp", "bayesian"),
            ("templatesearch", "pattern"),
            ("cma_es", "cmaes"),
            ("genetic", "ga"),
            ("rand", "random"),
        ] {
            assert_eq!(registry.oracle_anchor(alias), Some(anchor));
        }
        assert_eq!(registry.meta_anchors(), vec!["thompson", "ucb", "ucb_tuned"]);
        assert_eq!(registry.plugin_anchors(), vec!["reducer"]);
    }

    #[test]
    fn unknown_names() {
        let registry = Registry::default();
        assert!(matches!(
            registry.make("ucb<simplex>", &space(), 0),
            Err(Error::OracleNotFound(name)) if name == "simplex"
        ));
        assert!(matches!(
            registry.make("ucb<de+pruner>", &space(), 0),
            Err(Error::PluginNotFound(_))
        ));
        assert!(matches!(
            registry.make("epsilon<de>", &space(), 0),
            Err(Error::MetaOracleNotFound(_))
        ));
    }

    #[test]
    fn bad_parameters() {
        let registry = Registry::default();
        for line in [
            "de[pop_size=2]",
            "de[pop_size=0.5]",
            "pattern[step=2.0]",
            "random[foo=1]",
            "ucb<random>[select_count=abc]",
            "cmaes+reducer[eta=1.5]",
        ] {
            assert!(
                matches!(
                    registry.make(line, &space(), 0),
                    Err(Error::InvalidOracleParameter { .. })
                ),
                "{line}"
            );
        }
        assert!(matches!(
            registry.make("bayesian[acq=ei, regr=knn]", &space(), 0),
            Err(Error::UnsupportedAcquisition { .. })
        ));
    }

    #[test]
    fn plugins_need_bounds() {
        let registry = Registry::default();
        assert!(matches!(
            registry.make("random+reducer", &space(), 0),
            Err(Error::PluginUnsupported { .. })
        ));
        assert!(registry.make("bayesian[n_samples=64]+sdr", &space(), 0).is_ok());
    }

    #[test]
    fn children_get_distinct_seeds() {
        let mut a = maker("ucb<random, random>", &space(), 5).unwrap();
        let first = a.ask(3).unwrap();
        let second = a.ask(3).unwrap();
        assert_eq!(first[0].requestor(), "random");
        assert_eq!(second[0].requestor(), "random@1");
        assert!(!first[0].same_params(&second[0]));
    }

    #[test]
    fn seeds_reach_the_seed_oracle() {
        let seeds = vec![Configuration::new("user").with("x", 0.5).with("k", 2)];
        let mut oracle = Registry::default()
            .make_with_seeds("ucb<seed, random>", &space(), 0, &seeds)
            .unwrap();
        let first = oracle.ask(10).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].same_params(&seeds[0]));
    }
}
