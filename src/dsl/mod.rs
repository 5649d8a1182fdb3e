//! One-line description language for oracle compositions.
//!
//! ```text
//! ucb<bayesian[acq=ei]+reducer, cmaes>[ranking=5]
//! ```
//!
//! names a meta-oracle (`ucb`) over two children: a Bayesian oracle with the
//! `ei` acquisition and a domain-reducer plugin, and CMA-ES. The bracket after
//! `>` holds meta-oracle parameters. A bare oracle (`pattern[step=0.2]`) is
//! wrapped in the default `ucb` meta-oracle.
//!
//! The grammar is written for `pest` and lives in `grammar.pest`. [`parse`]
//! only builds the tree; [`Registry`](crate::Registry) resolves the names.

mod parser;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Value;

/// Meta-oracle used when the line names a single oracle.
pub const DEFAULT_META: &str = "ucb";

/// Parameter list of an oracle, plugin or meta-oracle.
pub type Params = BTreeMap<String, Value>;

/// A plugin attached to an oracle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Plugin name or alias.
    pub name: String,
    /// Plugin parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: Params,
}

/// One child oracle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OracleEntry {
    /// Oracle name or alias.
    pub name: String,
    /// Oracle parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: Params,
    /// Plugins, in attachment order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginEntry>,
}

/// Parsed DSL line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OracleSpec {
    /// Meta-oracle name or alias.
    #[serde(rename = "top-oracle")]
    pub top_oracle: String,
    /// Children, in declaration order.
    pub oracles: Vec<OracleEntry>,
    /// Meta-oracle parameters.
    #[serde(default)]
    pub params: Params,
}

/// Parses a DSL line into an [`OracleSpec`].
///
/// # Errors
///
/// Returns [`Error::Syntax`](crate::Error::Syntax) with the 1-based line and
/// column of the offending token.
///
/// # Examples
///
/// ```
/// let parsed = feijoa::dsl::parse("ucb<bayesian[acq=ei]+reducer, cmaes>[ranking=5]").unwrap();
/// assert_eq!(parsed.top_oracle, "ucb");
/// assert_eq!(parsed.oracles.len(), 2);
/// assert_eq!(parsed.oracles[0].plugins[0].name, "reducer");
/// ```
pub fn parse(line: &str) -> Result<OracleSpec> {
    parser::parse(line)
}
