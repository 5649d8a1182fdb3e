//! Pest-derived parser for the oracle DSL. The grammar lives in
//! `grammar.pest` next to this file.

use pest::Parser;
use pest::iterators::{Pair, Pairs};

use self::grammar::{OracleGrammar, Rule};
use super::{DEFAULT_META, OracleEntry, OracleSpec, Params, PluginEntry};
use crate::error::{Error, Result};
use crate::value::Value;

mod grammar {
    // The derive emits a `pub enum Rule`
    #![allow(unreachable_pub, clippy::pedantic)]

    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "dsl/grammar.pest"]
    pub(super) struct OracleGrammar;
}

/// Parses one DSL line.
pub(crate) fn parse(line: &str) -> Result<OracleSpec> {
    let mut pairs = OracleGrammar::parse(Rule::line, line).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos(pos) | pest::error::LineColLocation::Span(pos, _) => {
                pos
            }
        };
        Error::Syntax {
            line,
            column,
            message: e.variant.message().into_owned(),
        }
    })?;

    let body = next(&mut next(&mut pairs)?.into_inner())?;
    match body.as_rule() {
        Rule::meta => parse_meta(body),
        _ => Ok(OracleSpec {
            top_oracle: DEFAULT_META.to_owned(),
            oracles: vec![parse_oracle(body)?],
            params: Params::new(),
        }),
    }
}

/// Next pair of a sequence the grammar guarantees to be there.
fn next<'a>(pairs: &mut Pairs<'a, Rule>) -> Result<Pair<'a, Rule>> {
    pairs.next().ok_or(Error::Internal("parse tree is missing a node"))
}

fn parse_meta(pair: Pair<'_, Rule>) -> Result<OracleSpec> {
    let mut inner = pair.into_inner();
    let top_oracle = next(&mut inner)?.as_str().to_owned();
    let mut oracles = Vec::new();
    let mut params = Params::new();
    for p in inner {
        match p.as_rule() {
            Rule::oracle => oracles.push(parse_oracle(p)?),
            Rule::params => params = parse_params(p)?,
            _ => {}
        }
    }
    Ok(OracleSpec {
        top_oracle,
        oracles,
        params,
    })
}

fn parse_oracle(pair: Pair<'_, Rule>) -> Result<OracleEntry> {
    let mut inner = pair.into_inner();
    let name = next(&mut inner)?.as_str().to_owned();
    let mut params = Params::new();
    let mut plugins = Vec::new();
    for p in inner {
        match p.as_rule() {
            Rule::params => params = parse_params(p)?,
            Rule::plugin => plugins.push(parse_plugin(p)?),
            _ => {}
        }
    }
    Ok(OracleEntry {
        name,
        params,
        plugins,
    })
}

fn parse_plugin(pair: Pair<'_, Rule>) -> Result<PluginEntry> {
    let mut inner = pair.into_inner();
    let name = next(&mut inner)?.as_str().to_owned();
    let params = match inner.next() {
        Some(p) => parse_params(p)?,
        None => Params::new(),
    };
    Ok(PluginEntry { name, params })
}

fn parse_params(pair: Pair<'_, Rule>) -> Result<Params> {
    let mut params = Params::new();
    for param in pair.into_inner() {
        let mut inner = param.into_inner();
        let key = next(&mut inner)?.as_str().to_owned();
        let value = parse_literal(&next(&mut inner)?)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_literal(pair: &Pair<'_, Rule>) -> Result<Value> {
    let text = pair.as_str();
    let syntax = |message: String| {
        let (line, column) = pair.as_span().start_pos().line_col();
        Error::Syntax {
            line,
            column,
            message,
        }
    };
    match pair.as_rule() {
        Rule::int => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| syntax(format!("invalid integer '{text}': {e}"))),
        Rule::float => text
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|e| syntax(format!("invalid number '{text}': {e}"))),
        _ => Ok(Value::Text(text.to_owned())),
    }
}
