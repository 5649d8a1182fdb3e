//! The ordered search space.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::parameter::{Parameter, ParameterMeta};
use crate::value::Value;

/// An ordered collection of named parameters.
///
/// Built once by the caller before any oracle is constructed and read-only
/// afterwards. Iteration order is insertion order, which fixes the layout of
/// every numeric vector derived from a configuration.
///
/// # Examples
///
/// ```
/// use feijoa::{Parameter, SearchSpace};
///
/// let mut space = SearchSpace::new();
/// space.insert(Parameter::real("x", 0.0, 1.0).unwrap());
/// space.insert(Parameter::categorical("opt", ["sgd", "adam"]).unwrap());
///
/// assert_eq!(space.len(), 2);
/// assert!(space.get("opt").is_some());
/// assert!(space.get("missing").is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchSpace {
    params: Vec<Parameter>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YamlDocument {
    Wrapped { params: Vec<ParameterMeta> },
    Bare(Vec<ParameterMeta>),
}

impl SearchSpace {
    /// Creates an empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    ///
    /// Names are not deduplicated: inserting a second parameter with an
    /// existing name keeps both, and [`get`](Self::get) returns the first.
    pub fn insert(&mut self, param: Parameter) {
        self.params.push(param);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, param: Parameter) -> Self {
        self.insert(param);
        self
    }

    /// Looks a parameter up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// `true` if no parameter was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(Parameter::name).collect()
    }

    /// Parses a YAML document.
    ///
    /// Accepts either a bare sequence of parameter records or a mapping with
    /// a `params` key:
    ///
    /// ```yaml
    /// params:
    ///   - name: x
    ///     type: real
    ///     low: 0.0
    ///     high: 1.0
    ///   - name: opt
    ///     type: categorical
    ///     choices: [sgd, adam]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for malformed documents and
    /// [`Error::IncorrectInputValues`] for invalid parameter declarations.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let metas = match serde_yaml::from_str::<YamlDocument>(text)? {
            YamlDocument::Wrapped { params } | YamlDocument::Bare(params) => params,
        };
        Self::from_metadata(&metas)
    }

    /// Reads and parses a YAML file. See [`from_yaml_str`](Self::from_yaml_str).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Rebuilds a search space from persisted parameter records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectInputValues`] for the first invalid record.
    pub fn from_metadata(metas: &[ParameterMeta]) -> Result<Self> {
        let params = metas
            .iter()
            .map(Parameter::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { params })
    }

    /// Converts the search space into persisted parameter records.
    #[must_use]
    pub fn to_metadata(&self) -> Vec<ParameterMeta> {
        self.params.iter().map(Parameter::to_metadata).collect()
    }

    /// Per-dimension numeric bounds, in insertion order.
    #[must_use]
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.params.iter().map(Parameter::bounds).collect()
    }

    /// Encodes a configuration as a numeric vector (categoricals by choice index).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`] if a parameter is missing from the
    /// configuration, or [`Error::InvalidValue`] if a value does not fit.
    pub fn to_vector(&self, config: &Configuration) -> Result<Vec<f64>> {
        self.params
            .iter()
            .map(|p| {
                let value = config
                    .get(p.name())
                    .ok_or_else(|| Error::UnknownParameter(p.name().to_owned()))?;
                p.encode(value)
            })
            .collect()
    }

    /// Decodes a numeric vector into a configuration tagged with `requestor`.
    ///
    /// Missing trailing coordinates decode as the lower bound.
    #[must_use]
    pub fn from_vector(&self, x: &[f64], requestor: &str) -> Configuration {
        let values: Vec<(String, Value)> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let coord = x.get(i).copied().unwrap_or_else(|| p.bounds().0);
                (p.name().to_owned(), p.decode(coord))
            })
            .collect();
        Configuration::from_pairs(values, requestor)
    }
}

impl<'a> IntoIterator for &'a SearchSpace {
    type Item = &'a Parameter;
    type IntoIter = core::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

impl FromIterator<Parameter> for SearchSpace {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with(Parameter::integer("n", 1, 5).unwrap())
            .with(Parameter::real("lr", 0.0, 1.0).unwrap())
            .with(Parameter::categorical("opt", ["sgd", "adam"]).unwrap())
    }

    #[test]
    fn insert_keeps_duplicates() {
        let mut s = space();
        s.insert(Parameter::integer("n", 10, 20).unwrap());
        assert_eq!(s.len(), 4);
        match s.get("n") {
            Some(Parameter::Integer(p)) => assert_eq!(p.high(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn vector_round_trip() {
        let s = space();
        let config = s.from_vector(&[2.7, 0.25, 1.0], "test");
        assert_eq!(config.get("n"), Some(&Value::Int(3)));
        assert_eq!(config.get("opt"), Some(&Value::from("adam")));
        assert_eq!(config.requestor(), "test");

        let x = s.to_vector(&config).unwrap();
        assert_eq!(x, vec![3.0, 0.25, 1.0]);
    }

    #[test]
    fn to_vector_reports_missing_parameter() {
        let s = space();
        let config = Configuration::from_pairs(vec![("n".to_owned(), Value::Int(1))], "test");
        assert!(matches!(
            s.to_vector(&config),
            Err(Error::UnknownParameter(name)) if name == "lr"
        ));
    }

    #[test]
    fn metadata_round_trip() {
        let s = space();
        let restored = SearchSpace::from_metadata(&s.to_metadata()).unwrap();
        assert_eq!(restored, s);
    }
}
