//! Configurations: one concrete point of the search space.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A mapping from parameter name to concrete value.
///
/// Produced by an oracle's `ask`, consumed by the objective, and handed back
/// unchanged to `tell`. `requestor` names the oracle that produced it;
/// `request_id` is an optional oracle-private token used to map the later
/// `tell` back to internal state (e.g. a population slot).
///
/// Values keep the order in which they were inserted, which for oracle
/// output is the search-space order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(with = "pairs")]
    params: Vec<(String, Value)>,
    requestor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<u64>,
}

impl Configuration {
    /// Creates an empty configuration produced by `requestor`.
    #[must_use]
    pub fn new(requestor: impl Into<String>) -> Self {
        Self {
            params: Vec::new(),
            requestor: requestor.into(),
            request_id: None,
        }
    }

    /// Creates a configuration from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, Value)>, requestor: impl Into<String>) -> Self {
        Self {
            params: pairs,
            requestor: requestor.into(),
            request_id: None,
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets `name` to `value`, replacing an existing entry in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// `true` if no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Name of the oracle that produced this configuration.
    #[must_use]
    pub fn requestor(&self) -> &str {
        &self.requestor
    }

    /// Re-tags the configuration with another requestor.
    pub fn set_requestor(&mut self, requestor: impl Into<String>) {
        self.requestor = requestor.into();
    }

    /// Oracle-private correlation token.
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    /// Sets the correlation token.
    #[must_use]
    pub fn with_request_id(mut self, id: u64) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Compares parameter values only, ignoring order, requestor and request id.
    #[must_use]
    pub fn same_params(&self, other: &Configuration) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .all(|(n, v)| other.get(n).is_some_and(|o| o.same_as(v)))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}} by {}", self.requestor)
    }
}

/// Serializes ordered pairs as a map while keeping their order on the way back.
mod pairs {
    use core::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use crate::value::Value;

    pub(super) fn serialize<S: Serializer>(
        pairs: &[(String, Value)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, Value)>, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, Value)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    out.push((k, v));
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut c = Configuration::new("o").with("a", 1_i64).with("b", 2.0);
        c.set("a", 5_i64);
        let names: Vec<&str> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(c.get("a"), Some(&Value::Int(5)));
    }

    #[test]
    fn same_params_ignores_tags() {
        let a = Configuration::new("x").with("p", 1_i64).with_request_id(3);
        let b = Configuration::new("y").with("p", 1_i64);
        assert!(a.same_params(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_params_as_map() {
        let c = Configuration::new("random").with("x", 0.5).with("opt", "adam");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"params": {"x": 0.5, "opt": "adam"}, "requestor": "random"})
        );
        let text = serde_json::to_string(&c).unwrap();
        let back: Configuration = serde_json::from_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
