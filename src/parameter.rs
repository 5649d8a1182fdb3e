//! Typed search dimensions and visitor-based dispatch.
//!
//! A [`Parameter`] is one axis of the search space: an [`Integer`] range,
//! a [`Real`] range, or a [`Categorical`] choice list. Every constructor
//! validates its input and fails with
//! [`Error::IncorrectInputValues`](crate::Error::IncorrectInputValues).
//!
//! Numeric ("primitive") parameters can be mapped to and from the unit
//! interval; local-search oracles use that mapping to take steps of a
//! uniform size across dimensions with different scales.
//!
//! # Example
//!
//! ```
//! use feijoa::parameter::Parameter;
//!
//! let x = Parameter::integer("x", 0, 10).unwrap();
//! let u = x.get_unit_value(&0.into()).unwrap();
//! assert!(u > 0.0 && u < 0.05);
//!
//! assert!(Parameter::integer("y", 5, 1).is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Largest `f64` strictly below 1.
const UNIT_BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// An integer range `[low, high]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Integer {
    name: String,
    low: i64,
    high: i64,
}

impl Integer {
    /// Creates an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectInputValues`] if the name is empty or `low > high`.
    pub fn new(name: impl Into<String>, low: i64, high: i64) -> Result<Self> {
        let name = check_name(name.into())?;
        if low > high {
            return Err(Error::incorrect(
                name,
                format!("low ({low}) must be less than or equal to high ({high})"),
            ));
        }
        Ok(Self { name, low, high })
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub fn low(&self) -> i64 {
        self.low
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub fn high(&self) -> i64 {
        self.high
    }

    /// Maps `value` into `(0, 1)`.
    ///
    /// Each integer owns a cell of width `1 / (high - low + 1)` and maps to
    /// the middle of it, so neither bound lands on the edge of the interval.
    /// Ranges too wide for `f64` to resolve a half cell are pinned just
    /// inside the interval.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn unit_value(&self, value: i64) -> f64 {
        let offset = (i128::from(value) - i128::from(self.low)) as f64;
        ((offset + 0.5) / self.span()).clamp(f64::MIN_POSITIVE, UNIT_BELOW_ONE)
    }

    /// Inverse of [`unit_value`](Self::unit_value): picks the cell containing `unit`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_unit(&self, unit: f64) -> i64 {
        let offset = (unit.clamp(0.0, 1.0) * self.span()).floor() as i128;
        let value = (i128::from(self.low) + offset).clamp(i128::from(self.low), i128::from(self.high));
        i64::try_from(value).unwrap_or(self.high)
    }

    /// Number of integers in the range, widened so `i64::MIN..=i64::MAX` fits.
    #[allow(clippy::cast_precision_loss)]
    fn span(&self) -> f64 {
        (i128::from(self.high) - i128::from(self.low) + 1) as f64
    }
}

/// A real range `[low, high]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Real {
    name: String,
    low: f64,
    high: f64,
}

impl Real {
    /// Creates a real parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectInputValues`] if the name is empty, a bound is
    /// not finite, or `low > high`.
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        let name = check_name(name.into())?;
        if !low.is_finite() || !high.is_finite() {
            return Err(Error::incorrect(name, "bounds must be finite numbers"));
        }
        if low > high {
            return Err(Error::incorrect(
                name,
                format!("low ({low}) must be less than or equal to high ({high})"),
            ));
        }
        Ok(Self { name, low, high })
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Maps `value` linearly onto `[0, 1]`. A degenerate range maps to `0.5`.
    #[must_use]
    pub fn unit_value(&self, value: f64) -> f64 {
        let span = self.high - self.low;
        if span.abs() < f64::EPSILON {
            0.5
        } else {
            (value - self.low) / span
        }
    }

    /// Inverse of [`unit_value`](Self::unit_value), clamped to the bounds.
    #[must_use]
    pub fn from_unit(&self, unit: f64) -> f64 {
        (self.low + unit.clamp(0.0, 1.0) * (self.high - self.low)).clamp(self.low, self.high)
    }
}

/// A finite list of unique choices.
#[derive(Clone, Debug, PartialEq)]
pub struct Categorical {
    name: String,
    choices: Vec<Value>,
}

impl Categorical {
    /// Creates a categorical parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectInputValues`] if the name is empty, `choices`
    /// is empty, or a choice appears twice.
    pub fn new(name: impl Into<String>, choices: Vec<Value>) -> Result<Self> {
        let name = check_name(name.into())?;
        if choices.is_empty() {
            return Err(Error::incorrect(name, "categorical choices cannot be empty"));
        }
        for (i, choice) in choices.iter().enumerate() {
            if choices[..i].iter().any(|c| c.same_as(choice)) {
                return Err(Error::incorrect(
                    name,
                    format!("categorical choice '{choice}' appears more than once"),
                ));
            }
        }
        Ok(Self { name, choices })
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The available choices, in declaration order.
    #[must_use]
    pub fn choices(&self) -> &[Value] {
        &self.choices
    }

    /// Position of `value` in the choice list.
    #[must_use]
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.choices.iter().position(|c| c.same_as(value))
    }
}

fn check_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::incorrect(name, "parameter name cannot be empty"));
    }
    Ok(name)
}

/// Double-dispatch over the parameter variants.
///
/// Implemented by anything that needs per-type behavior without matching on
/// [`Parameter`] itself, e.g. the [`Randomizer`](crate::Randomizer).
pub trait ParametersVisitor {
    /// The result of visiting one parameter.
    type Output;

    /// Called for [`Integer`] parameters.
    fn visit_integer(&mut self, param: &Integer) -> Self::Output;

    /// Called for [`Real`] parameters.
    fn visit_real(&mut self, param: &Real) -> Self::Output;

    /// Called for [`Categorical`] parameters.
    fn visit_categorical(&mut self, param: &Categorical) -> Self::Output;
}

/// One search dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    /// An integer range.
    Integer(Integer),
    /// A real range.
    Real(Real),
    /// A choice list.
    Categorical(Categorical),
}

impl Parameter {
    /// Shorthand for [`Integer::new`].
    ///
    /// # Errors
    ///
    /// See [`Integer::new`].
    pub fn integer(name: impl Into<String>, low: i64, high: i64) -> Result<Self> {
        Integer::new(name, low, high).map(Parameter::Integer)
    }

    /// Shorthand for [`Real::new`].
    ///
    /// # Errors
    ///
    /// See [`Real::new`].
    pub fn real(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        Real::new(name, low, high).map(Parameter::Real)
    }

    /// Shorthand for [`Categorical::new`].
    ///
    /// # Errors
    ///
    /// See [`Categorical::new`].
    pub fn categorical<V: Into<Value>>(
        name: impl Into<String>,
        choices: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        Categorical::new(name, choices.into_iter().map(Into::into).collect())
            .map(Parameter::Categorical)
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Parameter::Integer(p) => p.name(),
            Parameter::Real(p) => p.name(),
            Parameter::Categorical(p) => p.name(),
        }
    }

    /// Dispatches to the matching `visit_*` method of `visitor`.
    pub fn accept<V: ParametersVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Parameter::Integer(p) => visitor.visit_integer(p),
            Parameter::Real(p) => visitor.visit_real(p),
            Parameter::Categorical(p) => visitor.visit_categorical(p),
        }
    }

    /// `true` for numeric parameters, which support the unit-interval mapping.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Parameter::Categorical(_))
    }

    /// Maps a concrete value of this parameter into the unit interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for categorical parameters or values of
    /// the wrong type.
    pub fn get_unit_value(&self, value: &Value) -> Result<f64> {
        match (self, value) {
            (Parameter::Integer(p), Value::Int(v)) => Ok(p.unit_value(*v)),
            (Parameter::Real(p), v) => v
                .as_f64()
                .map(|v| p.unit_value(v))
                .ok_or_else(|| invalid_value(self, "expected a number")),
            (Parameter::Integer(_), _) => Err(invalid_value(self, "expected an integer")),
            (Parameter::Categorical(_), _) => Err(invalid_value(
                self,
                "categorical parameters have no unit mapping",
            )),
        }
    }

    /// Maps a unit-interval coordinate back to a concrete value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for categorical parameters.
    pub fn from_unit_value(&self, unit: f64) -> Result<Value> {
        match self {
            Parameter::Integer(p) => Ok(Value::Int(p.from_unit(unit))),
            Parameter::Real(p) => Ok(Value::Real(p.from_unit(unit))),
            Parameter::Categorical(_) => Err(invalid_value(
                self,
                "categorical parameters have no unit mapping",
            )),
        }
    }

    /// Numeric bounds used by vector-based oracles.
    ///
    /// Categorical parameters are encoded by choice index, so their bounds
    /// are `(0, n_choices - 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Parameter::Integer(p) => (p.low as f64, p.high as f64),
            Parameter::Real(p) => (p.low, p.high),
            Parameter::Categorical(p) => (0.0, (p.choices.len() - 1) as f64),
        }
    }

    /// Encodes a value as a coordinate inside [`bounds`](Self::bounds).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the value does not belong to this parameter.
    #[allow(clippy::cast_precision_loss)]
    pub fn encode(&self, value: &Value) -> Result<f64> {
        match (self, value) {
            (Parameter::Integer(_), Value::Int(v)) => Ok(*v as f64),
            (Parameter::Real(_), v) => v
                .as_f64()
                .ok_or_else(|| invalid_value(self, "expected a number")),
            (Parameter::Categorical(p), v) => p
                .index_of(v)
                .map(|i| i as f64)
                .ok_or_else(|| invalid_value(self, format!("'{v}' is not a valid choice"))),
            (Parameter::Integer(_), _) => Err(invalid_value(self, "expected an integer")),
        }
    }

    /// Decodes a coordinate back into a value, rounding and clamping as needed.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn decode(&self, x: f64) -> Value {
        match self {
            Parameter::Integer(p) => {
                let v = if x.is_finite() { x.round() } else { p.low as f64 };
                Value::Int((v as i64).clamp(p.low, p.high))
            }
            Parameter::Real(p) => {
                let v = if x.is_finite() { x } else { p.low };
                Value::Real(v.clamp(p.low, p.high))
            }
            Parameter::Categorical(p) => {
                let last = p.choices.len() - 1;
                let idx = if x.is_finite() {
                    (x.round().max(0.0) as usize).min(last)
                } else {
                    0
                };
                p.choices[idx].clone()
            }
        }
    }

    /// Converts the parameter into its persisted metadata record.
    #[must_use]
    pub fn to_metadata(&self) -> ParameterMeta {
        match self {
            Parameter::Integer(p) => ParameterMeta {
                name: p.name.clone(),
                kind: ParameterKind::Integer,
                low: Some(Value::Int(p.low)),
                high: Some(Value::Int(p.high)),
                choices: None,
            },
            Parameter::Real(p) => ParameterMeta {
                name: p.name.clone(),
                kind: ParameterKind::Real,
                low: Some(Value::Real(p.low)),
                high: Some(Value::Real(p.high)),
                choices: None,
            },
            Parameter::Categorical(p) => ParameterMeta {
                name: p.name.clone(),
                kind: ParameterKind::Categorical,
                low: None,
                high: None,
                choices: Some(p.choices.clone()),
            },
        }
    }
}

fn invalid_value(param: &Parameter, reason: impl Into<String>) -> Error {
    Error::InvalidValue {
        name: param.name().to_owned(),
        reason: reason.into(),
    }
}

/// The kind tag of a persisted parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// [`Integer`].
    #[serde(alias = "int")]
    Integer,
    /// [`Real`].
    #[serde(alias = "float")]
    Real,
    /// [`Categorical`].
    #[serde(alias = "choice")]
    Categorical,
}

/// Untyped parameter record, as found in YAML files and persisted jobs.
///
/// Converting it with [`TryFrom`] applies the same validation as the typed
/// constructors, plus type checks on the bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterMeta {
    /// Parameter name.
    pub name: String,
    /// Parameter kind.
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    /// Lower bound for numeric kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Value>,
    /// Upper bound for numeric kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Value>,
    /// Choices for categorical kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
}

impl TryFrom<&ParameterMeta> for Parameter {
    type Error = Error;

    fn try_from(meta: &ParameterMeta) -> Result<Self> {
        let bound = |b: &Option<Value>, which: &str| {
            b.clone()
                .ok_or_else(|| Error::incorrect(&meta.name, format!("missing '{which}' bound")))
        };
        match meta.kind {
            ParameterKind::Integer => {
                let low = bound(&meta.low, "low")?.as_i64();
                let high = bound(&meta.high, "high")?.as_i64();
                match (low, high) {
                    (Some(low), Some(high)) => Parameter::integer(&meta.name, low, high),
                    _ => Err(Error::incorrect(
                        &meta.name,
                        "integer bounds must be integers",
                    )),
                }
            }
            ParameterKind::Real => {
                let low = bound(&meta.low, "low")?.as_f64();
                let high = bound(&meta.high, "high")?.as_f64();
                match (low, high) {
                    (Some(low), Some(high)) => Parameter::real(&meta.name, low, high),
                    _ => Err(Error::incorrect(&meta.name, "real bounds must be numbers")),
                }
            }
            ParameterKind::Categorical => {
                let choices = meta
                    .choices
                    .clone()
                    .ok_or_else(|| Error::incorrect(&meta.name, "missing 'choices'"))?;
                Categorical::new(&meta.name, choices).map(Parameter::Categorical)
            }
        }
    }
}
