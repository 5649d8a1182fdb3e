//! Grid search oracle implementation.
//!
//! [`Grid`] enumerates the Cartesian product of per-parameter grids in
//! parameter-insertion order, the last parameter varying fastest, and
//! returns `None` once every point has been handed out.

use super::Oracle;
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::parameter::{Categorical, Integer, Parameter, Real};
use crate::space::SearchSpace;
use crate::value::Value;

/// Default spacing between grid points of a real parameter.
const DEFAULT_STEP: f64 = 0.1;

/// Upper bound on the points generated for a single real parameter.
const MAX_POINTS_PER_PARAM: usize = 1_000_000;

/// Generates grid points for an integer parameter: every value in `low..=high`.
#[must_use]
fn integer_grid_points(param: &Integer) -> Vec<i64> {
    (param.low()..=param.high()).collect()
}

/// Generates grid points for a real parameter.
///
/// Points are `low, low + step, low + 2 * step, ...` up to `high`, each
/// rounded to two decimals. A non-positive step yields `[low]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
fn real_grid_points(param: &Real, step: f64) -> Vec<f64> {
    let (low, high) = (param.low(), param.high());
    if step <= 0.0 || (high - low).abs() < f64::EPSILON {
        return vec![round2(low)];
    }
    let mut points = Vec::new();
    let mut k = 0_usize;
    loop {
        // Multiply rather than accumulate so rounding error does not drift
        let current = low + k as f64 * step;
        if current > high + 1e-9 || points.len() >= MAX_POINTS_PER_PARAM {
            break;
        }
        points.push(round2(current.min(high)));
        k += 1;
    }
    points.dedup_by(|a, b| a.to_bits() == b.to_bits());
    points
}

/// Generates grid points for a categorical parameter: every choice.
#[must_use]
fn categorical_grid_points(param: &Categorical) -> Vec<Value> {
    param.choices().to_vec()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Position in the Cartesian product, one digit per parameter.
#[derive(Clone, Debug)]
enum Cursor {
    /// Points not generated yet.
    Pending,
    /// Next tuple to emit.
    At(Vec<usize>),
    /// Every tuple has been emitted.
    Exhausted,
}

/// An exhaustive grid search oracle.
///
/// # Examples
///
/// ```
/// use feijoa::oracle::Grid;
/// use feijoa::{Oracle, Parameter, SearchSpace};
///
/// let space = SearchSpace::new()
///     .with(Parameter::integer("x", 0, 2).unwrap())
///     .with(Parameter::categorical("z", ["foo", "bar"]).unwrap());
/// let mut grid = Grid::new(space);
/// assert_eq!(grid.ask(100).unwrap().len(), 6);
/// assert!(grid.ask(1).is_none());
/// ```
#[derive(Clone, Debug)]
pub struct Grid {
    name: String,
    space: SearchSpace,
    step: f64,
    axes: Vec<Vec<Value>>,
    cursor: Cursor,
}

impl Grid {
    /// Creates a grid oracle with the default real step of 0.1.
    #[must_use]
    pub fn new(space: SearchSpace) -> Self {
        Self {
            name: "grid".to_owned(),
            space,
            step: DEFAULT_STEP,
            axes: Vec::new(),
            cursor: Cursor::Pending,
        }
    }

    /// Creates a builder for configuring a `Grid`.
    #[must_use]
    pub fn builder() -> GridBuilder {
        GridBuilder::default()
    }

    /// Total number of grid points.
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.space
            .iter()
            .map(|p| self.axis(p).len())
            .product()
    }

    /// `true` once every point has been emitted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.cursor, Cursor::Exhausted)
    }

    fn axis(&self, param: &Parameter) -> Vec<Value> {
        match param {
            Parameter::Integer(p) => integer_grid_points(p).into_iter().map(Value::Int).collect(),
            Parameter::Real(p) => real_grid_points(p, self.step)
                .into_iter()
                .map(Value::Real)
                .collect(),
            Parameter::Categorical(p) => categorical_grid_points(p),
        }
    }

    fn start(&mut self) {
        self.axes = self.space.iter().map(|p| self.axis(p)).collect();
        self.cursor = if self.axes.is_empty() || self.axes.iter().any(Vec::is_empty) {
            Cursor::Exhausted
        } else {
            Cursor::At(vec![0; self.axes.len()])
        };
        trace_debug!(oracle = %self.name, size = self.grid_size(), "grid generated");
    }

    /// Emits the tuple under the cursor and advances it, odometer style.
    fn next_point(&mut self) -> Option<Configuration> {
        let Cursor::At(digits) = &mut self.cursor else {
            return None;
        };
        let pairs = self
            .space
            .iter()
            .zip(&self.axes)
            .zip(digits.iter())
            .map(|((p, axis), &d)| (p.name().to_owned(), axis[d].clone()))
            .collect();
        let config = Configuration::from_pairs(pairs, self.name.clone());

        let mut carry = true;
        for (digit, axis) in digits.iter_mut().zip(&self.axes).rev() {
            *digit += 1;
            if *digit < axis.len() {
                carry = false;
                break;
            }
            *digit = 0;
        }
        if carry {
            self.cursor = Cursor::Exhausted;
        }
        Some(config)
    }
}

impl Oracle for Grid {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn ask(&mut self, n: usize) -> Option<Vec<Configuration>> {
        if matches!(self.cursor, Cursor::Pending) {
            self.start();
        }
        let batch: Vec<Configuration> = (0..n).map_while(|_| self.next_point()).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }

    fn tell(&mut self, _config: &Configuration, _result: f64) -> Result<()> {
        Ok(())
    }
}

/// Builder for configuring a [`Grid`].
#[derive(Debug, Clone, Default)]
pub struct GridBuilder {
    step: Option<f64>,
}

impl GridBuilder {
    /// Sets the spacing between points of real parameters.
    ///
    /// Default: 0.1.
    #[must_use]
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Builds the grid over `space`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if the step is not a
    /// positive finite number.
    pub fn build(self, space: SearchSpace) -> Result<Grid> {
        let step = self.step.unwrap_or(DEFAULT_STEP);
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::invalid_param("grid", "step", "must be positive"));
        }
        let mut grid = Grid::new(space);
        grid.step = step;
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_points_are_rounded_and_bounded() {
        let p = Real::new("y", 0.0, 0.5).unwrap();
        assert_eq!(real_grid_points(&p, 0.1), vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);

        let p = Real::new("y", 0.0, 0.25).unwrap();
        assert_eq!(real_grid_points(&p, 0.1), vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn degenerate_real_has_one_point() {
        let p = Real::new("y", 1.0, 1.0).unwrap();
        assert_eq!(real_grid_points(&p, 0.1), vec![1.0]);
    }

    #[test]
    fn last_parameter_varies_fastest() {
        let space = SearchSpace::new()
            .with(Parameter::integer("a", 0, 1).unwrap())
            .with(Parameter::integer("b", 0, 2).unwrap());
        let mut grid = Grid::new(space);
        let batch = grid.ask(3).unwrap();
        let bs: Vec<i64> = batch
            .iter()
            .map(|c| c.get("b").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(bs, vec![0, 1, 2]);
        assert!(batch.iter().all(|c| c.get("a") == Some(&Value::Int(0))));
    }

    #[test]
    fn rejects_bad_step() {
        assert!(Grid::builder().step(0.0).build(SearchSpace::new()).is_err());
    }

    #[test]
    fn empty_space_is_exhausted() {
        let mut grid = Grid::new(SearchSpace::new());
        assert!(grid.ask(1).is_none());
    }
}
