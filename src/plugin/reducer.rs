//! Sequential domain reduction.
//!
//! After every observation the reducer re-centres the oracle's bounds on the
//! best point seen so far and shrinks their width. The contraction rate
//! depends on whether the optimum keeps moving in the same direction
//! (panning, rate `gamma_pan`) or oscillates (rate `gamma_osc`), blended by
//! how far it moved (`eta` when it stays put).

use super::{Event, Subscriber};
use crate::error::{Error, Result};

const DEFAULT_GAMMA_OSC: f64 = 0.7;
const DEFAULT_GAMMA_PAN: f64 = 1.0;
const DEFAULT_ETA: f64 = 0.9;

/// Per-dimension trimming state, created from the bounds seen on the first event.
#[derive(Clone, Debug)]
struct Trim {
    original: Vec<(f64, f64)>,
    current_optimal: Vec<f64>,
    previous_d: Vec<f64>,
    r: Vec<f64>,
}

/// Domain-reduction plugin.
///
/// # Examples
///
/// ```
/// use feijoa::plugin::DomainReducer;
///
/// let reducer = DomainReducer::builder().gamma_osc(0.8).build().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct DomainReducer {
    gamma_osc: f64,
    gamma_pan: f64,
    eta: f64,
    minimum_window: f64,
    trim: Option<Trim>,
}

impl DomainReducer {
    /// Creates a reducer with the default rates.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gamma_osc: DEFAULT_GAMMA_OSC,
            gamma_pan: DEFAULT_GAMMA_PAN,
            eta: DEFAULT_ETA,
            minimum_window: 0.0,
            trim: None,
        }
    }

    /// Creates a builder for configuring a `DomainReducer`.
    #[must_use]
    pub fn builder() -> DomainReducerBuilder {
        DomainReducerBuilder::default()
    }

    fn contraction(&self, d: f64, previous_d: f64) -> f64 {
        let c = d * previous_d;
        let c_hat = c.abs().sqrt() * c.signum();
        let gamma = 0.5 * (self.gamma_pan * (1.0 + c_hat) + self.gamma_osc * (1.0 - c_hat));
        self.eta + d.abs() * (gamma - self.eta)
    }

    fn update(&mut self, x: &[Vec<f64>], y: &[f64], bounds: &mut [(f64, f64)]) {
        let Some(best_idx) = y
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
        else {
            return;
        };
        let best = &x[best_idx];

        let trim = self
            .trim
            .get_or_insert_with(|| Trim {
                original: bounds.to_vec(),
                current_optimal: bounds.iter().map(|(lo, hi)| f64::midpoint(*lo, *hi)).collect(),
                previous_d: vec![0.0; bounds.len()],
                r: bounds.iter().map(|(lo, hi)| hi - lo).collect(),
            })
            .clone();
        let trim_len = trim.r.len();
        if best.len() != trim_len || bounds.len() != trim_len {
            return;
        }

        let mut next = trim.clone();
        for j in 0..trim_len {
            let d = if trim.r[j] > 0.0 {
                2.0 * (best[j] - trim.current_optimal[j]) / trim.r[j]
            } else {
                0.0
            };
            let rate = self.contraction(d, trim.previous_d[j]);
            let (lo0, hi0) = trim.original[j];
            let r = (rate * trim.r[j]).max(self.minimum_window.min(hi0 - lo0));

            let mut lo = best[j] - 0.5 * r;
            let mut hi = best[j] + 0.5 * r;
            if lo < lo0 {
                hi = (hi + (lo0 - lo)).min(hi0);
                lo = lo0;
            }
            if hi > hi0 {
                lo = (lo - (hi - hi0)).max(lo0);
                hi = hi0;
            }
            bounds[j] = (lo, hi);

            next.current_optimal[j] = best[j];
            next.previous_d[j] = d;
            next.r[j] = r;
        }
        self.trim = Some(next);
    }
}

impl Default for DomainReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for DomainReducer {
    fn name(&self) -> &str {
        "reducer"
    }

    fn on_event(&mut self, event: &Event<'_>, source: &str, bounds: &mut [(f64, f64)]) {
        match event {
            Event::Told { x, y } => {
                self.update(x, y, bounds);
                trace_debug!(oracle = source, ?bounds, "domain reduced");
                let _ = source;
            }
        }
    }
}

/// Builder for [`DomainReducer`].
#[derive(Clone, Debug, Default)]
pub struct DomainReducerBuilder {
    gamma_osc: Option<f64>,
    gamma_pan: Option<f64>,
    eta: Option<f64>,
    minimum_window: Option<f64>,
}

impl DomainReducerBuilder {
    /// Contraction rate while the optimum oscillates. Default: 0.7.
    #[must_use]
    pub fn gamma_osc(mut self, v: f64) -> Self {
        self.gamma_osc = Some(v);
        self
    }

    /// Contraction rate while the optimum pans. Default: 1.0.
    #[must_use]
    pub fn gamma_pan(mut self, v: f64) -> Self {
        self.gamma_pan = Some(v);
        self
    }

    /// Zooming rate when the optimum does not move. Default: 0.9.
    #[must_use]
    pub fn eta(mut self, v: f64) -> Self {
        self.eta = Some(v);
        self
    }

    /// Smallest width a dimension may shrink to. Default: 0.
    #[must_use]
    pub fn minimum_window(mut self, v: f64) -> Self {
        self.minimum_window = Some(v);
        self
    }

    /// Builds the reducer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOracleParameter`] if a rate is outside `(0, 1]`
    /// or the minimum window is negative.
    pub fn build(self) -> Result<DomainReducer> {
        let defaults = DomainReducer::new();
        let reducer = DomainReducer {
            gamma_osc: self.gamma_osc.unwrap_or(defaults.gamma_osc),
            gamma_pan: self.gamma_pan.unwrap_or(defaults.gamma_pan),
            eta: self.eta.unwrap_or(defaults.eta),
            minimum_window: self.minimum_window.unwrap_or(0.0),
            trim: None,
        };
        for (name, v) in [
            ("gamma_osc", reducer.gamma_osc),
            ("gamma_pan", reducer.gamma_pan),
            ("eta", reducer.eta),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(Error::invalid_param("reducer", name, "must be in (0, 1]"));
            }
        }
        if reducer.minimum_window < 0.0 {
            return Err(Error::invalid_param(
                "reducer",
                "minimum_window",
                "must not be negative",
            ));
        }
        Ok(reducer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrinks_around_best_point() {
        let mut reducer = DomainReducer::new();
        let mut bounds = vec![(0.0, 10.0), (-5.0, 5.0)];
        let x = vec![vec![2.0, 0.0], vec![3.0, 1.0]];
        let y = vec![4.0, 1.0];
        reducer.on_event(&Event::Told { x: &x, y: &y }, "bayesian", &mut bounds);

        for ((lo, hi), (lo0, hi0)) in bounds.iter().zip([(0.0, 10.0), (-5.0, 5.0)]) {
            assert!(*lo >= lo0 && *hi <= hi0);
            assert!(hi - lo < hi0 - lo0);
        }
        assert!(bounds[0].0 <= 3.0 && bounds[0].1 >= 3.0);
        assert!(bounds[1].0 <= 1.0 && bounds[1].1 >= 1.0);
    }

    #[test]
    fn keeps_shrinking_while_optimum_is_still() {
        let mut reducer = DomainReducer::new();
        let mut bounds = vec![(0.0, 1.0)];
        let x = vec![vec![0.5]];
        let y = vec![0.0];
        let mut widths = Vec::new();
        for _ in 0..5 {
            reducer.on_event(&Event::Told { x: &x, y: &y }, "o", &mut bounds);
            widths.push(bounds[0].1 - bounds[0].0);
        }
        assert!(widths.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn rejects_out_of_range_rates() {
        assert!(DomainReducer::builder().gamma_osc(1.5).build().is_err());
        assert!(DomainReducer::builder().eta(0.0).build().is_err());
        assert!(DomainReducer::builder().minimum_window(-1.0).build().is_err());
    }
}
