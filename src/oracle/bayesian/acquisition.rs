//! Acquisition functions.
//!
//! Scores are computed against `best = min(y)` in objective units. The
//! oracle sorts candidates by score ascending and keeps the lowest.

use crate::error::{Error, Result};

/// Exploration weight of the `ucb` score.
const UCB_KAPPA: f64 = 2.5;

/// Quantile of the observed values below which a point counts as good.
const LFBO_GAMMA: f64 = 0.33;

/// Standard deviation substituted for a zero predictive std.
pub(crate) const MIN_STD: f64 = 1e-9;

/// How candidates are scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// Expected improvement: `a·Φ(a/σ) + σ·φ(a/σ)` with `a = μ - best`.
    Ei,
    /// Probability of improvement: `Φ((μ - best)/σ)`.
    Poi,
    /// Upper confidence bound: `μ + 2.5·σ`.
    Ucb,
    /// Likelihood-free EI: classifier trained with improvement weights.
    LfboEi,
    /// Likelihood-free PI: classifier trained with unit weights.
    LfboPoi,
    /// Raw regressor mean.
    Naive0,
}

impl Acquisition {
    /// Parses an acquisition name and checks it against the regressor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAcquisition`] for unknown names, and for
    /// `ei`/`poi`/`ucb` when the regressor has no predictive std.
    pub fn parse(name: &str, regressor: &str, regressor_has_std: bool) -> Result<Self> {
        let acquisition = match name {
            "ei" => Self::Ei,
            "poi" => Self::Poi,
            "ucb" => Self::Ucb,
            "lfboei" => Self::LfboEi,
            "lfbopoi" => Self::LfboPoi,
            "naive0" => Self::Naive0,
            _ => {
                return Err(Error::UnsupportedAcquisition {
                    acquisition: name.to_owned(),
                    regressor: regressor.to_owned(),
                });
            }
        };
        if acquisition.needs_std() && !regressor_has_std {
            return Err(Error::UnsupportedAcquisition {
                acquisition: name.to_owned(),
                regressor: regressor.to_owned(),
            });
        }
        Ok(acquisition)
    }

    /// DSL name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ei => "ei",
            Self::Poi => "poi",
            Self::Ucb => "ucb",
            Self::LfboEi => "lfboei",
            Self::LfboPoi => "lfbopoi",
            Self::Naive0 => "naive0",
        }
    }

    /// `true` for scores that need the regressor's predictive std.
    #[must_use]
    pub fn needs_std(self) -> bool {
        matches!(self, Self::Ei | Self::Poi | Self::Ucb)
    }

    /// `true` for the classifier-based scores.
    #[must_use]
    pub fn is_likelihood_free(self) -> bool {
        matches!(self, Self::LfboEi | Self::LfboPoi)
    }

    /// Scores a candidate from its predictive mean and std.
    ///
    /// Not meaningful for the likelihood-free variants, whose score is
    /// `-P(good)` from the classifier.
    #[must_use]
    pub fn score(self, mean: f64, std: f64, best: f64) -> f64 {
        let std = if std > 0.0 { std } else { MIN_STD };
        match self {
            Self::Ei => {
                let a = mean - best;
                let z = a / std;
                a * norm_cdf(z) + std * norm_pdf(z)
            }
            Self::Poi => norm_cdf((mean - best) / std),
            Self::Ucb => mean + UCB_KAPPA * std,
            Self::Naive0 | Self::LfboEi | Self::LfboPoi => mean,
        }
    }

    /// Labels and sample weights for the likelihood-free classifier.
    ///
    /// `τ` is the 0.33-quantile (linear interpolation) of the unique observed
    /// values and a point is good when `y < τ`. `lfboei` weights good points
    /// by `τ - y` normalized to mean one; everything else weighs one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn likelihood_free_targets(self, y: &[f64]) -> (Vec<bool>, Vec<f64>) {
        let tau = unique_quantile(y, LFBO_GAMMA);
        let labels: Vec<bool> = y.iter().map(|&v| v < tau).collect();
        let mut weights = vec![1.0; y.len()];
        if self == Self::LfboEi {
            let positives: Vec<usize> = (0..y.len()).filter(|&i| labels[i]).collect();
            let mean = positives.iter().map(|&i| tau - y[i]).sum::<f64>()
                / positives.len().max(1) as f64;
            if mean > 0.0 {
                for i in positives {
                    weights[i] = (tau - y[i]) / mean;
                }
            }
        }
        (labels, weights)
    }
}

/// `q`-quantile of the distinct values of `y`, linearly interpolated.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn unique_quantile(y: &[f64], q: f64) -> f64 {
    let mut unique: Vec<f64> = y.iter().copied().filter(|v| v.is_finite()).collect();
    unique.sort_by(f64::total_cmp);
    unique.dedup_by(|a, b| a.to_bits() == b.to_bits());
    match unique.len() {
        0 => f64::NAN,
        1 => unique[0],
        m => {
            let pos = q * (m - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(m - 1);
            let frac = pos - lo as f64;
            unique[lo] + frac * (unique[hi] - unique[lo])
        }
    }
}

// ---------------------------------------------------------------------------
// Normal distribution helpers
// ---------------------------------------------------------------------------

/// Standard normal PDF.
pub(crate) fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart rational approximation).
pub(crate) fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_reference_points() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((norm_cdf(-1.96) - 0.025).abs() < 1e-4);
        assert!(norm_cdf(-9.0) == 0.0 && norm_cdf(9.0) == 1.0);
    }

    #[test]
    fn std_dependent_scores_need_a_gp() {
        assert!(Acquisition::parse("ei", "knn", false).is_err());
        assert!(Acquisition::parse("ucb", "knn", false).is_err());
        assert_eq!(
            Acquisition::parse("naive0", "knn", false).unwrap(),
            Acquisition::Naive0
        );
        assert_eq!(
            Acquisition::parse("lfboei", "knn", false).unwrap(),
            Acquisition::LfboEi
        );
        assert!(matches!(
            Acquisition::parse("pi", "gp", true),
            Err(Error::UnsupportedAcquisition { .. })
        ));
    }

    #[test]
    fn zero_std_is_replaced() {
        let s = Acquisition::Poi.score(1.0, 0.0, 1.0);
        assert!((s - 0.5).abs() < 1e-7);
        assert!((Acquisition::Ucb.score(2.0, 0.0, 0.0) - (2.0 + 2.5 * MIN_STD)).abs() < 1e-15);
    }

    #[test]
    fn quantile_of_unique_values() {
        // unique: [1, 2, 3, 4]; pos = 0.33 * 3 = 0.99
        let tau = unique_quantile(&[4.0, 1.0, 2.0, 2.0, 3.0], 0.33);
        assert!((tau - 1.99).abs() < 1e-12);
    }

    #[test]
    fn lfboei_weights_average_to_one() {
        let y = [4.0, 1.0, 0.5, 2.0, 3.0];
        let (labels, weights) = Acquisition::LfboEi.likelihood_free_targets(&y);
        let positive: Vec<f64> = labels
            .iter()
            .zip(&weights)
            .filter(|(l, _)| **l)
            .map(|(_, w)| *w)
            .collect();
        assert!(!positive.is_empty());
        let mean = positive.iter().sum::<f64>() / positive.len() as f64;
        assert!((mean - 1.0).abs() < 1e-12);

        let (_, unit) = Acquisition::LfboPoi.likelihood_free_targets(&y);
        assert!(unit.iter().all(|w| (*w - 1.0).abs() < f64::EPSILON));
    }
}
