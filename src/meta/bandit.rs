//! Multi-armed bandit strategies used to rank child oracles.
//!
//! Every strategy keeps two counters per arm: pulls (how often the arm was
//! selected) and wins (how often it was rewarded). Wins may exceed pulls
//! because one improvement can pay out several rewards.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Beta, Distribution};

use crate::error::{Error, Result};

/// An arm-selection strategy.
pub trait Bandit: Send {
    /// Picks an arm and ranks all arms, best first. Counts a pull for the
    /// chosen arm, which is always `ranking[0]`.
    fn select(&mut self) -> (usize, Vec<usize>);

    /// Credits one win to `arm`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownArm`] if `arm` is out of range.
    fn reward(&mut self, arm: usize) -> Result<()>;

    /// Number of arms.
    fn n_arms(&self) -> usize;
}

/// Pull and win counters shared by the strategies.
#[derive(Clone, Debug, Default)]
struct Arms {
    pulls: Vec<u64>,
    wins: Vec<u64>,
}

impl Arms {
    fn new(n_arms: usize) -> Self {
        Self {
            pulls: vec![0; n_arms],
            wins: vec![0; n_arms],
        }
    }

    fn len(&self) -> usize {
        self.pulls.len()
    }

    fn total_pulls(&self) -> u64 {
        self.pulls.iter().sum()
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, arm: usize) -> f64 {
        self.wins[arm] as f64 / self.pulls[arm].max(1) as f64
    }

    fn reward(&mut self, arm: usize) -> Result<()> {
        let n_arms = self.len();
        let wins = self
            .wins
            .get_mut(arm)
            .ok_or(Error::UnknownArm { arm, n_arms })?;
        *wins += 1;
        Ok(())
    }

    /// Ranks arms by `score` descending (ties keep index order) and pulls the top.
    fn rank_and_pull(&mut self, scores: &[f64]) -> (usize, Vec<usize>) {
        let mut ranking: Vec<usize> = (0..scores.len()).collect();
        ranking.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let arm = ranking.first().copied().unwrap_or(0);
        if let Some(pulls) = self.pulls.get_mut(arm) {
            *pulls += 1;
        }
        (arm, ranking)
    }
}

/// UCB1: `mean + sqrt(2 ln N / n)`, unplayed arms first.
#[derive(Clone, Debug)]
pub struct Ucb1 {
    arms: Arms,
}

impl Ucb1 {
    /// Creates a strategy over `n_arms` arms.
    #[must_use]
    pub fn new(n_arms: usize) -> Self {
        Self {
            arms: Arms::new(n_arms),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
impl Bandit for Ucb1 {
    fn select(&mut self) -> (usize, Vec<usize>) {
        let ln_total = (self.arms.total_pulls().max(1) as f64).ln();
        let scores: Vec<f64> = (0..self.arms.len())
            .map(|i| {
                let n = self.arms.pulls[i];
                if n == 0 {
                    f64::INFINITY
                } else {
                    self.arms.mean(i) + (2.0 * ln_total / n as f64).sqrt()
                }
            })
            .collect();
        self.arms.rank_and_pull(&scores)
    }

    fn reward(&mut self, arm: usize) -> Result<()> {
        self.arms.reward(arm)
    }

    fn n_arms(&self) -> usize {
        self.arms.len()
    }
}

/// UCB-Tuned: UCB1 with the exploration term capped by a variance estimate.
#[derive(Clone, Debug)]
pub struct UcbTuned {
    arms: Arms,
}

impl UcbTuned {
    /// Creates a strategy over `n_arms` arms.
    #[must_use]
    pub fn new(n_arms: usize) -> Self {
        Self {
            arms: Arms::new(n_arms),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
impl Bandit for UcbTuned {
    fn select(&mut self) -> (usize, Vec<usize>) {
        let ln_total = (self.arms.total_pulls().max(1) as f64).ln();
        let scores: Vec<f64> = (0..self.arms.len())
            .map(|i| {
                let n = self.arms.pulls[i];
                if n == 0 {
                    return f64::INFINITY;
                }
                let n = n as f64;
                let mean = self.arms.mean(i);
                // Bernoulli variance of the win rate; wins can outnumber pulls
                let p = mean.clamp(0.0, 1.0);
                let variance = p * (1.0 - p) + (2.0 * ln_total / n).sqrt();
                mean + (ln_total / n * variance.min(0.25)).sqrt()
            })
            .collect();
        self.arms.rank_and_pull(&scores)
    }

    fn reward(&mut self, arm: usize) -> Result<()> {
        self.arms.reward(arm)
    }

    fn n_arms(&self) -> usize {
        self.arms.len()
    }
}

/// Thompson sampling with a Beta posterior per arm.
#[derive(Debug)]
pub struct Thompson {
    arms: Arms,
    rng: StdRng,
}

impl Thompson {
    /// Creates a strategy over `n_arms` arms drawing from a seeded RNG.
    #[must_use]
    pub fn new(n_arms: usize, seed: u64) -> Self {
        Self {
            arms: Arms::new(n_arms),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
impl Bandit for Thompson {
    fn select(&mut self) -> (usize, Vec<usize>) {
        let scores: Vec<f64> = (0..self.arms.len())
            .map(|i| {
                let wins = self.arms.wins[i];
                let losses = self.arms.pulls[i].saturating_sub(wins);
                // Both shapes are at least 1, so the posterior is always valid
                Beta::new(1.0 + wins as f64, 1.0 + losses as f64)
                    .map_or(0.5, |posterior| posterior.sample(&mut self.rng))
            })
            .collect();
        self.arms.rank_and_pull(&scores)
    }

    fn reward(&mut self, arm: usize) -> Result<()> {
        self.arms.reward(arm)
    }

    fn n_arms(&self) -> usize {
        self.arms.len()
    }
}

/// Builds a bandit over `n_arms` arms from a seed.
pub type BanditFactory = fn(usize, u64) -> Box<dyn Bandit>;

/// [`BanditFactory`] for [`Ucb1`].
#[must_use]
pub fn ucb1(n_arms: usize, _seed: u64) -> Box<dyn Bandit> {
    Box::new(Ucb1::new(n_arms))
}

/// [`BanditFactory`] for [`UcbTuned`].
#[must_use]
pub fn ucb_tuned(n_arms: usize, _seed: u64) -> Box<dyn Bandit> {
    Box::new(UcbTuned::new(n_arms))
}

/// [`BanditFactory`] for [`Thompson`].
#[must_use]
pub fn thompson(n_arms: usize, seed: u64) -> Box<dyn Bandit> {
    Box::new(Thompson::new(n_arms, seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ucb1_plays_every_arm_first() {
        let mut b = Ucb1::new(3);
        let picks: Vec<usize> = (0..3).map(|_| b.select().0).collect();
        assert_eq!(picks, vec![0, 1, 2]);
    }

    #[test]
    fn ucb1_prefers_rewarded_arm() {
        let mut b = Ucb1::new(2);
        b.select();
        b.select();
        for _ in 0..5 {
            b.reward(1).unwrap();
        }
        let (arm, ranking) = b.select();
        assert_eq!(arm, 1);
        assert_eq!(ranking, vec![1, 0]);
    }

    #[test]
    fn ucb_tuned_prefers_rewarded_arm() {
        let mut b = UcbTuned::new(3);
        for _ in 0..3 {
            b.select();
        }
        b.reward(2).unwrap();
        assert_eq!(b.select().0, 2);
    }

    #[test]
    fn thompson_is_seeded() {
        let mut a = Thompson::new(4, 11);
        let mut b = Thompson::new(4, 11);
        for _ in 0..10 {
            assert_eq!(a.select(), b.select());
        }
    }

    #[test]
    fn thompson_favours_winner() {
        let mut b = Thompson::new(2, 3);
        for _ in 0..50 {
            b.reward(0).unwrap();
        }
        let firsts = (0..20).filter(|_| b.select().0 == 0).count();
        assert!(firsts >= 15);
    }

    #[test]
    fn ranking_is_a_permutation() {
        let mut b = Ucb1::new(5);
        let (arm, mut ranking) = b.select();
        assert_eq!(arm, ranking[0]);
        ranking.sort_unstable();
        assert_eq!(ranking, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_reward_fails() {
        for mut b in [ucb1(2, 0), ucb_tuned(2, 0), thompson(2, 0)] {
            assert!(matches!(
                b.reward(2),
                Err(Error::UnknownArm { arm: 2, n_arms: 2 })
            ));
            assert_eq!(b.n_arms(), 2);
        }
    }
}
