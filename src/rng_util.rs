/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Seed for the `index`-th component built from a parent seed.
#[inline]
pub(crate) fn derive_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add(index as u64)
}
