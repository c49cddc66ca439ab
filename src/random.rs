//! Randomness seam.
//!
//! Selection and idle scheduling never touch a global generator; they draw
//! from whatever `RandomSource` the owner hands in, so tests can seed or
//! script every decision.

/// Source of the three kinds of draws the engine needs.
pub trait RandomSource {
    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` is never zero.
    fn index(&mut self, len: usize) -> usize;

    /// Uniform in `min..=max`.
    fn between(&mut self, min: u32, max: u32) -> u32;
}

impl RandomSource for fastrand::Rng {
    fn unit(&mut self) -> f64 {
        self.f64()
    }

    fn index(&mut self, len: usize) -> usize {
        self.usize(..len)
    }

    fn between(&mut self, min: u32, max: u32) -> u32 {
        self.u32(min..=max)
    }
}

/// Generator seeded from `seed`, or from entropy when none is given.
pub fn rng_from_seed(seed: Option<u64>) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    }
}
