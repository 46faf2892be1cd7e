//! Measurement noise sources.
//!
//! The calibration loop draws uniform samples in `[0, 1)` for its initial
//! lane values, random perturbations and final eye margin. A [`NoiseSource`]
//! is injected per call so tests can run noiseless.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Uniform sample stream in `[0, 1)`
pub trait NoiseSource {
    /// Next sample
    fn sample(&mut self) -> f64;
}

/// Always returns the midpoint; every perturbation term vanishes
#[derive(Debug, Clone, Copy, Default)]
pub struct Noiseless;

impl NoiseSource for Noiseless {
    fn sample(&mut self) -> f64 {
        0.5
    }
}

/// ChaCha8-backed reproducible noise
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: ChaCha8Rng,
}

impl SeededNoise {
    /// Noise stream for a literal seed
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Noise stream derived from a base seed and a context string
    #[must_use]
    pub fn derive(seed: u64, context: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write_u64(seed);
        hasher.write(context.as_bytes());
        Self::new(hasher.finish())
    }
}

impl NoiseSource for SeededNoise {
    fn sample(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

/// Noise configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseModel {
    /// No noise
    Disabled,
    /// Seeded noise, derived per corridor
    Seeded {
        /// Base seed
        seed: u64,
    },
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self::Seeded { seed: 0 }
    }
}

impl NoiseModel {
    /// Build the noise stream for one calibration of `corridor`
    #[must_use]
    pub fn source_for(&self, corridor: &str) -> Box<dyn NoiseSource + Send> {
        match self {
            Self::Disabled => Box::new(Noiseless),
            Self::Seeded { seed } => Box::new(SeededNoise::derive(*seed, corridor)),
        }
    }
}
