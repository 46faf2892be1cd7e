//! Calibration engine configuration.

use crate::noise::NoiseModel;
use serde::{Deserialize, Serialize};

/// Calibration engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Iteration budget
    pub max_iterations: u32,
    /// Converged once `ber <= tolerance * target`
    pub tolerance: f64,
    /// Exponent of the per-iteration correction, `e^(-decay * i)`
    pub decay_rate: f64,
    /// Modelled wall time of one iteration in milliseconds
    pub iteration_period_ms: u64,
    /// Lane count assumed when a request gives zero
    pub default_lambda_count: usize,
    /// Upper bound on lanes per request
    pub max_lambda_count: usize,
    /// Noise model
    pub noise: NoiseModel,
}

impl CalibrationConfig {
    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1.1,
            decay_rate: 0.2,
            iteration_period_ms: 10,
            default_lambda_count: 8,
            max_lambda_count: 256,
            noise: NoiseModel::default(),
        }
    }

    /// Set the iteration budget
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the convergence tolerance factor
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the modelled iteration period
    #[must_use]
    pub fn with_iteration_period(mut self, period_ms: u64) -> Self {
        self.iteration_period_ms = period_ms;
        self
    }

    /// Set the noise model
    #[must_use]
    pub fn with_noise(mut self, noise: NoiseModel) -> Self {
        self.noise = noise;
        self
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::new()
    }
}
