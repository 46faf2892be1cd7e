//! Bounded calibration loop.
//!
//! Each iteration pulls the bit-error-rate toward the target with an
//! exponentially decaying correction:
//!
//! ```text
//! ber_i = target + (ber_{i-1} - target) * e^(-decay * i)
//! ```
//!
//! The loop stops once `ber <= tolerance * target` or the iteration budget
//! is spent. Exhausting the budget is reported as `partial_convergence`, not
//! as an error. Profile drift scales the wavelength shifts by the modelled
//! convergence time; the temperature delta against the profile scales the
//! bias voltages.

use crate::config::CalibrationConfig;
use crate::noise::NoiseSource;
use crate::profile::{self, DEFAULT_PROFILE};
use corridor_core::{FabricError, FabricResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const NOMINAL_BIAS_V: f64 = 1.2;
const BIAS_SPREAD_V: f64 = 0.2;
const LAMBDA_SPREAD_NM: f64 = 0.02;
const LASER_SPREAD_DB: f64 = 0.5;
const PERTURB_PROBABILITY: f64 = 0.1;
const PERTURB_SPREAD_V: f64 = 0.01;
const TEMP_COEFFICIENT: f64 = 0.001;
const MS_PER_HOUR: f64 = 3_600_000.0;

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

/// Calibration request for one corridor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    /// Corridor being calibrated
    pub corridor_id: String,
    /// Target bit-error-rate
    pub target_ber: f64,
    /// Ambient profile key
    #[serde(default = "default_profile")]
    pub ambient_profile: String,
    /// Measured bit-error-rate
    pub current_ber: f64,
    /// Measured eye margin (UI)
    #[serde(default)]
    pub current_eye_margin: f64,
    /// Device temperature
    #[serde(rename = "temperature_c", default)]
    pub temperature_c: f64,
    /// Number of lanes; zero means the configured default
    #[serde(default)]
    pub lambda_count: usize,
}

impl CalibrationRequest {
    /// Request with lab defaults for everything but the BER pair
    #[must_use]
    pub fn new(corridor_id: impl Into<String>, target_ber: f64, current_ber: f64) -> Self {
        Self {
            corridor_id: corridor_id.into(),
            target_ber,
            ambient_profile: default_profile(),
            current_ber,
            current_eye_margin: 0.0,
            temperature_c: 22.0,
            lambda_count: 0,
        }
    }

    /// Set the ambient profile
    #[must_use]
    pub fn with_profile(mut self, key: impl Into<String>) -> Self {
        self.ambient_profile = key.into();
        self
    }

    /// Set the device temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    /// Set the lane count
    #[must_use]
    pub fn with_lambda_count(mut self, lanes: usize) -> Self {
        self.lambda_count = lanes;
        self
    }
}

/// Calibration outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Tolerance met within budget
    Converged,
    /// Budget spent; best values reported
    PartialConvergence,
}

/// Calibration result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Outcome
    pub status: CalibrationStatus,
    /// Whether tolerance was met
    pub converged: bool,
    /// Per-lane bias voltages
    #[serde(rename = "bias_voltages_mv")]
    pub bias_voltages: Vec<f64>,
    /// Per-lane wavelength shifts
    #[serde(rename = "lambda_shifts_nm")]
    pub lambda_shifts: Vec<f64>,
    /// Per-lane laser power adjustments
    #[serde(rename = "laser_power_adjust_db")]
    pub laser_power_adjust: Vec<f64>,
    /// Modelled convergence time
    pub convergence_time_ms: u64,
    /// BER after the last iteration
    pub final_ber: f64,
    /// Eye margin after calibration
    pub final_eye_margin: f64,
    /// Estimated power savings
    #[serde(rename = "power_savings_percent")]
    pub power_savings_percent: f64,
    /// Iterations spent
    pub iterations: u32,
    /// BER after each iteration
    pub trajectory: Vec<f64>,
}

impl CalibrationResult {
    /// The caveat carried by a partial result, as a reportable error
    #[must_use]
    pub fn caveat(&self, corridor: &str) -> Option<FabricError> {
        match self.status {
            CalibrationStatus::Converged => None,
            CalibrationStatus::PartialConvergence => Some(FabricError::PartialConvergence {
                corridor: corridor.to_string(),
                iterations: self.iterations,
                best_ber: self.final_ber,
            }),
        }
    }
}

/// Calibration engine
///
/// Stateless between calls; every invocation builds its own noise stream, so
/// retrying a request yields the same result.
#[derive(Debug, Clone, Default)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
}

impl CalibrationEngine {
    /// Create an engine
    #[must_use]
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrate with the configured noise model
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown profile, a non-positive or
    /// non-finite target, a negative or non-finite current BER, or too many
    /// lanes
    pub fn calibrate(&self, request: &CalibrationRequest) -> FabricResult<CalibrationResult> {
        let mut noise = self.config.noise.source_for(&request.corridor_id);
        self.calibrate_with(request, noise.as_mut())
    }

    /// Calibrate drawing from an explicit noise source
    ///
    /// # Errors
    ///
    /// Same as [`CalibrationEngine::calibrate`]
    pub fn calibrate_with(
        &self,
        request: &CalibrationRequest,
        noise: &mut dyn NoiseSource,
    ) -> FabricResult<CalibrationResult> {
        let profile = profile::profile(&request.ambient_profile)?;
        let target = request.target_ber;
        if !target.is_finite() || target <= 0.0 {
            return Err(FabricError::invalid("target_ber", "must be a positive finite number"));
        }
        if !request.current_ber.is_finite() || request.current_ber < 0.0 {
            return Err(FabricError::invalid("current_ber", "must be a non-negative finite number"));
        }
        let lanes = match request.lambda_count {
            0 => self.config.default_lambda_count,
            n if n > self.config.max_lambda_count => {
                return Err(FabricError::invalid(
                    "lambda_count",
                    format!("{n} exceeds the limit of {}", self.config.max_lambda_count),
                ));
            }
            n => n,
        };

        let mut bias: Vec<f64> = (0..lanes)
            .map(|_| NOMINAL_BIAS_V + (noise.sample() - 0.5) * BIAS_SPREAD_V)
            .collect();
        let mut shifts: Vec<f64> = (0..lanes)
            .map(|_| (noise.sample() - 0.5) * LAMBDA_SPREAD_NM)
            .collect();
        let laser: Vec<f64> = (0..lanes)
            .map(|_| (noise.sample() - 0.5) * LASER_SPREAD_DB)
            .collect();

        let threshold = target * self.config.tolerance;
        let mut ber = request.current_ber;
        let mut trajectory = Vec::with_capacity(self.config.max_iterations as usize);
        let mut converged = false;
        let mut iterations = 0u32;

        while !converged && iterations < self.config.max_iterations {
            iterations += 1;
            let correction = (-self.config.decay_rate * f64::from(iterations)).exp();
            ber = target + (ber - target) * correction;
            trajectory.push(ber);
            converged = ber <= threshold;

            if noise.sample() < PERTURB_PROBABILITY {
                for v in &mut bias {
                    *v += (noise.sample() - 0.5) * PERTURB_SPREAD_V;
                }
            }
        }

        let final_eye_margin = 0.8 + noise.sample() * 0.4;
        let power_savings_percent = noise.sample() * 15.0;
        let convergence_time_ms = u64::from(iterations) * self.config.iteration_period_ms;

        let drift = 1.0 + profile.drift_rate_nm_per_hour * (convergence_time_ms as f64 / MS_PER_HOUR);
        for s in &mut shifts {
            *s *= drift;
        }
        let thermal = 1.0 + (request.temperature_c - profile.temperature_c) * TEMP_COEFFICIENT;
        for v in &mut bias {
            *v *= thermal;
        }

        let status = if converged {
            debug!(corridor = %request.corridor_id, iterations, final_ber = ber, "calibration converged");
            CalibrationStatus::Converged
        } else {
            warn!(
                corridor = %request.corridor_id,
                iterations,
                final_ber = ber,
                target_ber = target,
                "calibration stopped at partial convergence"
            );
            CalibrationStatus::PartialConvergence
        };
        info!(
            corridor = %request.corridor_id,
            profile = %profile.key,
            lanes,
            ?status,
            "calibration finished"
        );

        Ok(CalibrationResult {
            status,
            converged,
            bias_voltages: bias,
            lambda_shifts: shifts,
            laser_power_adjust: laser,
            convergence_time_ms,
            final_ber: ber,
            final_eye_margin,
            power_savings_percent,
            iterations,
            trajectory,
        })
    }
}
