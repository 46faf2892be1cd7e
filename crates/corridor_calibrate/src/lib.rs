//! Corridor calibration engine
//!
//! Numeric model of the closed loop that holds a corridor's bit-error-rate
//! at target: bias voltages, wavelength shifts and laser power are adjusted
//! over a bounded number of iterations under a named ambient profile.
//! Measurement noise is injectable so runs can be made fully deterministic.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod noise;
pub mod profile;

pub use config::CalibrationConfig;
pub use engine::{CalibrationEngine, CalibrationRequest, CalibrationResult, CalibrationStatus};
pub use noise::{NoiseModel, NoiseSource, Noiseless, SeededNoise};
pub use profile::{AmbientProfile, StabilityClass, profile, profiles};
