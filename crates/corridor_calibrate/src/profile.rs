//! Ambient profiles.

use corridor_core::{FabricError, FabricResult};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Qualitative stability of an environment, reported only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityClass {
    /// Lab or well-controlled machine room
    Excellent,
    /// Mild field conditions
    Good,
    /// Harsh field conditions
    Fair,
}

/// Environmental conditions that scale calibration outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientProfile {
    /// Catalogue key (`lab_default`, ...)
    pub key: String,
    /// Display name
    pub name: String,
    /// Reference temperature
    pub temperature_c: f64,
    /// Relative humidity
    pub humidity_percent: f64,
    /// Vibration RMS amplitude
    pub vibration_rms_um: f64,
    /// EMI noise floor
    pub emi_noise_db: f64,
    /// Wavelength drift rate
    pub drift_rate_nm_per_hour: f64,
    /// Stability class
    pub stability_class: StabilityClass,
}

impl AmbientProfile {
    #[allow(clippy::too_many_arguments)]
    fn builtin(
        key: &str,
        name: &str,
        temperature_c: f64,
        humidity_percent: f64,
        vibration_rms_um: f64,
        emi_noise_db: f64,
        drift_rate_nm_per_hour: f64,
        stability_class: StabilityClass,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            temperature_c,
            humidity_percent,
            vibration_rms_um,
            emi_noise_db,
            drift_rate_nm_per_hour,
            stability_class,
        }
    }
}

static CATALOG: Lazy<IndexMap<String, AmbientProfile>> = Lazy::new(|| {
    [
        AmbientProfile::builtin("lab_default", "Laboratory Default", 22.0, 45.0, 0.1, -80.0, 0.001, StabilityClass::Excellent),
        AmbientProfile::builtin("field_noise_low", "Field Low Noise", 25.0, 60.0, 1.0, -70.0, 0.01, StabilityClass::Good),
        AmbientProfile::builtin("field_noise_high", "Field High Noise", 30.0, 80.0, 5.0, -60.0, 0.1, StabilityClass::Fair),
        AmbientProfile::builtin("datacenter", "Data Center", 24.0, 50.0, 0.5, -75.0, 0.005, StabilityClass::Excellent),
    ]
    .into_iter()
    .map(|p| (p.key.clone(), p))
    .collect()
});

/// Profile used when a request does not name one
pub const DEFAULT_PROFILE: &str = "lab_default";

/// Look up a profile by key
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown key
pub fn profile(key: &str) -> FabricResult<&'static AmbientProfile> {
    CATALOG.get(key).ok_or_else(|| {
        FabricError::invalid(
            "ambient_profile",
            format!("unknown ambient profile '{key}'"),
        )
    })
}

/// All profiles, in catalogue order
#[must_use]
pub fn profiles() -> Vec<&'static AmbientProfile> {
    CATALOG.values().collect()
}
