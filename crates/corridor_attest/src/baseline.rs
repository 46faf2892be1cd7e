//! Known-good measurement baselines.

use corridor_core::{FabricError, FabricResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 of `bytes`, hex-encoded
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether `hash` looks like a real measurement.
///
/// 64 lowercase or uppercase hex characters, not all zeros.
#[must_use]
pub fn is_well_formed(hash: &str) -> bool {
    hash.len() == DIGEST_HEX_LEN
        && hash.bytes().all(|b| b.is_ascii_hexdigit())
        && hash.bytes().any(|b| b != b'0')
}

/// Known-good firmware and configuration digests for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// Expected firmware digest
    pub firmware_hash: String,
    /// Expected configuration digest
    pub config_hash: String,
}

impl Baseline {
    /// Create a baseline from precomputed digests
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either digest is malformed
    pub fn new(firmware_hash: impl Into<String>, config_hash: impl Into<String>) -> FabricResult<Self> {
        let firmware_hash = firmware_hash.into().to_ascii_lowercase();
        let config_hash = config_hash.into().to_ascii_lowercase();
        if !is_well_formed(&firmware_hash) {
            return Err(FabricError::invalid("firmware_hash", "expected a non-zero SHA-256 hex digest"));
        }
        if !is_well_formed(&config_hash) {
            return Err(FabricError::invalid("config_hash", "expected a non-zero SHA-256 hex digest"));
        }
        Ok(Self {
            firmware_hash,
            config_hash,
        })
    }

    /// Baseline measured from raw firmware and config images
    #[must_use]
    pub fn from_images(firmware: &[u8], config: &[u8]) -> Self {
        Self {
            firmware_hash: digest(firmware),
            config_hash: digest(config),
        }
    }

    /// Whether a claimed firmware digest validates
    #[must_use]
    pub fn firmware_matches(&self, claimed: &str) -> bool {
        is_well_formed(claimed) && claimed.eq_ignore_ascii_case(&self.firmware_hash)
    }

    /// Whether a claimed config digest validates
    #[must_use]
    pub fn config_matches(&self, claimed: &str) -> bool {
        is_well_formed(claimed) && claimed.eq_ignore_ascii_case(&self.config_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_value() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&digest(b"fw")));
        assert!(!is_well_formed(&"0".repeat(64)));
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed(&"g".repeat(64)));
    }

    #[test]
    fn test_baseline_matching() {
        let baseline = Baseline::from_images(b"fw-1.2.3", b"cfg-a");
        assert!(baseline.firmware_matches(&digest(b"fw-1.2.3")));
        assert!(baseline.firmware_matches(&digest(b"fw-1.2.3").to_uppercase()));
        assert!(!baseline.firmware_matches(&digest(b"fw-1.2.4")));
        assert!(baseline.config_matches(&digest(b"cfg-a")));
    }

    #[test]
    fn test_new_rejects_zero_digest() {
        let err = Baseline::new("0".repeat(64), digest(b"cfg")).unwrap_err();
        assert_eq!(err.code(), corridor_core::ErrorCode::InvalidArgument);
    }
}
