//! Verifier configuration.

use serde::{Deserialize, Serialize};

/// Attestation verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestConfig {
    /// Ticket lifetime in milliseconds
    pub ticket_ttl_ms: u64,
    /// Hex-encoded Ed25519 secret; a random key is generated when absent
    pub signing_key_hex: Option<String>,
}

impl AttestConfig {
    /// Default ticket lifetime (24 hours)
    pub const DEFAULT_TICKET_TTL_MS: u64 = 24 * 60 * 60 * 1000;

    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticket_ttl_ms: Self::DEFAULT_TICKET_TTL_MS,
            signing_key_hex: None,
        }
    }

    /// Set ticket lifetime
    #[must_use]
    pub fn with_ticket_ttl(mut self, ttl_ms: u64) -> Self {
        self.ticket_ttl_ms = ttl_ms;
        self
    }

    /// Sign with a fixed key
    #[must_use]
    pub fn with_signing_key(mut self, secret_hex: impl Into<String>) -> Self {
        self.signing_key_hex = Some(secret_hex.into());
        self
    }
}

impl Default for AttestConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AttestConfig::default();
        assert_eq!(config.ticket_ttl_ms, 86_400_000);
        assert!(config.signing_key_hex.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AttestConfig = serde_json::from_str(r#"{"ticket_ttl_ms": 5000}"#).unwrap();
        assert_eq!(config.ticket_ttl_ms, 5000);
        assert!(config.signing_key_hex.is_none());
    }
}
