//! Ed25519 signing of attestation tickets.

use corridor_core::FabricError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Detached signature over a ticket's canonical body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSignature {
    /// Hex-encoded public key of the signer
    pub key: String,
    /// Hex-encoded signature bytes
    pub bytes: String,
}

impl TicketSignature {
    /// Short form for the wire (`ed25519:<first 16 hex chars>`)
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let end = self.bytes.len().min(16);
        format!("ed25519:{}", &self.bytes[..end])
    }
}

/// Key pair used by the verifier to sign tickets it issues
pub struct TicketSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TicketSigner {
    /// Signer with a fresh random key
    #[must_use]
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::from_bytes(&secret)
    }

    fn from_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Signer from a hex-encoded 32-byte secret
    ///
    /// # Errors
    ///
    /// Returns error if the secret is not 32 bytes of valid hex
    pub fn from_secret_hex(secret: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(secret).map_err(|_| SignatureError::InvalidHex)?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidSecretKey)?;
        Ok(Self::from_bytes(&secret))
    }

    /// Hex-encoded public key
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.to_bytes())
    }

    /// Sign a ticket body
    #[must_use]
    pub fn sign(&self, body: &[u8]) -> TicketSignature {
        let sig = self.signing_key.sign(body);
        TicketSignature {
            key: self.public_key_hex(),
            bytes: hex::encode(sig.to_bytes()),
        }
    }

    /// Check a signature produced by this signer
    ///
    /// # Errors
    ///
    /// Returns error if the signature was made with another key or does not
    /// match the body
    pub fn verify(&self, body: &[u8], signature: &TicketSignature) -> Result<(), SignatureError> {
        if signature.key != self.public_key_hex() {
            return Err(SignatureError::ForeignKey);
        }
        let raw = hex::decode(&signature.bytes).map_err(|_| SignatureError::InvalidHex)?;
        let sig = Signature::from_slice(&raw).map_err(|_| SignatureError::InvalidSignature)?;
        self.verifying_key
            .verify(body, &sig)
            .map_err(|_| SignatureError::VerificationFailed)
    }
}

impl std::fmt::Debug for TicketSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketSigner")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Signature-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Invalid secret key
    #[error("invalid secret key")]
    InvalidSecretKey,
    /// Invalid hex encoding
    #[error("invalid hex encoding")]
    InvalidHex,
    /// Malformed signature bytes
    #[error("invalid signature")]
    InvalidSignature,
    /// Signed by a key this verifier does not hold
    #[error("signed by a foreign key")]
    ForeignKey,
    /// Verification failed
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for FabricError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidSecretKey | SignatureError::InvalidHex => {
                FabricError::invalid("signing key", err.to_string())
            }
            other => FabricError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = TicketSigner::generate();
        let sig = signer.sign(b"attest-1|cxl-dev-001");
        assert!(signer.verify(b"attest-1|cxl-dev-001", &sig).is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let signer = TicketSigner::generate();
        let sig = signer.sign(b"attest-1|cxl-dev-001");
        assert_eq!(
            signer.verify(b"attest-1|cxl-dev-002", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn test_foreign_key_rejected() {
        let a = TicketSigner::generate();
        let b = TicketSigner::generate();
        let sig = a.sign(b"body");
        assert_eq!(b.verify(b"body", &sig), Err(SignatureError::ForeignKey));
    }

    #[test]
    fn test_from_secret_hex_is_stable() {
        let secret = "11".repeat(32);
        let a = TicketSigner::from_secret_hex(&secret).unwrap();
        let b = TicketSigner::from_secret_hex(&secret).unwrap();
        assert_eq!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn test_from_secret_hex_rejects_bad_input() {
        assert_eq!(
            TicketSigner::from_secret_hex("abcd").unwrap_err(),
            SignatureError::InvalidSecretKey
        );
        assert_eq!(
            TicketSigner::from_secret_hex("zz").unwrap_err(),
            SignatureError::InvalidHex
        );
    }

    #[test]
    fn test_fingerprint() {
        let signer = TicketSigner::generate();
        let sig = signer.sign(b"body");
        let fp = sig.fingerprint();
        assert!(fp.starts_with("ed25519:"));
        assert_eq!(fp.len(), "ed25519:".len() + 16);
    }
}
