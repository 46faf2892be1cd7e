//! Error taxonomy for the corridor fabric.
//!
//! Every error carries a stable machine-readable [`ErrorCode`] plus a
//! human-readable reason (its `Display`).

use crate::phase::Phase;
use serde::{Deserialize, Serialize};

/// Fabric result type
pub type FabricResult<T> = Result<T, FabricError>;

/// Stable, machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown device, path, resource, ticket or policy
    NotFound,
    /// Malformed argument or enum value
    InvalidArgument,
    /// Identifier already in use
    AlreadyExists,
    /// Request mandates attestation but carried no ticket
    AttestationRequired,
    /// Ticket expired, invalid, or bound to another device
    AttestationInvalid,
    /// Floor-mandatory request cannot be fully granted
    CapacityExceeded,
    /// Device dropped or path lost; retryable
    Unavailable,
    /// Calibration exhausted its iteration budget
    PartialConvergence,
    /// Request abandoned by the caller
    Cancelled,
    /// Phase machine rejected a transition
    InvalidTransition,
    /// Unexpected internal failure
    Internal,
}

impl ErrorCode {
    /// Wire representation of the code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::AttestationRequired => "ATTESTATION_REQUIRED",
            Self::AttestationInvalid => "ATTESTATION_INVALID",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::Unavailable => "UNAVAILABLE",
            Self::PartialConvergence => "PARTIAL_CONVERGENCE",
            Self::Cancelled => "CANCELLED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fabric error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FabricError {
    /// Not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of object looked up
        kind: String,
        /// Identifier that was not found
        id: String,
    },

    /// Invalid argument
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Already exists
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Kind of object
        kind: String,
        /// Conflicting identifier
        id: String,
    },

    /// Attestation required but no ticket presented
    #[error("attestation required for {resource}")]
    AttestationRequired {
        /// Resource that mandates attestation
        resource: String,
    },

    /// Ticket presented but unusable
    #[error("attestation ticket {ticket} rejected: {reason}")]
    AttestationInvalid {
        /// Ticket identifier
        ticket: String,
        /// Rejection reason
        reason: String,
    },

    /// Capacity exceeded
    #[error("capacity exceeded on {pool}: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Pool that could not satisfy the request
        pool: String,
        /// Amount requested
        requested: u64,
        /// Amount still free
        available: u64,
    },

    /// Device or path unavailable
    #[error("{target} unavailable: {reason}")]
    Unavailable {
        /// Device, path or resource that is gone
        target: String,
        /// Reason
        reason: String,
    },

    /// Calibration did not meet tolerance within budget
    #[error("calibration of {corridor} stopped after {iterations} iterations at BER {best_ber:e}")]
    PartialConvergence {
        /// Corridor being calibrated
        corridor: String,
        /// Iterations spent
        iterations: u32,
        /// Best bit-error-rate reached
        best_ber: f64,
    },

    /// Cancelled by caller
    #[error("request for {resource} was cancelled")]
    Cancelled {
        /// Resource whose request was abandoned
        resource: String,
    },

    /// Rejected phase transition
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: Phase,
        /// Requested phase
        to: Phase,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl FabricError {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::AttestationRequired { .. } => ErrorCode::AttestationRequired,
            Self::AttestationInvalid { .. } => ErrorCode::AttestationInvalid,
            Self::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::PartialConvergence { .. } => ErrorCode::PartialConvergence,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Only `Unavailable` is worth retrying with back-off
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Shorthand for [`FabricError::NotFound`]
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for [`FabricError::InvalidArgument`]
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`FabricError::Unavailable`]
    pub fn unavailable(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`FabricError::AttestationInvalid`]
    pub fn attestation_invalid(ticket: impl ToString, reason: impl Into<String>) -> Self {
        Self::AttestationInvalid {
            ticket: ticket.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FabricError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid("json", err.to_string())
    }
}

/// Wire shape of an error: `{"code": ..., "reason": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Human-readable reason
    pub reason: String,
}

impl From<&FabricError> for ErrorBody {
    fn from(err: &FabricError) -> Self {
        Self {
            code: err.code(),
            reason: err.to_string(),
        }
    }
}
