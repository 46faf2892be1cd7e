//! Named QoS policies.

use crate::path::QosConfig;
use corridor_core::{FabricError, FabricResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What a policy binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMatch {
    /// A device
    Device,
    /// A path
    Path,
}

impl FromStr for PolicyMatch {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device" => Ok(Self::Device),
            "path" => Ok(Self::Path),
            other => Err(FabricError::invalid(
                "match",
                format!("must be 'device' or 'path', got '{other}'"),
            )),
        }
    }
}

/// Policy submission; `match` is validated on insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Unique name
    pub name: String,
    /// `device` or `path`
    #[serde(rename = "match")]
    pub match_kind: String,
    /// Device or path id
    pub target_id: String,
    /// QoS to apply
    #[serde(default)]
    pub qos: QosConfig,
    /// Whether the policy is applied
    #[serde(default)]
    pub enabled: bool,
}

impl PolicyRequest {
    /// Validate into a policy stamped at `now`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is empty or `match` is not
    /// `device`/`path`
    pub fn validate(self, now: Timestamp) -> FabricResult<Policy> {
        if self.name.trim().is_empty() {
            return Err(FabricError::invalid("name", "policy name required"));
        }
        let target = self.match_kind.parse()?;
        Ok(Policy {
            name: self.name,
            target,
            target_id: self.target_id,
            qos: self.qos,
            enabled: self.enabled,
            created_at: now,
        })
    }
}

/// A named rule binding QoS to one device or one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique name
    pub name: String,
    /// Target kind
    #[serde(rename = "match")]
    pub target: PolicyMatch,
    /// Device or path id
    pub target_id: String,
    /// QoS
    pub qos: QosConfig,
    /// Whether the policy is applied
    pub enabled: bool,
    /// Insertion time
    pub created_at: Timestamp,
}
