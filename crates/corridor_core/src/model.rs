//! Enumerations shared across the fabric and its wire format.
//!
//! Every enum parses from (and renders to) the exact strings used on the
//! wire. Parsing an unknown value is an `InvalidArgument`.

use crate::error::FabricError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

macro_rules! wire_enum {
    ($name:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// Wire representation
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = FabricError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(FabricError::invalid(
                        $field,
                        format!("unsupported value '{other}'"),
                    )),
                }
            }
        }
    };
}

/// Device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Optical transport endpoint with wavelength lanes
    #[serde(rename = "corridor-class")]
    Corridor,
    /// Pooled memory endpoint
    #[serde(rename = "memory-class")]
    Memory,
}

wire_enum!(DeviceClass, "device class", {
    Corridor => "corridor-class",
    Memory => "memory-class",
});

/// Operational status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// In service
    Active,
    /// Drained for maintenance; no new admissions
    Maintenance,
    /// Gone; dependent allocations take the device-drop path
    Disabled,
}

wire_enum!(DeviceStatus, "status", {
    Active => "active",
    Maintenance => "maintenance",
    Disabled => "disabled",
});

impl DeviceStatus {
    /// Whether new grants may land on the device
    #[must_use]
    pub const fn accepts_admission(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Memory latency class, fastest to slowest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LatencyClass {
    /// Fastest tier
    T0,
    /// Second tier
    T1,
    /// Third tier
    T2,
    /// Slowest tier
    T3,
}

wire_enum!(LatencyClass, "latency class", {
    T0 => "T0",
    T1 => "T1",
    T2 => "T2",
    T3 => "T3",
});

impl LatencyClass {
    /// All classes, fastest first
    pub const ALL: [LatencyClass; 4] = [Self::T0, Self::T1, Self::T2, Self::T3];

    /// Position in the tier order (0 = fastest)
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::T0 => 0,
            Self::T1 => 1,
            Self::T2 => 2,
            Self::T3 => 3,
        }
    }

    /// Tier distance, used to prefer the nearest tier on failover
    #[must_use]
    pub const fn distance(&self, other: LatencyClass) -> u8 {
        self.rank().abs_diff(other.rank())
    }
}

/// Attestation trust level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Both hashes valid and a signature was produced
    High,
    /// Both hashes valid
    Medium,
    /// Exactly one hash valid
    Low,
    /// Neither hash valid
    Untrusted,
}

wire_enum!(TrustLevel, "trust level", {
    High => "high",
    Medium => "medium",
    Low => "low",
    Untrusted => "untrusted",
});

impl TrustLevel {
    /// Derive the trust level from which claims validated
    #[must_use]
    pub const fn derive(firmware_valid: bool, config_valid: bool, signed: bool) -> Self {
        match (firmware_valid, config_valid) {
            (true, true) if signed => Self::High,
            (true, true) => Self::Medium,
            (true, false) | (false, true) => Self::Low,
            (false, false) => Self::Untrusted,
        }
    }

    /// Numeric strength (higher is stronger)
    #[must_use]
    pub const fn strength(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Untrusted => 0,
        }
    }
}

/// QoS priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Highest priority
    Gold,
    /// Default priority
    #[default]
    Silver,
    /// Best-effort priority
    Bronze,
}

wire_enum!(Priority, "priority", {
    Gold => "gold",
    Silver => "silver",
    Bronze => "bronze",
});

/// Kind of fabric path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathType {
    /// Port-based routing
    #[serde(rename = "PBR")]
    Pbr,
    /// Global integrated memory
    #[serde(rename = "GIM")]
    Gim,
    /// Point to point
    #[serde(rename = "Direct")]
    Direct,
}

wire_enum!(PathType, "path type", {
    Pbr => "PBR",
    Gim => "GIM",
    Direct => "Direct",
});

/// Memory bundle persistence mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    /// Contents lost on release
    #[default]
    None,
    /// Contents survive host restarts
    Persistent,
}

wire_enum!(Persistence, "persistence", {
    None => "none",
    Persistent => "persistent",
});

/// Kind of fabric resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Optical corridor
    Corridor,
    /// Pooled memory bundle
    MemoryBundle,
}

wire_enum!(ResourceKind, "resource kind", {
    Corridor => "corridor",
    MemoryBundle => "memory_bundle",
});

impl ResourceKind {
    /// Prefix used for generated identifiers
    #[must_use]
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            Self::Corridor => "cor",
            Self::MemoryBundle => "ffm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_device_status_parse() {
        assert_eq!("active".parse::<DeviceStatus>().unwrap(), DeviceStatus::Active);
        assert_eq!("disabled".parse::<DeviceStatus>().unwrap(), DeviceStatus::Disabled);

        let err = "retired".parse::<DeviceStatus>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_path_type_parse() {
        assert_eq!("PBR".parse::<PathType>().unwrap(), PathType::Pbr);
        assert_eq!("Direct".parse::<PathType>().unwrap(), PathType::Direct);
        assert!("direct".parse::<PathType>().is_err());
    }

    #[test]
    fn test_trust_level_derivation() {
        assert_eq!(TrustLevel::derive(true, true, true), TrustLevel::High);
        assert_eq!(TrustLevel::derive(true, true, false), TrustLevel::Medium);
        assert_eq!(TrustLevel::derive(true, false, true), TrustLevel::Low);
        assert_eq!(TrustLevel::derive(false, true, false), TrustLevel::Low);
        assert_eq!(TrustLevel::derive(false, false, true), TrustLevel::Untrusted);
    }

    #[test]
    fn test_latency_class_distance() {
        assert_eq!(LatencyClass::T0.distance(LatencyClass::T3), 3);
        assert_eq!(LatencyClass::T2.distance(LatencyClass::T1), 1);
        assert!(LatencyClass::T0 < LatencyClass::T1);
    }

    #[test]
    fn test_serde_matches_wire_strings() {
        let json = serde_json::to_string(&DeviceClass::Memory).unwrap();
        assert_eq!(json, "\"memory-class\"");
        assert_eq!(DeviceClass::Memory.as_str(), "memory-class");

        let json = serde_json::to_string(&PathType::Gim).unwrap();
        assert_eq!(json, "\"GIM\"");
    }
}
