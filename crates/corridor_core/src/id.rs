//! Identifiers for fabric entities.
//!
//! Devices are named by the inventory (`cxl-dev-001`), everything the fabric
//! creates gets a prefixed identifier (`cor-…`, `ffm-…`, `path-0001`,
//! `attest-7`). All IDs serialize as plain strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as str
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Device identifier - a fabric endpoint known to the inventory
    DeviceId
);

string_id!(
    /// Path identifier - a fabric path between two devices
    PathId
);

string_id!(
    /// Ticket identifier - an issued attestation ticket
    TicketId
);

string_id!(
    /// Resource identifier - a corridor or memory bundle handle
    ResourceId
);

string_id!(
    /// Grant identifier - the allocator's key for a pool share
    GrantId
);

impl PathId {
    /// Sequential path id (`path-0001`)
    #[must_use]
    pub fn sequential(n: u64) -> Self {
        Self(format!("path-{n:04}"))
    }
}

impl TicketId {
    /// Sequential ticket id (`attest-1`)
    #[must_use]
    pub fn sequential(n: u64) -> Self {
        Self(format!("attest-{n}"))
    }
}

impl ResourceId {
    /// Generate a fresh identifier with the given prefix (`cor`, `ffm`)
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &uuid[..12]))
    }
}

impl GrantId {
    /// Grant held by a resource for a given generation.
    ///
    /// Generation 0 is the admission grant; migrations and failovers bump it.
    #[must_use]
    pub fn for_resource(resource: &ResourceId, generation: u32) -> Self {
        Self(format!("{resource}#{generation}"))
    }
}
