//! Corridor fabric core types
//!
//! Pure types and logic with no I/O: identifiers, the error taxonomy shared
//! by every component, clocks, the enumerations that travel on the wire, and
//! the lifecycle phase machine common to corridors and memory bundles.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod model;
pub mod phase;
pub mod time;

// Re-exports
pub use error::{ErrorBody, ErrorCode, FabricError, FabricResult};
pub use id::{DeviceId, GrantId, PathId, ResourceId, TicketId};
pub use model::{
    DeviceClass, DeviceStatus, LatencyClass, PathType, Persistence, Priority, ResourceKind,
    TrustLevel,
};
pub use phase::Phase;
pub use time::{Clock, ManualClock, SharedClock, SystemClock, Timestamp};
