//! Corridor fabric inventory
//!
//! Tracks devices and the paths between them, their operational status, and
//! named QoS policies bound to a device or a path.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod inventory;
pub mod path;
pub mod policy;
pub mod probe;

pub use device::Device;
pub use inventory::{FabricInventory, StatusChange};
pub use path::{FabricPath, PathRequest, QosConfig};
pub use policy::{Policy, PolicyMatch, PolicyRequest};
pub use probe::{DeviceProbe, NullProbe, StaticProbe};
