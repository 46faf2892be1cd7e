//! Corridor fabric control plane server
//!
//! JSON/HTTP binding of the fabric operations: corridor and memory bundle
//! admission, telemetry and adjustment, attestation, calibration, fabric
//! inventory maintenance and the readiness query used by schedulers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use api::{ApiServer, ServerConfig};
pub use config::{BaselineSeed, FabricConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
