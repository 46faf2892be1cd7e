//! Corridor fabric admission allocator
//!
//! Pools are keyed by device and dimension (lanes, bandwidth, bytes).
//! Admission is first-come-first-served with a simplified dominant-share
//! rule: full grants when everything fits, partial best-effort grants
//! otherwise, and outright rejection for floor-mandatory requests that do
//! not fit. The allocator also tracks which grid wavelengths each grant holds
//! and remaps holders onto spares when a wavelength is lost.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod pool;
pub mod spectrum;

// Re-exports
pub use allocator::{Admission, AdmissionRequest, Allocator, LaneLoss, Resize};
pub use pool::{Demand, Dimension, Grant, Pool, PoolKey, PoolUsage, Share};
pub use spectrum::Spectrum;
