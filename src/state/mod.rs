//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `Coordinate`: the (volume, section, page) address of one page
//! - `StopReason`: why the traversal engine stopped by itself
//! - `RunStatus`: the persisted status of a harvest run

mod coordinate;
mod run_status;

// Re-export main types
pub use coordinate::{Coordinate, CoordinateError};
pub use run_status::{RunStatus, StopReason};
