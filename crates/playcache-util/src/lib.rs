//! Shared utilities for playcache
//!
//! This crate provides:
//! - ID types (OwnerId, RecordId, ClientId)
//! - Time utilities (wall-clock now, per-device logical clock)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
