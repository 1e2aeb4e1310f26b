//! Shared utilities for geoalarm
//!
//! This crate provides:
//! - ID types (ZoneId)
//! - Time utilities (mockable wall clock, duration formatting)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
