//! Shared types for geoalarm
//!
//! This crate defines the data that flows between the evaluator, the zone
//! store, the alert sink and clients of the daemon:
//! - Zones and their derived state
//! - Position samples and trigger events
//! - The NDJSON event stream envelope
//! - Versioning

mod events;
mod types;

pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
