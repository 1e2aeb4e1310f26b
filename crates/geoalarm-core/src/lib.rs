//! Geofence evaluation and zone engine for geoalarmd
//!
//! This crate contains:
//! - Haversine geometry on a spherical Earth
//! - The pure geofence evaluator (position + zones -> updated zones + events)
//! - Position sample gating (staleness and cadence)
//! - The zone engine: load-modify-save operations over the zone store

mod alerts;
mod engine;
mod evaluator;
mod events;
pub mod geo;
mod sampling;

pub use alerts::*;
pub use engine::*;
pub use evaluator::*;
pub use events::*;
pub use sampling::*;
