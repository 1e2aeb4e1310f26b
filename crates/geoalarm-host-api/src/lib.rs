//! Host adapter trait interfaces for geoalarm
//!
//! This crate defines the capability-based interface between the core and
//! platform integrations: where positions come from and how a ringing zone
//! is made audible and visible. It contains no platform code itself.

mod mock;
mod playback;
mod refresh;
mod sink;
mod traits;

pub use mock::*;
pub use playback::*;
pub use refresh::*;
pub use sink::*;
pub use traits::*;
