//! geoalarmd service internals
//!
//! The binary in `main.rs` parses arguments and wires these together; they
//! live in a library so the end-to-end tests can drive the service loop
//! with mock adapters.

pub mod host;
pub mod service;

pub use service::Service;
