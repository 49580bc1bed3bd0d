//! Station registry
//!
//! The registry is the only owner of per-station counters and enable
//! flags. Every change is written through to the durable store and
//! reported to the host.

pub mod registry;

pub use registry::{RegistryError, Station, StationRegistry};
