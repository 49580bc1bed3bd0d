//! Hardware capability traits
//!
//! The controller only reaches hardware through these traits. Concrete
//! adapters live in the drivers crate and the firmware; tests use fakes.

pub mod actuator;
pub mod signal;
pub mod telemetry;

pub use actuator::{ActuatorBus, ActuatorError};
pub use signal::{Channel, SignalError, SignalSource};
pub use telemetry::Telemetry;
