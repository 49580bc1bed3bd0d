//! Safety inputs
//!
//! The emergency stop pre-empts everything else in a tick.

pub mod estop;

pub use estop::EmergencyStop;
