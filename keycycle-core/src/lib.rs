//! Board-agnostic control logic for the keyswitch endurance tester
//!
//! Everything that does not touch a register lives here:
//!
//! - Capability traits for the signal source, actuator bus and telemetry
//! - Current classifier (calibration, peak tracking, pass/fail)
//! - Station registry (counters, enable flags, auto-disable)
//! - Durable state store (record table on byte-addressable memory)
//! - Cycle state machine and the controller that drives it
//! - Emergency stop input handling
//! - Tester configuration

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod controller;
pub mod current;
pub mod safety;
pub mod state;
pub mod station;
pub mod store;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::Controller;
pub use keycycle_protocol::MAX_STATIONS;
