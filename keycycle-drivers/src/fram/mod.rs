//! Ferroelectric RAM devices

pub mod mb85rs;

pub use mb85rs::{DeviceId, FramError, Mb85rs};
