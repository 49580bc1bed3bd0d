//! Station servo buses

pub mod dynamixel;

pub use dynamixel::{DynamixelBus, DynamixelConfig};
