//! Device drivers
//!
//! Concrete implementations of the capability traits from keycycle-hal and
//! keycycle-core for the tester's peripherals:
//!
//! - SPI FRAM (MB85RS family) as the durable store's [`NvMemory`]
//! - Dynamixel protocol 2.0 servo bus as the station [`ActuatorBus`]
//!
//! [`NvMemory`]: keycycle_hal::NvMemory
//! [`ActuatorBus`]: keycycle_core::traits::ActuatorBus

#![no_std]
#![deny(unsafe_code)]

pub mod fram;
pub mod servo;
