//! Keycycle Hardware Abstraction Layer
//!
//! This crate defines the narrow hardware capabilities the tester core
//! depends on, so the same application code runs against real peripherals
//! on the RP2040 and against fakes on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  keycycle-core (registry, store, FSM)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  keycycle-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   keycycle-   │       │   keycycle-   │
//! │    drivers    │       │   firmware    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`nvm::NvMemory`] - Byte-addressable persistent memory
//! - [`gpio::InputPin`] - Digital input

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod nvm;

// Re-export key traits at crate root for convenience
pub use gpio::{ActiveLevel, InputPin};
pub use nvm::{NvMemory, NvmError};
