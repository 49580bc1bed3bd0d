//! Current acquisition and pass/fail classification
//!
//! Converts raw analog readings into calibrated currents, tracks the peak
//! of each channel across a cycle, and classifies the cycle once motion
//! has finished.

pub mod monitor;

pub use monitor::{classify, CurrentMonitor, CycleOutcome, PeakCurrents};
