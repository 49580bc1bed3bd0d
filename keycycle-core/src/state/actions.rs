//! Tick inputs and side effects

use heapless::Vec;
use keycycle_protocol::Notice;

use crate::current::{CycleOutcome, PeakCurrents};

/// Inputs sampled once at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickInput {
    /// Monotonic milliseconds (wrapping)
    pub now_ms: u32,
    /// Emergency stop input is asserted
    pub estop_pressed: bool,
    /// The machine's active station is enabled
    pub active_enabled: bool,
    /// Number of enabled stations
    pub enabled_count: u8,
    /// Running peak currents of the cycle in progress
    pub peaks: PeakCurrents,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Command every station's actuator home
    HomeAll,
    /// Drive a station toward the engaged position
    Engage(u8),
    /// Drive a station toward home
    Home(u8),
    /// Re-measure zero-current offsets
    Calibrate,
    /// Zero the running peaks
    ResetPeaks,
    /// Take one current sample per channel
    Sample,
    /// Hand a finished cycle to the registry
    RecordCycle {
        station: u8,
        outcome: CycleOutcome,
        peaks: PeakCurrents,
    },
    /// Send an event to the host
    Notify(Notice),
    /// Send the running flag to the host
    ReportRunning,
}

/// Upper bound on actions from one transition
pub const MAX_ACTIONS: usize = 4;

/// Actions from one transition, in the order they must be applied
pub type Actions = Vec<Action, MAX_ACTIONS>;
