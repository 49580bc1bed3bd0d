//! Host-side fakes for the capability traits

use std::vec;
use std::vec::Vec;

use keycycle_hal::{NvMemory, NvmError};
use keycycle_protocol::{CycleReport, Notice, Report, StationReport};

use crate::traits::{ActuatorBus, ActuatorError, Channel, SignalError, SignalSource, Telemetry};

/// RAM-backed byte store with fault injection
pub struct RamMemory {
    data: Vec<u8>,
    fail_writes: bool,
    failing_writes: usize,
    drop_writes: bool,
}

impl RamMemory {
    /// Blank device, erased to zero
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            fail_writes: false,
            failing_writes: 0,
            drop_writes: false,
        }
    }

    /// Writes return a bus error
    pub fn fail_writes(&mut self, on: bool) {
        self.fail_writes = on;
    }

    /// The next `count` writes return a bus error, later ones succeed
    pub fn fail_next_writes(&mut self, count: usize) {
        self.failing_writes = count;
    }

    /// Writes report success but change nothing
    pub fn drop_writes(&mut self, on: bool) {
        self.drop_writes = on;
    }

    /// Write bytes directly, bypassing fault injection
    pub fn poke(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let start = address as usize;
        self.data[start..start + len].to_vec()
    }
}

impl NvMemory for RamMemory {
    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), NvmError> {
        self.check_range(address, buffer.len())?;
        let start = address as usize;
        buffer.copy_from_slice(&self.data[start..start + buffer.len()]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), NvmError> {
        self.check_range(address, data.len())?;
        if self.fail_writes {
            return Err(NvmError::Bus);
        }
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(NvmError::Bus);
        }
        if !self.drop_writes {
            self.poke(address, data);
        }
        Ok(())
    }
}

/// Signal source returning fixed raw values per channel
pub struct ScriptedSignal {
    keyswitch: u16,
    starter: u16,
    failing: Option<Channel>,
}

impl ScriptedSignal {
    pub fn constant(keyswitch: u16, starter: u16) -> Self {
        Self {
            keyswitch,
            starter,
            failing: None,
        }
    }

    pub fn set(&mut self, keyswitch: u16, starter: u16) {
        self.keyswitch = keyswitch;
        self.starter = starter;
    }

    /// Make every read of `channel` fail
    pub fn fail(&mut self, channel: Channel) {
        self.failing = Some(channel);
    }

    pub fn heal(&mut self) {
        self.failing = None;
    }
}

impl SignalSource for ScriptedSignal {
    fn read_raw(&mut self, channel: Channel) -> Result<u16, SignalError> {
        if self.failing == Some(channel) {
            return Err(SignalError::Conversion);
        }
        Ok(match channel {
            Channel::Keyswitch => self.keyswitch,
            Channel::Starter => self.starter,
        })
    }
}

/// One command seen by [`RecordingActuators`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Position { station: u8, degrees: f32 },
    Current { station: u8, percent: f32 },
}

/// Actuator bus that records every command
#[derive(Default)]
pub struct RecordingActuators {
    pub calls: Vec<ActuatorCall>,
}

impl RecordingActuators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position commands only
    pub fn positions(&self) -> Vec<(u8, f32)> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                ActuatorCall::Position { station, degrees } => Some((station, degrees)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ActuatorBus for RecordingActuators {
    fn set_goal_position(&mut self, station: u8, degrees: f32) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Position { station, degrees });
        Ok(())
    }

    fn set_goal_current(&mut self, station: u8, percent: f32) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Current { station, percent });
        Ok(())
    }
}

/// Telemetry sink that keeps every report
#[derive(Default)]
pub struct RecordingTelemetry {
    pub reports: Vec<Report>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.reports
            .iter()
            .filter_map(|r| match r {
                Report::Event(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_notice(&self, notice: &Notice) -> bool {
        self.notices().iter().any(|n| n == notice)
    }

    pub fn error_count(&self) -> usize {
        self.notices().iter().filter(|n| n.is_error()).count()
    }

    pub fn station_reports(&self) -> Vec<StationReport> {
        self.reports
            .iter()
            .filter_map(|r| match r {
                Report::Station(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn cycle_reports(&self) -> Vec<CycleReport> {
        self.reports
            .iter()
            .filter_map(|r| match r {
                Report::Cycle(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl Telemetry for RecordingTelemetry {
    fn send(&mut self, report: Report) {
        self.reports.push(report);
    }
}
