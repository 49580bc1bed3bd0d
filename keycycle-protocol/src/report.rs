//! Tester telemetry
//!
//! Reports are pushed to the host whenever something changes. They are
//! never acknowledged; a report that cannot be delivered is dropped.

use core::fmt::{self, Write};

use heapless::String;

use crate::notice::Notice;

/// Maximum encoded report length including the `\r\n` terminator
pub const MAX_REPORT_LEN: usize = 128;

/// One encoded report line
pub type ReportLine = String<MAX_REPORT_LEN>;

/// Outcome of one processed cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    pub station: u8,
    /// Enabled flag after the cycle was recorded
    pub enabled: bool,
    pub cycles: u32,
    pub failures: u16,
    /// Peak keyswitch current in amperes
    pub keyswitch_amps: f32,
    /// Peak starter current in amperes
    pub starter_amps: f32,
}

/// Current state of one station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StationReport {
    pub station: u8,
    pub enabled: bool,
    pub cycles: u32,
    pub failures: u16,
}

/// Any message sent from the tester to the host
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    /// `CYCLE:` line after each processed cycle
    Cycle(CycleReport),
    /// `EVENT:` line with human-readable text
    Event(Notice),
    /// `STATION:` line after any station change
    Station(StationReport),
    /// `SYSTEM_STATE:` line with the running flag
    System { running: bool },
}

impl Report {
    /// Encode the report into `out` (without terminator)
    pub fn encode<const N: usize>(&self, out: &mut String<N>) -> fmt::Result {
        write!(out, "{}", self)
    }

    /// Encode the report as a complete `\r\n`-terminated line
    ///
    /// Event texts that do not fit are truncated so the line still ends
    /// with its terminator.
    pub fn to_line(&self) -> ReportLine {
        let mut line = ReportLine::new();
        let mut body: String<{ MAX_REPORT_LEN - 2 }> = String::new();
        // On overflow the text written so far is kept
        let _ = self.encode(&mut body);
        // Body capacity leaves room for the terminator
        let _ = line.push_str(&body);
        let _ = line.push_str("\r\n");
        line
    }
}

impl From<Notice> for Report {
    fn from(notice: Notice) -> Self {
        Report::Event(notice)
    }
}

impl From<StationReport> for Report {
    fn from(report: StationReport) -> Self {
        Report::Station(report)
    }
}

impl From<CycleReport> for Report {
    fn from(report: CycleReport) -> Self {
        Report::Cycle(report)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Cycle(c) => write!(
                f,
                "CYCLE:{}:{}:{}:{}:{:.2}:{:.2}",
                c.station,
                c.enabled as u8,
                c.cycles,
                c.failures,
                c.keyswitch_amps,
                c.starter_amps
            ),
            Report::Event(notice) => write!(f, "EVENT:{}", notice),
            Report::Station(s) => write!(
                f,
                "STATION:{}:{}:{}:{}",
                s.station, s.enabled as u8, s.cycles, s.failures
            ),
            Report::System { running } => write!(f, "SYSTEM_STATE:{}", *running as u8),
        }
    }
}
