//! Host Communication Protocol
//!
//! This crate defines the line-oriented text protocol between the tester
//! (RP2040) and the supervising host (a Raspberry Pi GUI or a terminal).
//! Every message is one ASCII line.
//!
//! # Host → Tester
//!
//! ```text
//! START | STOP | REQUEST_STATE
//! ENABLE:<n> | DISABLE:<n> | RESET_CYCLE:<n> | RESET_FAIL:<n>
//! STATE:<c0>:<f0>:<c1>:<f1>:...
//! ```
//!
//! # Tester → Host
//!
//! ```text
//! CYCLE:<station>:<enabled>:<cycles>:<failures>:<keyswitch A>:<starter A>
//! STATION:<station>:<enabled>:<cycles>:<failures>
//! SYSTEM_STATE:<running>
//! EVENT:<human readable text>
//! ```
//!
//! Commands are case-sensitive. Telemetry is fire-and-forget: nothing is
//! acknowledged or retried.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod command;
pub mod line;
pub mod notice;
pub mod report;

pub use command::{Command, CommandError, StateValues};
pub use line::{Line, LineBuffer, LineError, MAX_LINE_LEN};
pub use notice::{Echo, Notice};
pub use report::{CycleReport, Report, ReportLine, StationReport};

/// Maximum number of stations the protocol can describe
pub const MAX_STATIONS: usize = 8;

/// Maximum number of integers in a `STATE:` command (cycles + failures)
pub const MAX_STATE_VALUES: usize = MAX_STATIONS * 2;
