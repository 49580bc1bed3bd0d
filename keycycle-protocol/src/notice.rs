//! Human-readable tester events
//!
//! Every diagnostic the tester reports to the host is a [`Notice`]. The
//! typed value is what the firmware produces; its `Display` rendering is the
//! text carried by an `EVENT:` line.

use core::fmt;

use heapless::String;

/// Maximum length of echoed host input inside a notice
pub const MAX_ECHO_LEN: usize = 48;

/// Host-supplied text echoed back in an error notice (truncated)
pub type Echo = String<MAX_ECHO_LEN>;

/// Build an [`Echo`] from arbitrary text, truncating on a char boundary
pub fn echo(text: &str) -> Echo {
    let mut out = Echo::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Events reported to the host as `EVENT:` lines
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    // Run control
    /// START accepted
    SystemStarted,
    /// START while already running
    AlreadyRunning,
    /// START rejected because the emergency stop is pressed
    StartBlockedByEmergencyStop,
    /// STOP accepted
    SystemStopped,
    /// STOP while already stopped
    AlreadyStopped,
    /// Emergency stop input asserted
    EmergencyStopDetected,
    /// Emergency stop input released
    EmergencyStopCleared,

    // Station management
    /// Station enabled
    StationEnabled(u8),
    /// Station disabled
    StationDisabled(u8),
    /// Enable requested for an enabled station
    AlreadyEnabled(u8),
    /// Disable requested for a disabled station
    AlreadyDisabled(u8),
    /// Station index outside the configured range
    InvalidStation(u8),
    /// Station removed from rotation by the failure threshold
    AutoDisabled { station: u8, failures: u16 },
    /// Cycle counter reset
    CyclesReset(u8),
    /// Failure counter reset
    FailuresReset(u8),

    // Host input
    /// STATE payload applied
    StateLoaded,
    /// STATE payload had the wrong number of values
    IncompleteState { expected: u8, received: u8 },
    /// Line did not match any command
    UnrecognizedCommand(Echo),
    /// Command argument was not a valid number
    InvalidArgument(Echo),
    /// Received line exceeded the line buffer
    LineTooLong,
    /// Received line was not valid text
    InvalidText,

    // Durable store
    /// First boot: header and default records written
    StoreInitialized,
    /// Existing store found with a matching header
    StoreVerified,
    /// Stored format version differs from this firmware
    StoreVersionMismatch { found: u16, expected: u16 },
    /// Store has no header; nothing to load
    StoreNotInitialized,
    /// Record loaded but its counters look implausible
    SuspiciousRecord(u8),
    /// Record failed validation and was replaced by defaults
    InvalidRecord(u8),
    /// Records loaded from the store
    StationsLoaded,
    /// No record in the store was usable
    NoValidRecords,
    /// Device write or read failed while persisting a station
    StoreWriteFailed(u8),
    /// Read-back after a write did not match
    StoreVerifyFailed(u8),
    /// Store failed to initialize; running on in-memory defaults
    StoreUnavailable,
    /// Store reset to factory defaults
    StoreReset,
    /// Device self-test passed
    SelfTestPassed,
    /// Device self-test failed
    SelfTestFailed,

    // Current measurement
    /// Zero-current calibration could not read the sensor
    CalibrationFailed,
    /// A current sample could not be read
    CurrentReadFailed,
}

impl Notice {
    /// Check if this notice reports a rejected command or a fault
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::InvalidStation(_)
                | Notice::IncompleteState { .. }
                | Notice::UnrecognizedCommand(_)
                | Notice::InvalidArgument(_)
                | Notice::LineTooLong
                | Notice::InvalidText
                | Notice::StoreWriteFailed(_)
                | Notice::StoreVerifyFailed(_)
                | Notice::StoreUnavailable
                | Notice::SelfTestFailed
                | Notice::CalibrationFailed
                | Notice::CurrentReadFailed
        )
    }

    /// Check if this notice is an integrity warning from the store
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::StoreVersionMismatch { .. }
                | Notice::StoreNotInitialized
                | Notice::SuspiciousRecord(_)
                | Notice::InvalidRecord(_)
                | Notice::NoValidRecords
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SystemStarted => f.write_str("System started."),
            Notice::AlreadyRunning => f.write_str("System is already running."),
            Notice::StartBlockedByEmergencyStop => {
                f.write_str("Unable to start system. Emergency stop condition detected.")
            }
            Notice::SystemStopped => f.write_str("System stopped."),
            Notice::AlreadyStopped => f.write_str("System is already stopped."),
            Notice::EmergencyStopDetected => f.write_str("Emergency stop detected"),
            Notice::EmergencyStopCleared => f.write_str("Emergency stop condition cleared"),

            Notice::StationEnabled(s) => write!(f, "Station {} enabled", s),
            Notice::StationDisabled(s) => write!(f, "Station {} disabled", s),
            Notice::AlreadyEnabled(s) => write!(f, "Station {} is already enabled", s),
            Notice::AlreadyDisabled(s) => write!(f, "Station {} is already disabled", s),
            Notice::InvalidStation(s) => write!(f, "Invalid station index: {}", s),
            Notice::AutoDisabled { station, failures } => write!(
                f,
                "Station {} disabled after {} failures",
                station, failures
            ),
            Notice::CyclesReset(s) => write!(f, "Station {} cycle count reset to 0", s),
            Notice::FailuresReset(s) => write!(f, "Station {} failure count reset to 0", s),

            Notice::StateLoaded => f.write_str("Successfully loaded state data from host"),
            Notice::IncompleteState { expected, received } => write!(
                f,
                "Error: Incomplete state data received ({} of {} values)",
                received, expected
            ),
            Notice::UnrecognizedCommand(text) => {
                write!(f, "Error: Unrecognized command - {}", text)
            }
            Notice::InvalidArgument(text) => write!(f, "Error: Invalid argument - {}", text),
            Notice::LineTooLong => f.write_str("Error: Command line too long"),
            Notice::InvalidText => f.write_str("Error: Command is not valid text"),

            Notice::StoreInitialized => f.write_str("Initialized storage for the first time"),
            Notice::StoreVerified => f.write_str("Storage connection verified"),
            Notice::StoreVersionMismatch { found, expected } => write!(
                f,
                "Warning: Storage data version mismatch ({} != {}) - attempting to load anyway",
                found, expected
            ),
            Notice::StoreNotInitialized => {
                f.write_str("Error: Storage not initialized, cannot load states")
            }
            Notice::SuspiciousRecord(s) => {
                write!(f, "Warning: Station {} has suspicious counter values", s)
            }
            Notice::InvalidRecord(s) => write!(
                f,
                "Warning: Invalid data detected for station {}, using defaults",
                s
            ),
            Notice::StationsLoaded => f.write_str("Station states loaded successfully"),
            Notice::NoValidRecords => f.write_str("No valid station data found in storage"),
            Notice::StoreWriteFailed(s) => {
                write!(f, "Error: Storage write failed for station {}", s)
            }
            Notice::StoreVerifyFailed(s) => {
                write!(f, "Error: Storage verification failed for station {}", s)
            }
            Notice::StoreUnavailable => {
                f.write_str("Error: Storage unavailable, running on defaults")
            }
            Notice::StoreReset => f.write_str("Storage reset complete"),
            Notice::SelfTestPassed => f.write_str("Storage test passed successfully"),
            Notice::SelfTestFailed => f.write_str("Storage test failed! Write/read mismatch"),

            Notice::CalibrationFailed => f.write_str("Error: Current sensor calibration failed"),
            Notice::CurrentReadFailed => f.write_str("Error: Current sensor read failed"),
        }
    }
}
