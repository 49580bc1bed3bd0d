//! Inter-task communication channels
//!
//! Host lines flow from the receive task to the control task; reports flow
//! from the control task to the transmit task. Both use embassy-sync
//! channels behind a critical-section mutex.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use keycycle_protocol::{Line, LineError, ReportLine};

/// Channel capacity for received host lines
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Channel capacity for outgoing reports
///
/// Boot and `REQUEST_STATE` produce a burst of one report per station plus
/// a few notices.
const TELEMETRY_CHANNEL_SIZE: usize = 16;

/// Lines received from the host, or why a line was discarded
pub static COMMAND_CHANNEL: Channel<
    CriticalSectionRawMutex,
    Result<Line, LineError>,
    COMMAND_CHANNEL_SIZE,
> = Channel::new();

/// Encoded report lines waiting for the host UART
pub static TELEMETRY_CHANNEL: Channel<CriticalSectionRawMutex, ReportLine, TELEMETRY_CHANNEL_SIZE> =
    Channel::new();
