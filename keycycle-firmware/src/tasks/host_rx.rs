//! Host UART receive task
//!
//! Assembles command lines from the host link and hands them to the
//! control task.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use keycycle_protocol::{Line, LineBuffer, LineError};

use crate::channels::COMMAND_CHANNEL;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Host RX task - splits received bytes into lines
#[embassy_executor::task]
pub async fn host_rx_task(mut rx: BufferedUartRx) {
    info!("Host RX task started");

    let mut lines = LineBuffer::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);

                for &byte in &buf[..n] {
                    if let Some(result) = lines.push(byte) {
                        forward(result).await;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
                // Whatever was buffered may be missing bytes
                lines.reset();
            }
        }
    }
}

/// Queue a line (or the reason it was discarded) for the control task
async fn forward(result: Result<Line, LineError>) {
    match &result {
        Ok(line) => debug!("Host line: {=str}", line.as_str()),
        Err(e) => debug!("Host line discarded: {:?}", e),
    }
    // The control task drains the queue every tick
    COMMAND_CHANNEL.send(result).await;
}
