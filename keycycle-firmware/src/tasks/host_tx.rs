//! Host UART transmit task
//!
//! Writes encoded reports to the host link in the order they were queued.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::TELEMETRY_CHANNEL;

/// Host TX task - forwards report lines to the UART
#[embassy_executor::task]
pub async fn host_tx_task(mut tx: BufferedUartTx) {
    info!("Host TX task started");

    loop {
        let line = TELEMETRY_CHANNEL.receive().await;
        if let Err(e) = tx.write_all(line.as_bytes()).await {
            warn!("Failed to send report: {:?}", e);
        } else {
            trace!("TX: {=str}", line.as_str().trim_end());
        }
    }
}
