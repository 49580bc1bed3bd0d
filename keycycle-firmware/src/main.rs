//! Keycycle - Keyswitch Endurance Tester Firmware
//!
//! Main firmware binary for RP2040-based tester boards. Turns each
//! station's ignition key through start and back with a Dynamixel servo,
//! watches the keyswitch and starter current, and keeps per-station
//! counters in SPI FRAM so a power cut loses at most one cycle.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart, UartTx};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use keycycle_core::safety::EmergencyStop;
use keycycle_drivers::fram::Mb85rs;
use keycycle_drivers::servo::{DynamixelBus, DynamixelConfig};
use keycycle_hal::ActiveLevel;

use crate::board::{AdcSignal, ChipSelectSpi, EstopPin, FramStore, ServoPort};
use crate::config::load_config;

mod board;
mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

/// Host link baud rate
const HOST_BAUD: u32 = 115_200;

/// Dynamixel factory default baud rate
const SERVO_BAUD: u32 = 57_600;

/// FRAM SPI clock (MB85RS parts run up to 25 MHz or more)
const FRAM_SPI_HZ: u32 = 8_000_000;

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Keycycle firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Host link on UART0 (GPIO0 TX, GPIO1 RX)
    let host_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = HOST_BAUD;
        cfg
    };
    let tx_buf = TX_BUF.init([0u8; 512]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, host_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("UART0 initialized for host communication");

    // Servo bus on UART1 (GPIO4 TX); commands are never answered
    let servo_config = {
        let mut cfg = UartConfig::default();
        cfg.baudrate = SERVO_BAUD;
        cfg
    };
    let servo_tx = UartTx::new_blocking(p.UART1, p.PIN_4, servo_config);
    let servos = DynamixelBus::new(
        ServoPort(servo_tx),
        DynamixelConfig::from_servo(&config.servo, config.station_count),
    );
    info!("UART1 initialized for servo bus");

    // FRAM on SPI0 (SCK 18, MOSI 19, MISO 16, CS 17)
    let spi_config = {
        let mut cfg = spi::Config::default();
        cfg.frequency = FRAM_SPI_HZ;
        cfg
    };
    let spi = Spi::new_blocking(p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, spi_config);
    let cs = Output::new(p.PIN_17, Level::High);
    let fram = Mb85rs::new(ChipSelectSpi::new(spi, cs), config.store_capacity);
    let memory = FramStore::probe(fram);
    if !memory.is_present() {
        warn!("Running without durable storage");
    }

    // Current sensors on ADC0/ADC1
    let adc = Adc::new_blocking(p.ADC, adc::Config::default());
    let keyswitch = adc::Channel::new_pin(p.PIN_26, Pull::None);
    let starter = adc::Channel::new_pin(p.PIN_27, Pull::None);
    let signal = AdcSignal::new(adc, keyswitch, starter);
    info!("ADC initialized");

    // Emergency stop on GPIO15, pulled to its released level
    let (pull, level) = if config.estop_active_low {
        (Pull::Up, ActiveLevel::Low)
    } else {
        (Pull::Down, ActiveLevel::High)
    };
    let estop = EmergencyStop::new(EstopPin(Input::new(p.PIN_15, pull)), level);
    if estop.is_pressed() {
        warn!("Emergency stop pressed at boot");
    }

    // Spawn tasks
    unwrap!(spawner.spawn(tasks::host_rx_task(rx)));
    unwrap!(spawner.spawn(tasks::host_tx_task(tx)));
    unwrap!(spawner.spawn(tasks::control_task(config, memory, signal, servos, estop)));

    info!("All tasks spawned, firmware running");

    // All work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
