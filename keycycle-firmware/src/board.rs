//! Board adapters
//!
//! Glue between embassy-rp peripherals and the capability traits the
//! controller and drivers are written against.
//!
//! Pin assignments (RP2040 reference board):
//!
//! | Function        | Peripheral | Pins                          |
//! |-----------------|------------|-------------------------------|
//! | Host link       | UART0      | TX GPIO0, RX GPIO1            |
//! | Servo bus       | UART1      | TX GPIO4                      |
//! | FRAM            | SPI0       | SCK 18, MOSI 19, MISO 16, CS 17 |
//! | Keyswitch sense | ADC0       | GPIO26                        |
//! | Starter sense   | ADC1       | GPIO27                        |
//! | Emergency stop  | GPIO       | GPIO15                        |

use core::convert::Infallible;

use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Input, Output};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{self, UartTx};
use embassy_time::{block_for, Duration};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiBus, SpiDevice};
use embedded_io::ErrorKind;

use keycycle_core::traits::{Channel, SignalError, SignalSource, Telemetry};
use keycycle_drivers::fram::Mb85rs;
use keycycle_drivers::servo::DynamixelBus;
use keycycle_hal::{InputPin, NvMemory, NvmError};
use keycycle_protocol::Report;

use crate::channels::TELEMETRY_CHANNEL;

/// Blocking SPI bus wired to the FRAM
pub type FramBus = Spi<'static, SPI0, spi::Blocking>;

/// FRAM on SPI0 with a GPIO chip select
pub type Fram = Mb85rs<ChipSelectSpi<FramBus, Output<'static>>>;

/// Dynamixel servos on UART1
pub type Servos = DynamixelBus<ServoPort>;

/// Exclusive SPI device: one bus, one chip select
///
/// The FRAM is the only device on SPI0, so no bus sharing is needed.
pub struct ChipSelectSpi<BUS, CS> {
    bus: BUS,
    cs: CS,
}

impl<BUS, CS> ChipSelectSpi<BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin<Error = Infallible>,
{
    /// Wrap a bus; `cs` must already be driven high
    pub const fn new(bus: BUS, cs: CS) -> Self {
        Self { bus, cs }
    }

    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BUS::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => self.bus.read(buf)?,
                Operation::Write(buf) => self.bus.write(buf)?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf)?,
                Operation::DelayNs(ns) => block_for(Duration::from_nanos(u64::from(*ns))),
            }
        }
        // Clock out the last byte before deselecting
        self.bus.flush()
    }
}

impl<BUS, CS> SpiErrorType for ChipSelectSpi<BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin<Error = Infallible>,
{
    type Error = BUS::Error;
}

impl<BUS, CS> SpiDevice for ChipSelectSpi<BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin<Error = Infallible>,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let Ok(()) = self.cs.set_low();
        let result = self.run(operations);
        let Ok(()) = self.cs.set_high();
        result
    }
}

/// FRAM that may have failed its probe at boot
///
/// A missing chip answers every access with [`NvmError::NotPresent`], which
/// the controller reports once and then runs from RAM.
pub struct FramStore {
    fram: Fram,
    present: bool,
}

impl FramStore {
    /// Probe the chip and wrap it
    pub fn probe(mut fram: Fram) -> Self {
        let present = match fram.probe() {
            Ok(id) => {
                defmt::info!(
                    "FRAM detected: manufacturer {=u8:#x}, product {=u16:#x}",
                    id.manufacturer,
                    id.product
                );
                true
            }
            Err(e) => {
                defmt::error!("FRAM probe failed: {:?}", e);
                false
            }
        };
        Self { fram, present }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

impl NvMemory for FramStore {
    fn capacity(&self) -> u32 {
        self.fram.capacity()
    }

    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), NvmError> {
        if !self.present {
            return Err(NvmError::NotPresent);
        }
        self.fram.read(address, buffer)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), NvmError> {
        if !self.present {
            return Err(NvmError::NotPresent);
        }
        self.fram.write(address, data)
    }
}

/// Keyswitch and starter current sensors on ADC0/ADC1
pub struct AdcSignal {
    adc: Adc<'static, adc::Blocking>,
    keyswitch: adc::Channel<'static>,
    starter: adc::Channel<'static>,
}

impl AdcSignal {
    pub fn new(
        adc: Adc<'static, adc::Blocking>,
        keyswitch: adc::Channel<'static>,
        starter: adc::Channel<'static>,
    ) -> Self {
        Self {
            adc,
            keyswitch,
            starter,
        }
    }
}

impl SignalSource for AdcSignal {
    fn read_raw(&mut self, channel: Channel) -> Result<u16, SignalError> {
        let pin = match channel {
            Channel::Keyswitch => &mut self.keyswitch,
            Channel::Starter => &mut self.starter,
        };
        self.adc
            .blocking_read(pin)
            .map_err(|_| SignalError::Conversion)
    }
}

/// Emergency stop button input
pub struct EstopPin(pub Input<'static>);

impl InputPin for EstopPin {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

/// Blocking transmit side of the servo UART
///
/// Servo commands are fire-and-forget, so the receive side is unused.
pub struct ServoPort(pub UartTx<'static, uart::Blocking>);

impl embedded_io::ErrorType for ServoPort {
    type Error = ErrorKind;
}

impl embedded_io::Write for ServoPort {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.blocking_write(buf).map_err(|_| ErrorKind::Other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.blocking_flush().map_err(|_| ErrorKind::Other)
    }
}

/// Telemetry sink feeding the host transmit task
///
/// Reports are encoded here so the channel carries plain lines. When the
/// channel is full the report is dropped.
#[derive(Debug, Default)]
pub struct ChannelTelemetry {
    dropped: u32,
}

impl ChannelTelemetry {
    pub const fn new() -> Self {
        Self { dropped: 0 }
    }

    /// Reports dropped because the transmit queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Telemetry for ChannelTelemetry {
    fn send(&mut self, report: Report) {
        if let Report::Event(notice) = &report {
            if notice.is_error() {
                defmt::error!("{:?}", notice);
            } else if notice.is_warning() {
                defmt::warn!("{:?}", notice);
            }
        }
        if TELEMETRY_CHANNEL.try_send(report.to_line()).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            defmt::trace!("Telemetry queue full, dropped {:?}", report);
        }
    }
}
