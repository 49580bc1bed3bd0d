//! Dynamixel X-series servos (protocol 2.0)
//!
//! Each station's key is turned by one servo. All servos share a
//! half-duplex TTL bus; station `i` is addressed as `base_id + i`.
//!
//! # Instruction packet
//!
//! ```text
//! FF FF FD 00 | ID | LEN_L LEN_H | INST | PARAM... | CRC_L CRC_H
//! ```
//!
//! LEN counts the instruction, the (stuffed) parameters and the CRC. The
//! CRC is CRC-16/BUYPASS over every byte before it, header included.
//! Any `FF FF FD` inside the instruction and parameters is followed by an
//! extra `FD` so it cannot be mistaken for a header.
//!
//! Commands are fire-and-forget: status packets are never read, so the
//! receive side of the bus can stay unconnected.

use embedded_io::Write;
use heapless::Vec;
use keycycle_core::config::ServoConfig;
use keycycle_core::traits::{ActuatorBus, ActuatorError};

/// Packet header
pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Highest id a single servo can hold
pub const MAX_ID: u8 = 252;

/// Largest packet this driver builds
pub const MAX_PACKET_LEN: usize = 32;

/// Encoder counts per revolution
const COUNTS_PER_REV: f32 = 4096.0;

/// Factory Current Limit (address 38) of the XM430, in raw units
pub const DEFAULT_CURRENT_LIMIT: u16 = 1193;

/// Instruction codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
}

/// X-series control table addresses
pub mod reg {
    /// Operating mode (1 byte, EEPROM, torque must be off)
    pub const OPERATING_MODE: u16 = 11;
    /// Torque enable (1 byte)
    pub const TORQUE_ENABLE: u16 = 64;
    /// Goal current (2 bytes, signed)
    pub const GOAL_CURRENT: u16 = 102;
    /// Goal position (4 bytes, signed)
    pub const GOAL_POSITION: u16 = 116;
}

/// Current-based position control
pub const MODE_CURRENT_BASED_POSITION: u8 = 5;

/// Packet construction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Stuffed packet does not fit [`MAX_PACKET_LEN`]
    TooLong,
}

/// One encoded instruction packet
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// CRC-16/BUYPASS (polynomial 0x8005, no reflection, zero init)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x8005
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Append `payload`, inserting an `FD` after every `FF FF FD`
fn push_stuffed(packet: &mut Packet, payload: &[u8]) -> Result<(), PacketError> {
    let mut run = 0u8;
    for &byte in payload {
        packet.push(byte).map_err(|_| PacketError::TooLong)?;
        run = match byte {
            0xFF => (run + 1).min(2),
            0xFD if run == 2 => {
                packet.push(0xFD).map_err(|_| PacketError::TooLong)?;
                0
            }
            _ => 0,
        };
    }
    Ok(())
}

/// Build an instruction packet
pub fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Result<Packet, PacketError> {
    let mut packet = Packet::new();
    packet
        .extend_from_slice(&HEADER)
        .map_err(|_| PacketError::TooLong)?;
    // Length bytes are patched once the stuffed size is known
    packet
        .extend_from_slice(&[id, 0, 0])
        .map_err(|_| PacketError::TooLong)?;

    let body_start = packet.len();
    push_stuffed(&mut packet, &[instruction as u8])?;
    push_stuffed(&mut packet, params)?;

    let length = (packet.len() - body_start + 2) as u16;
    packet[5..7].copy_from_slice(&length.to_le_bytes());

    let crc = crc16(&packet);
    packet
        .extend_from_slice(&crc.to_le_bytes())
        .map_err(|_| PacketError::TooLong)?;
    Ok(packet)
}

/// Build a WRITE packet for `data` at control table `address`
pub fn write_packet(id: u8, address: u16, data: &[u8]) -> Result<Packet, PacketError> {
    let mut params: Vec<u8, 8> = Vec::new();
    params
        .extend_from_slice(&address.to_le_bytes())
        .map_err(|_| PacketError::TooLong)?;
    params
        .extend_from_slice(data)
        .map_err(|_| PacketError::TooLong)?;
    build_packet(id, Instruction::Write, &params)
}

fn round(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

/// Convert an angle to encoder counts
pub fn degrees_to_counts(degrees: f32) -> i32 {
    round(degrees * COUNTS_PER_REV / 360.0)
}

/// Convert a percentage of `limit` to raw goal current units
pub fn percent_to_current(percent: f32, limit: u16) -> i16 {
    let percent = percent.clamp(0.0, 100.0);
    round(percent * limit as f32 / 100.0) as i16
}

/// Bus settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DynamixelConfig {
    /// Id of the servo on station 0
    pub base_id: u8,
    /// Number of stations on the bus
    pub station_count: u8,
    /// Current Limit programmed into the servos (raw units)
    pub current_limit: u16,
}

impl DynamixelConfig {
    pub fn from_servo(servo: &ServoConfig, station_count: u8) -> Self {
        Self {
            base_id: servo.base_id,
            station_count,
            current_limit: DEFAULT_CURRENT_LIMIT,
        }
    }
}

/// Servo bus over any byte writer (typically a UART TX half)
pub struct DynamixelBus<W> {
    port: W,
    config: DynamixelConfig,
}

impl<W: Write> DynamixelBus<W> {
    pub fn new(port: W, config: DynamixelConfig) -> Self {
        Self { port, config }
    }

    pub fn config(&self) -> &DynamixelConfig {
        &self.config
    }

    /// Give the writer back
    pub fn release(self) -> W {
        self.port
    }

    /// Bus id of a station's servo
    pub fn id_for(&self, station: u8) -> Result<u8, ActuatorError> {
        if station >= self.config.station_count {
            return Err(ActuatorError::InvalidStation);
        }
        match self.config.base_id.checked_add(station) {
            Some(id) if id <= MAX_ID => Ok(id),
            _ => Err(ActuatorError::InvalidStation),
        }
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), ActuatorError> {
        self.port.write_all(packet).map_err(|_| ActuatorError::Bus)?;
        self.port.flush().map_err(|_| ActuatorError::Bus)
    }

    /// Write raw bytes into a station's control table
    pub fn write_register(&mut self, station: u8, address: u16, data: &[u8]) -> Result<(), ActuatorError> {
        let id = self.id_for(station)?;
        let packet = write_packet(id, address, data).map_err(|_| ActuatorError::Bus)?;
        self.send(&packet)
    }

    pub fn set_torque(&mut self, station: u8, enabled: bool) -> Result<(), ActuatorError> {
        self.write_register(station, reg::TORQUE_ENABLE, &[enabled as u8])
    }

    /// Change operating mode (torque must be off)
    pub fn set_operating_mode(&mut self, station: u8, mode: u8) -> Result<(), ActuatorError> {
        self.write_register(station, reg::OPERATING_MODE, &[mode])
    }
}

impl<W: Write> ActuatorBus for DynamixelBus<W> {
    fn set_goal_position(&mut self, station: u8, degrees: f32) -> Result<(), ActuatorError> {
        let counts = degrees_to_counts(degrees);
        self.write_register(station, reg::GOAL_POSITION, &counts.to_le_bytes())
    }

    fn set_goal_current(&mut self, station: u8, percent: f32) -> Result<(), ActuatorError> {
        let raw = percent_to_current(percent, self.config.current_limit);
        self.write_register(station, reg::GOAL_CURRENT, &raw.to_le_bytes())
    }

    /// Switch to current-based position control with the given limit
    fn prepare(&mut self, station: u8, current_percent: f32) -> Result<(), ActuatorError> {
        self.set_torque(station, false)?;
        self.set_operating_mode(station, MODE_CURRENT_BASED_POSITION)?;
        self.set_goal_current(station, current_percent)?;
        self.set_torque(station, true)
    }
}
