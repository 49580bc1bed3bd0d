//! On-device record layout

use crate::station::Station;

/// Magic number marking an initialized store
pub const STORE_MAGIC: u32 = 0x4B59_4331; // "KYC1"

/// Current record format version
pub const STORE_VERSION: u16 = 1;

/// Address of the magic number
pub const MAGIC_ADDR: u32 = 0;

/// Address of the format version
pub const VERSION_ADDR: u32 = 4;

/// Address of the first station record
pub const TABLE_BASE: u32 = 16;

/// Size of one station record in bytes
pub const RECORD_SIZE: u32 = 8;

/// Size of the self-test scratch word
pub const SCRATCH_SIZE: u32 = 4;

/// Pattern written by the self-test (its complement is written second)
pub const SELF_TEST_PATTERN: u32 = 0xAA55_AA55;

/// Cycle counts above this are flagged as suspicious
pub const MAX_PLAUSIBLE_CYCLES: u32 = 10_000_000;

/// Failure counts above this are flagged as suspicious
pub const MAX_PLAUSIBLE_FAILURES: u16 = 10_000;

/// Address of a station's record
pub const fn record_address(station: u8) -> u32 {
    TABLE_BASE + station as u32 * RECORD_SIZE
}

/// Address of the self-test scratch word, just past the table
pub const fn scratch_address(station_count: u8) -> u32 {
    record_address(station_count)
}

/// Bytes the layout needs for `station_count` stations
pub const fn required_capacity(station_count: u8) -> u32 {
    scratch_address(station_count) + SCRATCH_SIZE
}

/// A station record exactly as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StationRecord {
    pub cycles: u32,
    pub failures: u16,
    /// 1 = enabled, 0 = disabled; anything else is corrupt
    pub enabled: u8,
    pub reserved: u8,
}

impl Default for StationRecord {
    fn default() -> Self {
        Self::from_station(&Station::default())
    }
}

impl StationRecord {
    pub const fn from_station(station: &Station) -> Self {
        Self {
            cycles: station.cycles,
            failures: station.failures,
            enabled: station.enabled as u8,
            reserved: 0,
        }
    }

    /// Interpret the record as a station (any non-zero flag is enabled)
    pub const fn to_station(&self) -> Station {
        Station {
            enabled: self.enabled != 0,
            cycles: self.cycles,
            failures: self.failures,
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE as usize] {
        let mut bytes = [0u8; RECORD_SIZE as usize];
        bytes[0..4].copy_from_slice(&self.cycles.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.failures.to_le_bytes());
        bytes[6] = self.enabled;
        bytes[7] = self.reserved;
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE as usize]) -> Self {
        Self {
            cycles: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            failures: u16::from_le_bytes([bytes[4], bytes[5]]),
            enabled: bytes[6],
            reserved: bytes[7],
        }
    }
}

/// A single field of a station record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordField {
    Cycles,
    Failures,
    Enabled,
}

impl RecordField {
    /// Byte offset within the record
    pub const fn offset(self) -> u32 {
        match self {
            RecordField::Cycles => 0,
            RecordField::Failures => 4,
            RecordField::Enabled => 6,
        }
    }

    /// Width in bytes
    pub const fn len(self) -> usize {
        match self {
            RecordField::Cycles => 4,
            RecordField::Failures => 2,
            RecordField::Enabled => 1,
        }
    }
}

/// Plausibility verdict for a loaded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordVerdict {
    /// Record looks sane
    Valid,
    /// Counters are implausibly high but the record is used as-is
    Suspicious,
    /// Record is corrupt and must be replaced by defaults
    Invalid,
}

impl RecordVerdict {
    /// Whether the stored values may be used
    pub fn is_usable(self) -> bool {
        !matches!(self, RecordVerdict::Invalid)
    }
}

/// Check a loaded record
///
/// The enable flag must be exactly 0 or 1. Counters above generous ceilings
/// are flagged but kept, since a long-running rig can legitimately reach
/// them.
pub fn validate_record(record: &StationRecord) -> RecordVerdict {
    if record.enabled > 1 {
        RecordVerdict::Invalid
    } else if record.cycles > MAX_PLAUSIBLE_CYCLES || record.failures > MAX_PLAUSIBLE_FAILURES {
        RecordVerdict::Suspicious
    } else {
        RecordVerdict::Valid
    }
}
