//! Station record table on non-volatile memory

use heapless::Vec;
use keycycle_hal::{NvMemory, NvmError};

use super::layout::{
    record_address, required_capacity, scratch_address, validate_record, RecordField,
    RecordVerdict, StationRecord, MAGIC_ADDR, RECORD_SIZE, SELF_TEST_PATTERN, STORE_MAGIC,
    STORE_VERSION, VERSION_ADDR,
};
use crate::station::Station;
use crate::MAX_STATIONS;

/// Errors from store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Underlying memory access failed
    Memory(NvmError),
    /// Read-back after a write did not match
    VerifyFailed,
    /// Station index outside the table
    InvalidStation,
    /// Layout does not fit the device
    OutOfRange,
    /// Store has no magic number
    NotInitialized,
}

impl From<NvmError> for StoreError {
    fn from(e: NvmError) -> Self {
        StoreError::Memory(e)
    }
}

/// What [`StateStore::initialize`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitOutcome {
    /// No magic: header and default records were written
    Initialized,
    /// Magic and version match
    Verified,
    /// Magic matches, version differs; data is used as-is
    VersionMismatch { found: u16 },
}

/// Result of loading every record
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// One station per index; invalid records are replaced by defaults
    pub stations: Vec<Station, MAX_STATIONS>,
    /// Plausibility verdict per index
    pub verdicts: Vec<RecordVerdict, MAX_STATIONS>,
}

impl LoadReport {
    /// Whether at least one record passed the strict check
    pub fn any_usable(&self) -> bool {
        self.verdicts.iter().any(|v| v.is_usable())
    }
}

/// Fixed record table over a byte-addressable device
pub struct StateStore<M: NvMemory> {
    memory: M,
    station_count: u8,
}

impl<M: NvMemory> StateStore<M> {
    /// Wrap a device for `station_count` stations
    ///
    /// Fails if the count is out of range or the table and scratch word do
    /// not fit the device.
    pub fn new(memory: M, station_count: u8) -> Result<Self, StoreError> {
        if station_count == 0 || station_count as usize > MAX_STATIONS {
            return Err(StoreError::InvalidStation);
        }
        if required_capacity(station_count) > memory.capacity() {
            return Err(StoreError::OutOfRange);
        }
        Ok(Self {
            memory,
            station_count,
        })
    }

    pub fn station_count(&self) -> u8 {
        self.station_count
    }

    /// Borrow the underlying device
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Give the device back
    pub fn release(self) -> M {
        self.memory
    }

    fn check_station(&self, station: u8) -> Result<(), StoreError> {
        if station < self.station_count {
            Ok(())
        } else {
            Err(StoreError::InvalidStation)
        }
    }

    fn read_u32(&mut self, address: u32) -> Result<u32, StoreError> {
        let mut buf = [0u8; 4];
        self.memory.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u16(&mut self, address: u32) -> Result<u16, StoreError> {
        let mut buf = [0u8; 2];
        self.memory.read(address, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Write `data` and read it back
    fn write_verified(&mut self, address: u32, data: &[u8]) -> Result<(), StoreError> {
        self.memory.write(address, data)?;
        let mut readback = [0u8; RECORD_SIZE as usize];
        let readback = &mut readback[..data.len()];
        self.memory.read(address, readback)?;
        if readback == data {
            Ok(())
        } else {
            Err(StoreError::VerifyFailed)
        }
    }

    fn write_header(&mut self) -> Result<(), StoreError> {
        self.write_verified(MAGIC_ADDR, &STORE_MAGIC.to_le_bytes())?;
        self.write_verified(VERSION_ADDR, &STORE_VERSION.to_le_bytes())
    }

    fn write_defaults(&mut self) -> Result<(), StoreError> {
        let defaults = StationRecord::default().to_bytes();
        for station in 0..self.station_count {
            self.write_verified(record_address(station), &defaults)?;
        }
        Ok(())
    }

    /// Read the stored magic number and version
    pub fn read_header(&mut self) -> Result<(u32, u16), StoreError> {
        let magic = self.read_u32(MAGIC_ADDR)?;
        let version = self.read_u16(VERSION_ADDR)?;
        Ok((magic, version))
    }

    /// Prepare the store for use
    ///
    /// A device without the magic number gets a fresh header and default
    /// records. A version mismatch is reported but nothing is migrated.
    pub fn initialize(&mut self) -> Result<InitOutcome, StoreError> {
        let (magic, version) = self.read_header()?;
        if magic != STORE_MAGIC {
            self.write_header()?;
            self.write_defaults()?;
            return Ok(InitOutcome::Initialized);
        }
        if version != STORE_VERSION {
            return Ok(InitOutcome::VersionMismatch { found: version });
        }
        Ok(InitOutcome::Verified)
    }

    /// Read one record without validation
    pub fn read_record(&mut self, station: u8) -> Result<StationRecord, StoreError> {
        self.check_station(station)?;
        let mut bytes = [0u8; RECORD_SIZE as usize];
        self.memory.read(record_address(station), &mut bytes)?;
        Ok(StationRecord::from_bytes(&bytes))
    }

    /// Load and validate every record
    ///
    /// Invalid records are replaced by defaults in the report so corruption
    /// stays confined to one station.
    pub fn load_all(&mut self) -> Result<LoadReport, StoreError> {
        let (magic, _version) = self.read_header()?;
        if magic != STORE_MAGIC {
            return Err(StoreError::NotInitialized);
        }

        let mut report = LoadReport {
            stations: Vec::new(),
            verdicts: Vec::new(),
        };

        for station in 0..self.station_count {
            let record = self.read_record(station)?;
            let verdict = validate_record(&record);
            let value = if verdict.is_usable() {
                record.to_station()
            } else {
                Station::default()
            };
            // Both capacities are MAX_STATIONS and station_count is bounded
            let _ = report.stations.push(value);
            let _ = report.verdicts.push(verdict);
        }

        Ok(report)
    }

    /// Write one full record
    pub fn save_one(&mut self, station: u8, value: &Station) -> Result<(), StoreError> {
        self.check_station(station)?;
        let bytes = StationRecord::from_station(value).to_bytes();
        self.write_verified(record_address(station), &bytes)
    }

    /// Write every record, stopping at the first failure
    pub fn save_all(&mut self, stations: &[Station]) -> Result<(), StoreError> {
        for (index, value) in stations.iter().enumerate().take(self.station_count as usize) {
            self.save_one(index as u8, value)?;
        }
        Ok(())
    }

    /// Write a single field of one record
    pub fn save_field(
        &mut self,
        station: u8,
        value: &Station,
        field: RecordField,
    ) -> Result<(), StoreError> {
        self.check_station(station)?;
        let bytes = StationRecord::from_station(value).to_bytes();
        let start = field.offset() as usize;
        let data = &bytes[start..start + field.len()];
        self.write_verified(record_address(station) + field.offset(), data)
    }

    /// Rewrite the header and every record with defaults
    pub fn reset_all(&mut self) -> Result<(), StoreError> {
        self.write_header()?;
        self.write_defaults()
    }

    /// Write a pattern and its complement to scratch space and read back
    ///
    /// Station records are not touched.
    pub fn self_test(&mut self) -> Result<(), StoreError> {
        let address = scratch_address(self.station_count);
        for pattern in [SELF_TEST_PATTERN, !SELF_TEST_PATTERN] {
            self.write_verified(address, &pattern.to_le_bytes())?;
        }
        Ok(())
    }
}
