//! Per-station counters and enable flags

use heapless::Vec;
use keycycle_hal::NvMemory;
use keycycle_protocol::{Notice, Report, StationReport};

use crate::store::{RecordField, StateStore, StoreError};
use crate::traits::Telemetry;
use crate::MAX_STATIONS;

/// In-memory state of one station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Station {
    pub enabled: bool,
    pub cycles: u32,
    pub failures: u16,
}

impl Default for Station {
    fn default() -> Self {
        Self {
            enabled: true,
            cycles: 0,
            failures: 0,
        }
    }
}

/// Errors from registry operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Index is not below the station count
    InvalidStation(u8),
}

/// Sole owner of station state
///
/// Mutators apply the change in memory first, then write the changed
/// fields through to the store. A failed write is reported and counted
/// but never rolls back the in-memory value.
pub struct StationRegistry<M: NvMemory> {
    stations: Vec<Station, MAX_STATIONS>,
    failure_threshold: u16,
    store: Option<StateStore<M>>,
    store_faults: u32,
}

impl<M: NvMemory> StationRegistry<M> {
    /// Create a registry of default stations
    ///
    /// `station_count` is clamped to `1..=MAX_STATIONS`. Without a store
    /// the registry runs purely in memory.
    pub fn new(station_count: u8, failure_threshold: u16, store: Option<StateStore<M>>) -> Self {
        let count = (station_count as usize).clamp(1, MAX_STATIONS);
        let mut stations = Vec::new();
        for _ in 0..count {
            let _ = stations.push(Station::default());
        }
        Self {
            stations,
            failure_threshold,
            store,
            store_faults: 0,
        }
    }

    pub fn station_count(&self) -> u8 {
        self.stations.len() as u8
    }

    pub fn failure_threshold(&self) -> u16 {
        self.failure_threshold
    }

    /// Number of persistence failures since boot
    pub fn store_faults(&self) -> u32 {
        self.store_faults
    }

    /// Whether changes are being persisted
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn store_mut(&mut self) -> Option<&mut StateStore<M>> {
        self.store.as_mut()
    }

    pub fn station(&self, index: u8) -> Option<Station> {
        self.stations.get(index as usize).copied()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Whether `index` is a valid, enabled station
    pub fn is_enabled(&self, index: u8) -> bool {
        self.station(index).is_some_and(|s| s.enabled)
    }

    pub fn enabled_count(&self) -> u8 {
        self.stations.iter().filter(|s| s.enabled).count() as u8
    }

    /// Bit `i` set when station `i` is enabled
    pub fn enabled_mask(&self) -> u8 {
        self.stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.enabled)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    /// Snapshot of one station for telemetry
    pub fn report(&self, index: u8) -> Option<StationReport> {
        self.station(index).map(|s| StationReport {
            station: index,
            enabled: s.enabled,
            cycles: s.cycles,
            failures: s.failures,
        })
    }

    fn check<T: Telemetry>(&self, index: u8, telemetry: &mut T) -> Result<usize, RegistryError> {
        if (index as usize) < self.stations.len() {
            Ok(index as usize)
        } else {
            telemetry.send(Notice::InvalidStation(index).into());
            Err(RegistryError::InvalidStation(index))
        }
    }

    /// Write the changed fields of one station
    ///
    /// Every field is attempted even after a failure, so an auto-disable
    /// still reaches the device when the counter write did not. Each failed
    /// field is reported; the mutation counts as one store fault.
    fn persist<T: Telemetry>(&mut self, index: u8, fields: &[RecordField], telemetry: &mut T) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let value = self.stations[index as usize];
        let mut failed = false;
        for &field in fields {
            if let Err(e) = store.save_field(index, &value, field) {
                telemetry.send(store_failure(index, e).into());
                failed = true;
            }
        }
        if failed {
            self.store_faults = self.store_faults.saturating_add(1);
        }
    }

    fn notify_changed<T: Telemetry>(&self, index: u8, telemetry: &mut T) {
        if let Some(report) = self.report(index) {
            telemetry.send(Report::Station(report));
        }
    }

    /// Put a station back into rotation
    ///
    /// Returns `Ok(false)` without any change notification if it was
    /// already enabled.
    pub fn enable<T: Telemetry>(&mut self, index: u8, telemetry: &mut T) -> Result<bool, RegistryError> {
        self.set_enabled(index, true, telemetry)
    }

    /// Remove a station from rotation
    pub fn disable<T: Telemetry>(&mut self, index: u8, telemetry: &mut T) -> Result<bool, RegistryError> {
        self.set_enabled(index, false, telemetry)
    }

    fn set_enabled<T: Telemetry>(
        &mut self,
        index: u8,
        enabled: bool,
        telemetry: &mut T,
    ) -> Result<bool, RegistryError> {
        let i = self.check(index, telemetry)?;
        if self.stations[i].enabled == enabled {
            let notice = if enabled {
                Notice::AlreadyEnabled(index)
            } else {
                Notice::AlreadyDisabled(index)
            };
            telemetry.send(notice.into());
            return Ok(false);
        }

        self.stations[i].enabled = enabled;
        self.persist(index, &[RecordField::Enabled], telemetry);
        let notice = if enabled {
            Notice::StationEnabled(index)
        } else {
            Notice::StationDisabled(index)
        };
        telemetry.send(notice.into());
        self.notify_changed(index, telemetry);
        Ok(true)
    }

    /// Count one finished cycle
    ///
    /// The cycle counter always advances; the failure counter only on
    /// failure. A station whose failures reach the threshold is disabled
    /// and stays disabled until explicitly enabled or its failures reset.
    pub fn record_cycle<T: Telemetry>(
        &mut self,
        index: u8,
        failure: bool,
        telemetry: &mut T,
    ) -> Result<Station, RegistryError> {
        let i = self.check(index, telemetry)?;
        let threshold = self.failure_threshold;
        let station = &mut self.stations[i];

        station.cycles = station.cycles.saturating_add(1);
        if failure {
            station.failures = station.failures.saturating_add(1);
        }
        let auto_disabled = station.enabled && station.failures >= threshold;
        if auto_disabled {
            station.enabled = false;
        }
        let updated = *station;

        let mut fields: Vec<RecordField, 3> = Vec::new();
        let _ = fields.push(RecordField::Cycles);
        if failure {
            let _ = fields.push(RecordField::Failures);
        }
        if auto_disabled {
            let _ = fields.push(RecordField::Enabled);
        }
        self.persist(index, &fields, telemetry);

        if auto_disabled {
            telemetry.send(
                Notice::AutoDisabled {
                    station: index,
                    failures: updated.failures,
                }
                .into(),
            );
        }
        self.notify_changed(index, telemetry);
        Ok(updated)
    }

    /// Overwrite both counters with trusted values
    ///
    /// The failure threshold is not applied: externally supplied state is
    /// taken as-is, including its relationship to the enable flag.
    pub fn set_counters<T: Telemetry>(
        &mut self,
        index: u8,
        cycles: u32,
        failures: u16,
        telemetry: &mut T,
    ) -> Result<(), RegistryError> {
        let i = self.check(index, telemetry)?;
        self.stations[i].cycles = cycles;
        self.stations[i].failures = failures;
        self.persist(index, &[RecordField::Cycles, RecordField::Failures], telemetry);
        self.notify_changed(index, telemetry);
        Ok(())
    }

    /// Zero the cycle counter
    pub fn reset_cycles<T: Telemetry>(&mut self, index: u8, telemetry: &mut T) -> Result<(), RegistryError> {
        let i = self.check(index, telemetry)?;
        self.stations[i].cycles = 0;
        self.persist(index, &[RecordField::Cycles], telemetry);
        telemetry.send(Notice::CyclesReset(index).into());
        self.notify_changed(index, telemetry);
        Ok(())
    }

    /// Zero the failure counter
    ///
    /// The enable flag is left alone; re-admitting the station takes an
    /// explicit enable.
    pub fn reset_failures<T: Telemetry>(&mut self, index: u8, telemetry: &mut T) -> Result<(), RegistryError> {
        let i = self.check(index, telemetry)?;
        self.stations[i].failures = 0;
        self.persist(index, &[RecordField::Failures], telemetry);
        telemetry.send(Notice::FailuresReset(index).into());
        self.notify_changed(index, telemetry);
        Ok(())
    }

    /// Apply a boot-time value loaded from the store
    ///
    /// Nothing is written back and nothing is reported.
    pub fn seed(&mut self, index: u8, value: Station) -> Result<(), RegistryError> {
        match self.stations.get_mut(index as usize) {
            Some(station) => {
                *station = value;
                Ok(())
            }
            None => Err(RegistryError::InvalidStation(index)),
        }
    }
}

/// Notice for a failed station write
pub(crate) fn store_failure(index: u8, error: StoreError) -> Notice {
    match error {
        StoreError::VerifyFailed => Notice::StoreVerifyFailed(index),
        _ => Notice::StoreWriteFailed(index),
    }
}
