//! Tester configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_STATIONS;

/// Default number of stations on the reference rig
pub const DEFAULT_STATION_COUNT: u8 = 4;

/// Default failure count that removes a station from rotation
pub const DEFAULT_FAILURE_THRESHOLD: u16 = 10;

/// Default store capacity (4 Mbit FRAM)
pub const DEFAULT_STORE_CAPACITY: u32 = 512 * 1024;

/// Errors reported by [`TesterConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Station count is zero or above [`MAX_STATIONS`]
    InvalidStationCount,
    /// Failure threshold is zero
    InvalidFailureThreshold,
    /// Cycle rate is zero
    InvalidCycleRate,
    /// A motion phase has zero duration
    InvalidDuration,
    /// Servo torque limit outside 0-100 %
    InvalidTorque,
    /// ADC reference, resolution or sample count is unusable
    InvalidAdc,
    /// Channel gain is not positive or threshold is negative
    InvalidChannel,
    /// Servo ids would run past the highest valid id
    InvalidServoId,
}

/// Motion timing for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Time spent driving toward the start position (ms)
    pub start_duration_ms: u32,
    /// Time spent driving back home (ms)
    pub home_duration_ms: u32,
    /// Target cycles per minute across all enabled stations
    pub cycles_per_minute: u16,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_duration_ms: 500,
            home_duration_ms: 200,
            cycles_per_minute: 6,
        }
    }
}

/// Servo positions and limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoConfig {
    /// Bus id of station 0; station `i` uses `base_id + i`
    pub base_id: u8,
    /// Resting angle in degrees
    pub home_degrees: f32,
    /// Angle that turns the key to start, in degrees
    ///
    /// Set past the mechanical stop; the torque limit keeps the servo
    /// from stalling hard against it.
    pub engage_degrees: f32,
    /// Goal current as a percentage of the servo's current limit
    pub torque_percent: f32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            base_id: 1,
            home_degrees: 0.0,
            engage_degrees: 90.0,
            torque_percent: 10.0,
        }
    }
}

/// Analog front end shared by both current channels
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdcConfig {
    /// Sensor voltage at full-scale raw reading
    pub reference_volts: f32,
    /// Full-scale raw reading
    pub max_raw: u16,
    /// Samples averaged per channel by zero-current calibration
    pub calibration_samples: u16,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            reference_volts: 5.0,
            max_raw: 4095,
            calibration_samples: 100,
        }
    }
}

/// One current-sensing channel
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    /// Sensor transfer factor (A/V)
    pub gain_amps_per_volt: f32,
    /// Minimum peak current for a passing cycle (A)
    pub min_peak_amps: f32,
}

impl ChannelConfig {
    /// Keyswitch sensor defaults (30 A Hall sensor)
    pub const fn keyswitch() -> Self {
        Self {
            gain_amps_per_volt: 16.0,
            min_peak_amps: 5.0,
        }
    }

    /// Starter sensor defaults (100 A Hall sensor)
    pub const fn starter() -> Self {
        Self {
            gain_amps_per_volt: 48.0,
            min_peak_amps: 20.0,
        }
    }
}

/// Complete tester configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TesterConfig {
    /// Number of stations in use (1..=8)
    pub station_count: u8,
    /// Failures that remove a station from rotation
    pub failure_threshold: u16,
    pub timing: TimingConfig,
    pub servo: ServoConfig,
    pub adc: AdcConfig,
    pub keyswitch: ChannelConfig,
    pub starter: ChannelConfig,
    /// Size of the durable store device in bytes
    pub store_capacity: u32,
    /// Emergency stop input reads low when pressed
    pub estop_active_low: bool,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            station_count: DEFAULT_STATION_COUNT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            timing: TimingConfig::default(),
            servo: ServoConfig::default(),
            adc: AdcConfig::default(),
            keyswitch: ChannelConfig::keyswitch(),
            starter: ChannelConfig::starter(),
            store_capacity: DEFAULT_STORE_CAPACITY,
            estop_active_low: false,
        }
    }
}

impl TesterConfig {
    /// Check that every field is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station_count == 0 || self.station_count as usize > MAX_STATIONS {
            return Err(ConfigError::InvalidStationCount);
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold);
        }
        if self.timing.cycles_per_minute == 0 {
            return Err(ConfigError::InvalidCycleRate);
        }
        if self.timing.start_duration_ms == 0 || self.timing.home_duration_ms == 0 {
            return Err(ConfigError::InvalidDuration);
        }
        if !(0.0..=100.0).contains(&self.servo.torque_percent) {
            return Err(ConfigError::InvalidTorque);
        }
        // Dynamixel ids 0..=252 are addressable
        if self.servo.base_id as u16 + self.station_count as u16 - 1 > 252 {
            return Err(ConfigError::InvalidServoId);
        }
        if !(self.adc.reference_volts > 0.0)
            || self.adc.max_raw == 0
            || self.adc.calibration_samples == 0
        {
            return Err(ConfigError::InvalidAdc);
        }
        for channel in [&self.keyswitch, &self.starter] {
            if !(channel.gain_amps_per_volt > 0.0) || !(channel.min_peak_amps >= 0.0) {
                return Err(ConfigError::InvalidChannel);
            }
        }
        Ok(())
    }
}
