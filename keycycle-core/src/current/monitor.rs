//! Peak current monitor

use crate::config::{ChannelConfig, TesterConfig};
use crate::traits::{Channel, SignalError, SignalSource};

/// Result of classifying one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    Pass,
    Fail,
}

impl CycleOutcome {
    pub fn is_failure(self) -> bool {
        self == CycleOutcome::Fail
    }
}

/// Classify a single peak against its minimum
///
/// A peak below the minimum fails. A peak that was never sampled stays at
/// zero and therefore fails too.
pub fn classify(peak_amps: f32, min_amps: f32) -> CycleOutcome {
    if peak_amps < min_amps {
        CycleOutcome::Fail
    } else {
        CycleOutcome::Pass
    }
}

/// Peak currents observed during one cycle (A)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeakCurrents {
    pub keyswitch: f32,
    pub starter: f32,
}

impl PeakCurrents {
    /// Peak for one channel
    pub fn get(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Keyswitch => self.keyswitch,
            Channel::Starter => self.starter,
        }
    }

    /// Fail if either channel stayed below its minimum
    pub fn classify(&self, keyswitch_min: f32, starter_min: f32) -> CycleOutcome {
        match (
            classify(self.keyswitch, keyswitch_min),
            classify(self.starter, starter_min),
        ) {
            (CycleOutcome::Pass, CycleOutcome::Pass) => CycleOutcome::Pass,
            _ => CycleOutcome::Fail,
        }
    }
}

/// Per-channel calibration and running peak
#[derive(Debug, Clone, Copy)]
struct ChannelState {
    gain: f32,
    /// Raw reading at zero current
    offset_raw: f32,
    peak: f32,
}

impl ChannelState {
    fn new(config: &ChannelConfig, offset_raw: f32) -> Self {
        Self {
            gain: config.gain_amps_per_volt,
            offset_raw,
            peak: 0.0,
        }
    }
}

/// Two-channel current monitor
///
/// Readings are converted with
/// `|raw - offset| * reference_volts / max_raw * gain`.
#[derive(Debug, Clone)]
pub struct CurrentMonitor {
    volts_per_count: f32,
    calibration_samples: u16,
    keyswitch: ChannelState,
    starter: ChannelState,
}

impl CurrentMonitor {
    /// Create a monitor with mid-scale offsets and zero peaks
    pub fn new(config: &TesterConfig) -> Self {
        let mid_scale = config.adc.max_raw as f32 / 2.0;
        Self {
            volts_per_count: config.adc.reference_volts / config.adc.max_raw as f32,
            calibration_samples: config.adc.calibration_samples.max(1),
            keyswitch: ChannelState::new(&config.keyswitch, mid_scale),
            starter: ChannelState::new(&config.starter, mid_scale),
        }
    }

    fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::Keyswitch => &self.keyswitch,
            Channel::Starter => &self.starter,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Keyswitch => &mut self.keyswitch,
            Channel::Starter => &mut self.starter,
        }
    }

    /// Measure the zero-current offset of both channels
    ///
    /// Must run with no current flowing. A channel whose reads fail keeps
    /// its previous offset; the first error is returned after both
    /// channels have been attempted.
    pub fn calibrate<S: SignalSource>(&mut self, source: &mut S) -> Result<(), SignalError> {
        let mut result = Ok(());
        for channel in Channel::ALL {
            match self.average(source, channel) {
                Ok(offset) => self.channel_mut(channel).offset_raw = offset,
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    fn average<S: SignalSource>(&self, source: &mut S, channel: Channel) -> Result<f32, SignalError> {
        let mut sum: u32 = 0;
        for _ in 0..self.calibration_samples {
            sum += source.read_raw(channel)? as u32;
        }
        Ok(sum as f32 / self.calibration_samples as f32)
    }

    /// Take one reading per channel and fold it into the peaks
    ///
    /// A failed read leaves that channel's peak unchanged.
    pub fn sample<S: SignalSource>(&mut self, source: &mut S) -> Result<(), SignalError> {
        let mut result = Ok(());
        for channel in Channel::ALL {
            match source.read_raw(channel) {
                Ok(raw) => {
                    let amps = self.to_amps(channel, raw);
                    let state = self.channel_mut(channel);
                    if amps > state.peak {
                        state.peak = amps;
                    }
                }
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    /// Zero both running peaks
    pub fn reset(&mut self) {
        self.keyswitch.peak = 0.0;
        self.starter.peak = 0.0;
    }

    /// Current running peaks
    pub fn peaks(&self) -> PeakCurrents {
        PeakCurrents {
            keyswitch: self.keyswitch.peak,
            starter: self.starter.peak,
        }
    }

    /// Calibrated zero offset of a channel (raw counts)
    pub fn offset(&self, channel: Channel) -> f32 {
        self.channel(channel).offset_raw
    }

    /// Convert a raw reading to an absolute current (A)
    pub fn to_amps(&self, channel: Channel, raw: u16) -> f32 {
        let state = self.channel(channel);
        let volts = (raw as f32 - state.offset_raw) * self.volts_per_count;
        let amps = volts * state.gain;
        if amps < 0.0 {
            -amps
        } else {
            amps
        }
    }
}
