//! Simple TOML parser for tester configuration
//!
//! Handles only the subset used by `tester.toml`; it does NOT support the
//! full TOML language.
//!
//! Supported features:
//! - `[section]` headers
//! - `key = value` pairs (integer, float, boolean)
//! - Comments (`# ...`), whole-line or trailing
//!
//! Every key is applied on top of [`TesterConfig::default`], so a file only
//! needs the values it changes.

use keycycle_core::config::{ChannelConfig, ConfigError, TesterConfig};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Section header not recognized (1-based line number)
    InvalidSection(usize),
    /// Key not valid in its section
    UnknownKey(usize),
    /// Value missing or of the wrong type
    InvalidValue(usize),
    /// Line is neither a header nor `key = value`
    Syntax(usize),
    /// Parsed configuration failed validation
    Invalid(ConfigError),
}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        ParseError::Invalid(e)
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Tester,
    Timing,
    Servo,
    Adc,
    Keyswitch,
    Starter,
}

/// Parse and validate a tester configuration
pub fn parse_config(input: &str) -> Result<TesterConfig, ParseError> {
    let mut config = TesterConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let number = index + 1;
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = parse_section_header(header).ok_or(ParseError::InvalidSection(number))?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::Syntax(number))?;
        apply_value(&mut config, section, key, value, number)?;
    }

    config.validate()?;
    Ok(config)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_section_header(header: &str) -> Option<Section> {
    Some(match header.trim() {
        "tester" => Section::Tester,
        "timing" => Section::Timing,
        "servo" => Section::Servo,
        "adc" => Section::Adc,
        "keyswitch" => Section::Keyswitch,
        "starter" => Section::Starter,
        _ => return None,
    })
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn apply_value(
    config: &mut TesterConfig,
    section: Section,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), ParseError> {
    let bad = ParseError::InvalidValue(line);
    let unknown = ParseError::UnknownKey(line);

    match section {
        Section::Root => return Err(unknown),
        Section::Tester => match key {
            "station_count" => config.station_count = parse_int(value).ok_or(bad)?,
            "failure_threshold" => config.failure_threshold = parse_int(value).ok_or(bad)?,
            "store_capacity" => config.store_capacity = parse_int(value).ok_or(bad)?,
            "estop_active_low" => config.estop_active_low = parse_bool(value).ok_or(bad)?,
            _ => return Err(unknown),
        },
        Section::Timing => match key {
            "start_duration_ms" => config.timing.start_duration_ms = parse_int(value).ok_or(bad)?,
            "home_duration_ms" => config.timing.home_duration_ms = parse_int(value).ok_or(bad)?,
            "cycles_per_minute" => config.timing.cycles_per_minute = parse_int(value).ok_or(bad)?,
            _ => return Err(unknown),
        },
        Section::Servo => match key {
            "base_id" => config.servo.base_id = parse_int(value).ok_or(bad)?,
            "home_degrees" => config.servo.home_degrees = parse_float(value).ok_or(bad)?,
            "engage_degrees" => config.servo.engage_degrees = parse_float(value).ok_or(bad)?,
            "torque_percent" => config.servo.torque_percent = parse_float(value).ok_or(bad)?,
            _ => return Err(unknown),
        },
        Section::Adc => match key {
            "reference_volts" => config.adc.reference_volts = parse_float(value).ok_or(bad)?,
            "max_raw" => config.adc.max_raw = parse_int(value).ok_or(bad)?,
            "calibration_samples" => {
                config.adc.calibration_samples = parse_int(value).ok_or(bad)?
            }
            _ => return Err(unknown),
        },
        Section::Keyswitch => apply_channel(&mut config.keyswitch, key, value, line)?,
        Section::Starter => apply_channel(&mut config.starter, key, value, line)?,
    }
    Ok(())
}

fn apply_channel(
    channel: &mut ChannelConfig,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), ParseError> {
    let parsed = parse_float(value).ok_or(ParseError::InvalidValue(line))?;
    match key {
        "gain_amps_per_volt" => channel.gain_amps_per_volt = parsed,
        "min_peak_amps" => channel.min_peak_amps = parsed,
        _ => return Err(ParseError::UnknownKey(line)),
    }
    Ok(())
}

/// Parse an unsigned integer, allowing `_` separators
fn parse_int<T: TryFrom<u64>>(value: &str) -> Option<T> {
    let mut result: u64 = 0;
    let mut digits = 0;
    for c in value.chars() {
        match c {
            '_' => continue,
            '0'..='9' => {
                result = result.checked_mul(10)?.checked_add(c as u64 - '0' as u64)?;
                digits += 1;
            }
            _ => return None,
        }
    }
    if digits == 0 {
        return None;
    }
    T::try_from(result).ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a decimal number such as `5`, `-90.0` or `3.3`
fn parse_float(value: &str) -> Option<f32> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut result = 0.0f32;
    for c in whole.chars().filter(|&c| c != '_') {
        result = result * 10.0 + c.to_digit(10)? as f32;
    }
    let mut scale = 0.1f32;
    for c in fraction.chars().filter(|&c| c != '_') {
        result += c.to_digit(10)? as f32 * scale;
        scale /= 10.0;
    }

    Some(if negative { -result } else { result })
}
