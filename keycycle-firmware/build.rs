//! Build script for keycycle-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates tester.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stations the firmware can drive
const MAX_STATIONS: i64 = 8;

/// Highest servo id on the bus
const MAX_SERVO_ID: i64 = 252;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate tester.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=tester.toml");

    let config_path = Path::new("tester.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: tester.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds tester.toml as its configuration.           ║\n\
            ║  Please create one in the keycycle-firmware directory.           ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read tester.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in tester.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_tester(&config, &mut errors);
    validate_timing(&config, &mut errors);
    validate_servo(&config, &mut errors);
    validate_adc(&config, &mut errors);
    validate_channel(&config, "keyswitch", &mut errors);
    validate_channel(&config, "starter", &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid configuration in tester.toml                     ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=tester.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only known sections, each a table
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    const KNOWN: [&str; 6] = ["tester", "timing", "servo", "adc", "keyswitch", "starter"];

    let Some(root) = config.as_table() else {
        return;
    };
    for (name, value) in root {
        if !KNOWN.contains(&name.as_str()) {
            errors.push(format!("unknown section [{}]", name));
        } else if !value.is_table() {
            errors.push(format!("[{}] must be a table", name));
        }
    }
}

fn integer(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

/// Floats may be written as integers (`gain = 16`)
fn number(config: &toml::Value, section: &str, key: &str) -> Option<f64> {
    let value = config.get(section)?.get(key)?;
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

fn check_type(
    config: &toml::Value,
    section: &str,
    key: &str,
    ok: fn(&toml::Value) -> bool,
    expected: &str,
    errors: &mut Vec<String>,
) {
    if let Some(value) = config.get(section).and_then(|s| s.get(key)) {
        if !ok(value) {
            errors.push(format!("[{}] {} must be {}", section, key, expected));
        }
    }
}

fn validate_tester(config: &toml::Value, errors: &mut Vec<String>) {
    check_type(config, "tester", "estop_active_low", toml::Value::is_bool, "a boolean", errors);

    if let Some(count) = integer(config, "tester", "station_count") {
        if !(1..=MAX_STATIONS).contains(&count) {
            errors.push(format!("[tester] station_count must be 1-{}", MAX_STATIONS));
        }
    }
    if let Some(threshold) = integer(config, "tester", "failure_threshold") {
        if !(1..=i64::from(u16::MAX)).contains(&threshold) {
            errors.push("[tester] failure_threshold must be 1-65535".to_string());
        }
    }
    if let Some(capacity) = integer(config, "tester", "store_capacity") {
        if !(64..=(1 << 24)).contains(&capacity) {
            errors.push("[tester] store_capacity must be 64 B - 16 MiB".to_string());
        }
    }
}

fn validate_timing(config: &toml::Value, errors: &mut Vec<String>) {
    for key in ["start_duration_ms", "home_duration_ms"] {
        if let Some(ms) = integer(config, "timing", key) {
            if !(1..=60_000).contains(&ms) {
                errors.push(format!("[timing] {} must be 1-60000", key));
            }
        }
    }
    if let Some(rate) = integer(config, "timing", "cycles_per_minute") {
        if !(1..=600).contains(&rate) {
            errors.push("[timing] cycles_per_minute must be 1-600".to_string());
        }
    }
}

fn validate_servo(config: &toml::Value, errors: &mut Vec<String>) {
    let count = integer(config, "tester", "station_count").unwrap_or(4);
    if let Some(base) = integer(config, "servo", "base_id") {
        if base < 0 || base + count - 1 > MAX_SERVO_ID {
            errors.push(format!(
                "[servo] base_id + station_count - 1 must not exceed {}",
                MAX_SERVO_ID
            ));
        }
    }
    if let Some(torque) = number(config, "servo", "torque_percent") {
        if !(0.0..=100.0).contains(&torque) {
            errors.push("[servo] torque_percent must be 0-100".to_string());
        }
    }
    for key in ["home_degrees", "engage_degrees"] {
        if let Some(angle) = number(config, "servo", key) {
            if !(-360.0..=360.0).contains(&angle) {
                errors.push(format!("[servo] {} must be within +/-360", key));
            }
        }
    }
}

fn validate_adc(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(volts) = number(config, "adc", "reference_volts") {
        if volts <= 0.0 {
            errors.push("[adc] reference_volts must be positive".to_string());
        }
    }
    if let Some(max) = integer(config, "adc", "max_raw") {
        if !(1..=i64::from(u16::MAX)).contains(&max) {
            errors.push("[adc] max_raw must be 1-65535".to_string());
        }
    }
    if let Some(samples) = integer(config, "adc", "calibration_samples") {
        if !(1..=10_000).contains(&samples) {
            errors.push("[adc] calibration_samples must be 1-10000".to_string());
        }
    }
}

fn validate_channel(config: &toml::Value, section: &str, errors: &mut Vec<String>) {
    if let Some(gain) = number(config, section, "gain_amps_per_volt") {
        if gain <= 0.0 {
            errors.push(format!("[{}] gain_amps_per_volt must be positive", section));
        }
    }
    if let Some(min) = number(config, section, "min_peak_amps") {
        if min < 0.0 {
            errors.push(format!("[{}] min_peak_amps must not be negative", section));
        }
    }
}
