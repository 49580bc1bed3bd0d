//! Host commands
//!
//! Commands are single ASCII lines, case-sensitive, with colon-separated
//! unsigned decimal arguments. Surrounding whitespace is ignored.

use heapless::Vec;

use crate::notice::{echo, Echo};
use crate::MAX_STATE_VALUES;

/// Values carried by a `STATE:` command, alternating cycles and failures
pub type StateValues = Vec<u32, MAX_STATE_VALUES>;

/// A parsed host command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Begin cycling
    Start,
    /// Stop cycling after abandoning the current cycle
    Stop,
    /// Put a station back into rotation
    Enable(u8),
    /// Remove a station from rotation
    Disable(u8),
    /// Overwrite every station's counters: `c0, f0, c1, f1, ...`
    State(StateValues),
    /// Zero one station's cycle counter
    ResetCycles(u8),
    /// Zero one station's failure counter
    ResetFailures(u8),
    /// Report running flag and every station
    RequestState,
}

/// Reasons a line could not be turned into a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// No command matches the line
    Unrecognized(Echo),
    /// Command matched but an argument is not a valid unsigned number
    InvalidArgument(Echo),
    /// `STATE:` carried more values than any station table can hold
    TooManyValues(usize),
}

impl Command {
    /// Parse one line (without its terminator)
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();

        match line {
            "START" => return Ok(Command::Start),
            "STOP" => return Ok(Command::Stop),
            "REQUEST_STATE" => return Ok(Command::RequestState),
            _ => {}
        }

        let Some((name, args)) = line.split_once(':') else {
            return Err(CommandError::Unrecognized(echo(line)));
        };

        let station = |args: &str| {
            parse_u32(args)
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| CommandError::InvalidArgument(echo(line)))
        };

        match name {
            "ENABLE" => station(args).map(Command::Enable),
            "DISABLE" => station(args).map(Command::Disable),
            "RESET_CYCLE" => station(args).map(Command::ResetCycles),
            "RESET_FAIL" => station(args).map(Command::ResetFailures),
            "STATE" => parse_state(line, args).map(Command::State),
            _ => Err(CommandError::Unrecognized(echo(line))),
        }
    }
}

fn parse_state(line: &str, args: &str) -> Result<StateValues, CommandError> {
    let mut values = StateValues::new();
    if args.is_empty() {
        return Ok(values);
    }

    let count = args.split(':').count();
    if count > MAX_STATE_VALUES {
        return Err(CommandError::TooManyValues(count));
    }

    for (position, field) in args.split(':').enumerate() {
        let value = parse_u32(field).ok_or_else(|| CommandError::InvalidArgument(echo(line)))?;
        // Odd positions are failure counters, which are 16-bit
        if position % 2 == 1 && value > u16::MAX as u32 {
            return Err(CommandError::InvalidArgument(echo(line)));
        }
        // Count checked above
        let _ = values.push(value);
    }

    Ok(values)
}

/// Parse a plain unsigned decimal (no sign, no whitespace)
fn parse_u32(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }
    text.bytes().try_fold(0u32, |acc, b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((b - b'0') as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_commands() {
        assert_eq!(Command::parse("START"), Ok(Command::Start));
        assert_eq!(Command::parse("STOP"), Ok(Command::Stop));
        assert_eq!(Command::parse("REQUEST_STATE"), Ok(Command::RequestState));
        assert_eq!(Command::parse("  START \t"), Ok(Command::Start));
    }

    #[test]
    fn test_station_commands() {
        assert_eq!(Command::parse("ENABLE:2"), Ok(Command::Enable(2)));
        assert_eq!(Command::parse("DISABLE:0"), Ok(Command::Disable(0)));
        assert_eq!(Command::parse("RESET_CYCLE:3"), Ok(Command::ResetCycles(3)));
        assert_eq!(Command::parse("RESET_FAIL:1"), Ok(Command::ResetFailures(1)));
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(
            Command::parse("start"),
            Err(CommandError::Unrecognized(echo("start")))
        );
        assert!(matches!(
            Command::parse("enable:1"),
            Err(CommandError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_bad_arguments() {
        for line in ["ENABLE:", "ENABLE:x", "ENABLE:-1", "ENABLE:+1", "ENABLE:256", "ENABLE:1:2"] {
            assert_eq!(
                Command::parse(line),
                Err(CommandError::InvalidArgument(echo(line))),
                "{}",
                line
            );
        }
    }

    #[test]
    fn test_state_values() {
        let cmd = Command::parse("STATE:10:1:20:0:30:2:40:3").unwrap();
        let Command::State(values) = cmd else {
            panic!("expected STATE");
        };
        assert_eq!(values.as_slice(), &[10, 1, 20, 0, 30, 2, 40, 3]);
    }

    #[test]
    fn test_state_empty_payload() {
        assert_eq!(Command::parse("STATE:"), Ok(Command::State(StateValues::new())));
    }

    #[test]
    fn test_state_rejects_bad_value() {
        assert!(matches!(
            Command::parse("STATE:1:2:x:4"),
            Err(CommandError::InvalidArgument(_))
        ));
        assert!(matches!(
            Command::parse("STATE:1::3:4"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_state_failure_count_limit() {
        assert!(Command::parse("STATE:70000:65535").is_ok());
        assert!(matches!(
            Command::parse("STATE:1:65536"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_state_too_many_values() {
        let line = "STATE:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1:1";
        assert_eq!(Command::parse(line), Err(CommandError::TooManyValues(17)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("FOO:1"),
            Err(CommandError::Unrecognized(echo("FOO:1")))
        );
        assert_eq!(
            Command::parse("HELLO"),
            Err(CommandError::Unrecognized(echo("HELLO")))
        );
    }

    proptest! {
        #[test]
        fn prop_enable_accepts_any_u8(n in any::<u8>()) {
            let mut line = heapless::String::<16>::new();
            core::fmt::write(&mut line, format_args!("ENABLE:{}", n)).unwrap();
            prop_assert_eq!(Command::parse(&line), Ok(Command::Enable(n)));
        }

        #[test]
        fn prop_parse_u32_matches_decimal(n in any::<u32>()) {
            let mut text = heapless::String::<16>::new();
            core::fmt::write(&mut text, format_args!("{}", n)).unwrap();
            prop_assert_eq!(parse_u32(&text), Some(n));
        }
    }
}
