//! Human-readable units for recorder configuration.
//!
//! Two independent micro-formats are used wherever a configuration value
//! crosses the wire:
//!
//! | Value    | Examples                    | Canonical output        |
//! |----------|-----------------------------|-------------------------|
//! | Duration | `2s`, `100ms`, `1h30m`, `1.5s` | `1m30s`, `100ms`, `0s` |
//! | Size     | `1048576`, `512B`, `64KB`, `1MB` | `1MB`, `64KB`, `0B`  |
//!
//! Sizes use binary multiples (`KB = 1024`, `MB = 1024 * 1024`).
//!
//! Formatting a size truncates to the largest whole unit, so
//! `format_size(parse_size("1MB")? + 1)` is `"1MB"` and the extra byte is not
//! representable in the output.

use std::fmt::Write;
use std::time::Duration;

use thiserror::Error;

/// One kilobyte (binary).
pub const KB: usize = 1024;

/// One megabyte (binary).
pub const MB: usize = 1024 * 1024;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

/// Units used when rendering a duration, largest first.
const DURATION_UNITS: [(&str, u128); 6] = [
    ("h", NANOS_PER_HOUR),
    ("m", NANOS_PER_MIN),
    ("s", NANOS_PER_SEC),
    ("ms", NANOS_PER_MILLI),
    ("us", NANOS_PER_MICRO),
    ("ns", 1),
];

/// Error returned when a textual unit value cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("{}", RejectedDuration(.0))]
    InvalidDuration(String),
    #[error("{}", RejectedSize(.0))]
    InvalidSize(String),
}

/// Message for a duration literal that failed to parse.
pub(crate) struct RejectedDuration<'a>(pub(crate) &'a str);

/// Message for a size literal that failed to parse.
pub(crate) struct RejectedSize<'a>(pub(crate) &'a str);

impl std::fmt::Display for RejectedDuration<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid period: {} should be a duration (e.g. 1s, 100ms, 1h)",
            self.0
        )
    }
}

impl std::fmt::Display for RejectedSize<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid size: {} should be an integer of bytes, or a memory unit (e.g. 1048576, 1MB, 1KB, 1B)",
            self.0
        )
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(NANOS_PER_MIN),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Parse a duration such as `"2s"`, `"100ms"` or `"1h30m"`.
///
/// The input is a sequence of decimal numbers, each with an optional fraction
/// and a mandatory unit suffix (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). The bare
/// literal `"0"` is accepted. Negative durations are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, UnitError> {
    let invalid = || UnitError::InvalidDuration(s.to_string());

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, after) = rest.split_at(int_len);
        let (frac_part, after) = match after.strip_prefix('.') {
            Some(after) => {
                let frac_len = after.bytes().take_while(u8::is_ascii_digit).count();
                after.split_at(frac_len)
            }
            None => ("", after),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);
        let scale = unit_nanos(unit).ok_or_else(invalid)?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;

        // Digits beyond nanosecond precision cannot change the result
        let mut fraction: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in frac_part.bytes() {
            if divisor > u64::MAX as u128 {
                break;
            }
            fraction = fraction * 10 + u128::from(digit - b'0');
            divisor *= 10;
        }
        nanos = nanos
            .checked_add(fraction * scale / divisor)
            .ok_or_else(invalid)?;

        total = total.checked_add(nanos).ok_or_else(invalid)?;
        rest = after;
    }

    let total = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(total))
}

/// Render a duration in its canonical compact form.
///
/// Every non-zero component from hours down to nanoseconds is emitted, so
/// `60s` renders as `"1m"` and `1500ms` as `"1s500ms"`. Zero renders as `"0s"`.
pub fn format_duration(duration: Duration) -> String {
    let mut nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (suffix, scale) in DURATION_UNITS {
        let count = nanos / scale;
        if count > 0 {
            let _ = write!(out, "{}{}", count, suffix);
            nanos %= scale;
        }
    }
    out
}

/// Parse a byte size: a bare integer, or an integer followed by `B`, `KB` or `MB`.
pub fn parse_size(s: &str) -> Result<usize, UnitError> {
    let invalid = || UnitError::InvalidSize(s.to_string());

    let trimmed = s.trim();
    let (digits, multiplier) = if let Some(digits) = trimmed.strip_suffix("MB") {
        (digits, MB)
    } else if let Some(digits) = trimmed.strip_suffix("KB") {
        (digits, KB)
    } else if let Some(digits) = trimmed.strip_suffix('B') {
        (digits, 1)
    } else {
        (trimmed, 1)
    };

    let value: usize = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Render a byte size using the largest unit it reaches.
///
/// Division truncates: `1MB + 1` renders as `"1MB"`.
pub fn format_size(size: usize) -> String {
    if size >= MB {
        format!("{}MB", size / MB)
    } else if size >= KB {
        format!("{}KB", size / KB)
    } else {
        format!("{}B", size)
    }
}
