//! Time constants and parsing helpers shared by filters and backends.

use crate::BgpStreamError;
use chrono::DateTime;
use std::time::{SystemTime, UNIX_EPOCH};

/// Marks the open end of a live interval.
pub const FOREVER: u32 = u32::MAX;

/// Current time as POSIX seconds.
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Parse a duration specifier of the form `\d+[smhdw]?` into seconds.
///
/// A bare number is seconds: `"3600"` and `"1h"` are equivalent.
pub fn parse_duration(spec: &str) -> Result<u32, BgpStreamError> {
    let spec = spec.trim();
    let (digits, unit) = match spec.chars().last() {
        Some(c) if c.is_ascii_digit() => (spec, 's'),
        Some(c) => (&spec[..spec.len() - 1], c),
        None => {
            return Err(BgpStreamError::InvalidFilter(
                "empty duration specifier".to_string(),
            ))
        }
    };

    let value: u32 = digits.parse().map_err(|_| {
        BgpStreamError::InvalidFilter(format!("invalid duration specifier: {}", spec))
    })?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 7 * 86400,
        _ => {
            return Err(BgpStreamError::InvalidFilter(format!(
                "invalid duration unit in specifier: {}",
                spec
            )))
        }
    };

    value.checked_mul(multiplier).ok_or_else(|| {
        BgpStreamError::InvalidFilter(format!("duration specifier overflows: {}", spec))
    })
}

/// Parse a timestamp string: either POSIX seconds or an RFC3339 datetime.
pub fn parse_timestamp(time_str: &str) -> Result<u32, BgpStreamError> {
    if let Ok(unix_timestamp) = time_str.parse::<u32>() {
        return Ok(unix_timestamp);
    }

    DateTime::parse_from_rfc3339(time_str)
        .map(|t| t.timestamp() as u32)
        .map_err(|_| BgpStreamError::InvalidFilter(format!("invalid timestamp: {}", time_str)))
}
