// src/config/duration.rs

//! Duration strings used by program specs: a whole number followed by
//! `ms`, `s`, `m` or `h` (`"250ms"`, `"10s"`, `"2m"`, `"1h"`).

use std::time::Duration;

use crate::errors::{Result, SupervisorError};

/// Parse `raw` as a duration for spec field `field`.
///
/// Failures, including values too large to represent, come back as
/// `Validation` errors naming `field`.
pub fn parse_duration(field: &'static str, raw: &str) -> Result<Duration> {
    let text = raw.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);

    if digits.is_empty() {
        return Err(SupervisorError::validation(
            field,
            format!("'{raw}' must start with a whole number"),
        ));
    }
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(SupervisorError::validation(
            field,
            format!("'{raw}' is missing a unit (ms, s, m or h)"),
        ));
    }

    let millis_per_unit: u64 = match unit.to_ascii_lowercase().as_str() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(SupervisorError::validation(
                field,
                format!("unknown unit '{other}' in '{raw}'; use ms, s, m or h"),
            ));
        }
    };

    let too_large = || SupervisorError::validation(field, format!("'{raw}' is too large"));
    let value: u64 = digits.parse().map_err(|_| too_large())?;
    let millis = value.checked_mul(millis_per_unit).ok_or_else(too_large)?;
    Ok(Duration::from_millis(millis))
}
