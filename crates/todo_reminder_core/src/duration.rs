//! crates/todo_reminder_core/src/duration.rs
//!
//! Parses compact offsets such as `10m` or `2d` into a signed delay.

use crate::domain::{CoreError, CoreResult};
use chrono::TimeDelta;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Seconds per unit symbol. `m` (minutes) and `M` (months) are distinct.
fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        's' => Some(1),
        'm' => Some(MINUTE),
        'h' => Some(HOUR),
        'd' => Some(DAY),
        'w' => Some(7 * DAY),
        'M' => Some(30 * DAY),
        'y' => Some(365 * DAY),
        _ => None,
    }
}

/// Parses `<integer><unit>` into a delay.
///
/// The magnitude goes through plain integer parsing, so `0m` and `-5m` are
/// accepted and yield a zero or negative delay.
pub fn parse_duration(text: &str) -> CoreResult<TimeDelta> {
    let invalid = || CoreError::InvalidFormat(text.to_string());

    let unit = text.chars().next_back().ok_or_else(invalid)?;
    let magnitude = &text[..text.len() - unit.len_utf8()];

    let per_unit = unit_seconds(unit).ok_or_else(invalid)?;
    let value: i64 = magnitude.parse().map_err(|_| invalid())?;

    value
        .checked_mul(per_unit)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(invalid)
}
