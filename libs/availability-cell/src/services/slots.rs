//! Canonical slot times and the conversions between display and wire form.
//!
//! Everything here is wall-clock string manipulation: no locale, no time zone.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

/// The ten bookable times of a provider's day, morning then afternoon.
pub const CANONICAL_SLOT_TIMES: [&str; 10] = [
    "07:00:00", "08:00:00", "09:00:00", "10:00:00", "11:00:00",
    "13:00:00", "14:00:00", "15:00:00", "16:00:00", "17:00:00",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotFormatError {
    #[error("Unrecognised time '{0}'")]
    UnrecognisedTime(String),

    #[error("Time '{0}' is out of range")]
    OutOfRange(String),

    #[error("Time '{0}' is not one of the bookable slots")]
    NotASlot(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

fn twelve_hour_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([AaPp][Mm])\s*$")
            .expect("valid 12-hour pattern")
    })
}

fn twenty_four_hour_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\s*$")
            .expect("valid 24-hour pattern")
    })
}

fn field(caps: &regex::Captures<'_>, index: usize) -> u32 {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn parse_24h(input: &str) -> Result<(u32, u32, u32), SlotFormatError> {
    let caps = twenty_four_hour_pattern()
        .captures(input)
        .ok_or_else(|| SlotFormatError::UnrecognisedTime(input.to_string()))?;

    let (hour, minute, second) = (field(&caps, 1), field(&caps, 2), field(&caps, 3));
    if hour > 23 || minute > 59 || second > 59 {
        return Err(SlotFormatError::OutOfRange(input.to_string()));
    }
    Ok((hour, minute, second))
}

/// `HH:MM[:SS]` to `h:mm AM/PM`. Midnight renders as `12:00 AM`.
pub fn to_display_time(canonical: &str) -> Result<String, SlotFormatError> {
    let (hour, minute, _) = parse_24h(canonical)?;

    let (display_hour, suffix) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };

    Ok(format!("{}:{:02} {}", display_hour, minute, suffix))
}

/// `h:mm[:ss] AM/PM` (or already 24-hour input) to `HH:MM:SS`.
pub fn to_canonical(display: &str) -> Result<String, SlotFormatError> {
    let (hour, minute, second) = match twelve_hour_pattern().captures(display) {
        Some(caps) => {
            let (hour, minute, second) = (field(&caps, 1), field(&caps, 2), field(&caps, 3));
            if !(1..=12).contains(&hour) || minute > 59 || second > 59 {
                return Err(SlotFormatError::OutOfRange(display.to_string()));
            }

            let is_pm = caps
                .get(4)
                .map(|m| m.as_str().eq_ignore_ascii_case("pm"))
                .unwrap_or(false);

            let hour = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            (hour, minute, second)
        }
        None => parse_24h(display)?,
    };

    Ok(format!("{:02}:{:02}:{:02}", hour, minute, second))
}

pub fn is_canonical_slot(time: &str) -> bool {
    CANONICAL_SLOT_TIMES.contains(&time)
}

/// Normalise any accepted time spelling and require it to be a bookable slot.
pub fn canonical_slot(time: &str) -> Result<&'static str, SlotFormatError> {
    let canonical = to_canonical(time)?;
    CANONICAL_SLOT_TIMES
        .iter()
        .copied()
        .find(|slot| *slot == canonical)
        .ok_or(SlotFormatError::NotASlot(canonical))
}

/// Checks a `YYYY-MM-DD` date. Only the zero-padded spelling is accepted, so
/// the string can be compared against stored rows as-is.
pub fn validate_date(date: &str) -> Result<NaiveDate, SlotFormatError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| SlotFormatError::InvalidDate(date.to_string()))?;

    if parsed.format("%Y-%m-%d").to_string() != date {
        return Err(SlotFormatError::InvalidDate(date.to_string()));
    }
    Ok(parsed)
}

/// Whether two date strings name the same calendar day.
pub fn same_date(a: &str, b: &str) -> bool {
    match (
        NaiveDate::parse_from_str(a, "%Y-%m-%d"),
        NaiveDate::parse_from_str(b, "%Y-%m-%d"),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
