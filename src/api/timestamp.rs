//! Fixed timestamp format used by API response bodies.
//!
//! The backend emits `yyyy-MM-dd'T'HH:mm:ss.SSSSSSX`: exactly six fractional
//! digits followed by `Z`, `±HH` or `±HHMM`. Anything else fails to decode
//! rather than being truncated or guessed.
//!
//! Use with `#[serde(with = "crate::api::timestamp")]`, or
//! `crate::api::timestamp::option` for optional fields.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const FRACTION_DIGITS: usize = 6;

/// Parses a timestamp in the fixed API format into UTC.
pub fn parse(value: &str) -> Result<DateTime<Utc>, String> {
    let (local, offset_seconds) = split_zone(value)?;

    let fraction = local
        .rsplit_once('.')
        .map(|(_, fraction)| fraction)
        .ok_or_else(|| format!("timestamp '{value}' has no fractional seconds"))?;
    if fraction.len() != FRACTION_DIGITS || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!(
            "timestamp '{value}' must have exactly {FRACTION_DIGITS} fractional digits"
        ));
    }

    let naive = NaiveDateTime::parse_from_str(local, DATE_TIME_FORMAT)
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))?;
    let offset = FixedOffset::east_opt(offset_seconds)
        .ok_or_else(|| format!("invalid zone offset in '{value}'"))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous timestamp '{value}'"))
}

/// Formats a UTC timestamp in the fixed API format.
pub fn format(value: &DateTime<Utc>) -> String {
    format!("{}Z", value.format(DATE_TIME_FORMAT))
}

/// Splits the trailing zone designator off, returning the local part and
/// the offset in seconds east of UTC.
fn split_zone(value: &str) -> Result<(&str, i32), String> {
    if let Some(local) = value.strip_suffix('Z') {
        return Ok((local, 0));
    }

    // The zone sign can only follow the time part, never the date.
    let time_start = value
        .find('T')
        .ok_or_else(|| format!("timestamp '{value}' has no time part"))?;
    let sign_index = value[time_start..]
        .rfind(['+', '-'])
        .map(|i| i + time_start)
        .ok_or_else(|| format!("timestamp '{value}' has no zone designator"))?;

    let (local, zone) = value.split_at(sign_index);
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits = &zone[1..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid zone designator in '{value}'"));
    }

    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(format!("invalid zone designator in '{value}'")),
    };
    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid zone hours in '{value}'"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid zone minutes in '{value}'"))?;

    Ok((local, sign * (hours * 3600 + minutes * 60)))
}

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Optional variant: `null` or a missing field decode to `None`.
pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&super::format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
