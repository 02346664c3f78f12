//! Local date-time text handling.
//!
//! Appointment times are wall-clock times in the clinic's local zone and carry no offset.
//! They are written as `YYYY-MM-DDTHH:MM:SS` (fractional seconds only when non-zero);
//! reading also accepts the minute-precision `YYYY-MM-DDTHH:MM` form.

use crate::{ClinicError, ClinicResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const READ_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn parse_local_datetime(input: &str) -> ClinicResult<NaiveDateTime> {
    let trimmed = input.trim();
    READ_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ClinicError::InvalidTimestamp(input.to_string()))
}

pub fn parse_date(input: &str) -> ClinicResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ClinicError::InvalidTimestamp(input.to_string()))
}

pub fn format_local_datetime(value: &NaiveDateTime) -> String {
    value.format(WRITE_FORMAT).to_string()
}

/// Serde adapter for a required local date-time.
pub mod local_datetime {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_local_datetime(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_local_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for an optional local date-time. An empty string reads as absent.
pub mod opt_local_datetime {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&format_local_datetime(v)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_local_datetime(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Patch adapter: a present field is `Some(value)`. Pair with `#[serde(default)]` so an
/// absent field stays `None`.
pub(crate) fn patch_datetime<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    local_datetime::deserialize(d).map(Some)
}

/// Patch adapter for clearable fields: absent is `None`, `null` or `""` is
/// `Some(None)`, a value is `Some(Some(value))`.
pub(crate) fn patch_opt_datetime<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Option<NaiveDateTime>>, D::Error> {
    opt_local_datetime::deserialize(d).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds_and_minutes() {
        let a = parse_local_datetime("2025-07-15T10:00:00").unwrap();
        let b = parse_local_datetime("2025-07-15T10:00").unwrap();

        assert_eq!(a, b);
        assert_eq!(format_local_datetime(&a), "2025-07-15T10:00:00");
    }

    #[test]
    fn test_fractional_seconds_survive_formatting() {
        let a = parse_local_datetime("2025-07-15T10:00:00.250").unwrap();
        let written = format_local_datetime(&a);

        assert_eq!(parse_local_datetime(&written).unwrap(), a);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_local_datetime("next tuesday"),
            Err(ClinicError::InvalidTimestamp(_))
        ));
        assert!(parse_local_datetime("2025-13-01T10:00").is_err());
    }

    #[test]
    fn test_parse_date() {
        let d = parse_date("1990-05-10").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(1990, 5, 10).unwrap());
        assert!(parse_date("10/05/1990").is_err());
    }
}
