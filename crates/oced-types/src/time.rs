use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Instant at which an event happened.
///
/// Parsed from an ISO-8601 string and normalized to an absolute, epoch-based
/// instant so that events recorded with different offsets compare correctly.
/// Inputs without an offset are resolved in the local timezone of the
/// process. Rendered as RFC 3339 in UTC.
///
/// Ordering is chronological and total.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTime(DateTime<Utc>);

impl EventTime {
    /// Parse an ISO-8601 instant.
    ///
    /// Accepted forms: RFC 3339 (`2024-01-01T10:00:00+02:00`, `...Z`), the
    /// same with a space separator, naive date-times with optional
    /// fractional seconds, and plain dates (midnight local time).
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let trimmed = input.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        for format in OFFSET_FORMATS {
            if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
                return Ok(Self(parsed.with_timezone(&Utc)));
            }
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| TypeError::InvalidTime {
                input: input.to_string(),
                reason: "not an ISO-8601 date or date-time".into(),
            })?;

        Self::from_local_naive(naive).ok_or_else(|| TypeError::InvalidTime {
            input: input.to_string(),
            reason: "local time does not exist in this timezone".into(),
        })
    }

    /// Resolve a wall-clock time in the local timezone. Ambiguous times
    /// (DST fall-back) resolve to the earlier instant.
    pub fn from_local_naive(naive: NaiveDateTime) -> Option<Self> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| Self(local.with_timezone(&Utc)))
    }

    /// Build from microseconds since the UNIX epoch.
    pub fn from_timestamp_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Self)
    }

    pub fn timestamp_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 rendering in UTC, keeping sub-second precision when present.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Returns `true` if this instant is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl FromStr for EventTime {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTime({})", self.to_rfc3339())
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn offsets_normalize_to_the_same_instant() {
        let utc = EventTime::parse("2024-03-01T10:00:00Z").unwrap();
        let plus_two = EventTime::parse("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(utc, plus_two);
        assert_eq!(plus_two.to_rfc3339(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn space_separator_with_offset() {
        let a = EventTime::parse("2024-03-01 10:00:00+00:00").unwrap();
        let b = EventTime::parse("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn naive_input_resolves_in_local_timezone() {
        let parsed = EventTime::parse("2024-03-01T10:00:00").unwrap();
        let naive =
            NaiveDateTime::parse_from_str("2024-03-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let expected = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed.as_datetime(), &expected);
    }

    #[test]
    fn plain_date_is_local_midnight() {
        let date = EventTime::parse("2024-03-01").unwrap();
        let midnight = EventTime::parse("2024-03-01T00:00:00").unwrap();
        assert_eq!(date, midnight);
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let t = EventTime::parse("2024-03-01T10:00:00.250Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T10:00:00.250Z");
        assert!(t.is_after(&EventTime::parse("2024-03-01T10:00:00Z").unwrap()));
    }

    #[test]
    fn garbage_is_rejected() {
        for input in ["", "yesterday", "2024-13-01T00:00:00Z", "10:00"] {
            assert!(
                matches!(EventTime::parse(input), Err(TypeError::InvalidTime { .. })),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn serde_uses_rfc3339_strings() {
        let t = EventTime::parse("2024-03-01T10:00:00Z").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2024-03-01T10:00:00Z\"");
        let parsed: EventTime = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, t);
    }

    proptest! {
        #[test]
        fn rendering_parses_back_to_the_same_instant(micros in 0i64..4_102_444_800_000_000) {
            let t = EventTime::from_timestamp_micros(micros).unwrap();
            let reparsed = EventTime::parse(&t.to_rfc3339()).unwrap();
            prop_assert_eq!(reparsed, t);
            prop_assert_eq!(reparsed.timestamp_micros(), micros);
        }
    }
}
