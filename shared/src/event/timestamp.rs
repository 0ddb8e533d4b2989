//! Commit timestamp parsing and formatting.
//!
//! Input is any ISO-8601 style timestamp with a mandatory date and time;
//! fractional seconds and the offset are optional (a missing offset means
//! UTC). wal2json emits `2022-07-07 14:52:58.092695+00`. Output is always
//! `2022-07-07T14:52:58.092695Z`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a commit timestamp into UTC.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NAIVE_FORMATS[1]) {
        return Ok(naive.and_utc());
    }
    NaiveDateTime::parse_from_str(s, NAIVE_FORMATS[0]).map(|naive| naive.and_utc())
}

/// Format a timestamp the way it appears in the output record.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(OUTPUT_FORMAT).to_string()
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}
