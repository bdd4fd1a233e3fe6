//! Calendar parsing and registry date (de)serialization.
//!
//! Registry files written by older tooling encode dates as component arrays
//! (`[2025, 11, 15]`, `[2025, 11, 15, 8, 30]`); current files use ISO strings.
//! Both are accepted on read, strings are always written.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer};

#[allow(clippy::expect_used)]
static DDMMYY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{2})$").expect("ddmmyy regex is valid"));

#[allow(clippy::expect_used)]
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso date regex is valid"));

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses an exact `dd/mm/yy` string.
///
/// Two-digit years 00-49 map to 20xx and 50-99 to 19xx. Returns `None` for
/// anything that is not a valid calendar date.
#[must_use]
pub fn parse_ddmmyy(text: &str) -> Option<NaiveDate> {
    let caps = DDMMYY.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let short_year: i32 = caps[3].parse().ok()?;
    let year = if short_year < 50 {
        2000 + short_year
    } else {
        1900 + short_year
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Finds the first `YYYY-MM-DD` token in `text` that is a valid date.
#[must_use]
pub fn find_iso_date(text: &str) -> Option<NaiveDate> {
    let caps = ISO_DATE.captures(text)?;
    NaiveDate::parse_from_str(&caps[0], DATE_FORMAT).ok()
}

/// Converts epoch milliseconds to a UTC timestamp.
#[must_use]
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Text(String),
    Parts(Vec<i64>),
}

fn component<T: TryFrom<i64>>(parts: &[i64], index: usize) -> Option<T> {
    parts.get(index).copied().map_or_else(
        || T::try_from(0).ok(),
        |value| T::try_from(value).ok(),
    )
}

fn date_from_parts(parts: &[i64]) -> Option<NaiveDate> {
    if parts.len() < 3 {
        return None;
    }
    NaiveDate::from_ymd_opt(
        component(parts, 0)?,
        component(parts, 1)?,
        component(parts, 2)?,
    )
}

fn date_time_from_parts(parts: &[i64]) -> Option<NaiveDateTime> {
    let date = date_from_parts(parts)?;
    let time = NaiveTime::from_hms_nano_opt(
        component(parts, 3)?,
        component(parts, 4)?,
        component(parts, 5)?,
        component(parts, 6)?,
    )?;
    Some(date.and_time(time))
}

fn date_time_from_text(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Serde adapter for `Option<NaiveDate>` fields.
pub mod optional_date {
    use super::{DATE_FORMAT, Deserialize, Deserializer, NaiveDate, Repr, Serializer};
    use super::date_from_parts;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let repr = Option::<Repr>::deserialize(deserializer)?;
        match repr {
            None => Ok(None),
            Some(Repr::Text(text)) if text.is_empty() => Ok(None),
            Some(Repr::Text(text)) => NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid date {text:?}: {e}"))),
            Some(Repr::Parts(parts)) => date_from_parts(&parts)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date {parts:?}"))),
        }
    }
}

/// Serde adapter for `Option<NaiveDateTime>` fields.
pub mod optional_date_time {
    use super::{DATE_TIME_FORMAT, Deserialize, Deserializer, NaiveDateTime, Repr, Serializer};
    use super::{date_time_from_parts, date_time_from_text};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.format(DATE_TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let repr = Option::<Repr>::deserialize(deserializer)?;
        match repr {
            None => Ok(None),
            Some(Repr::Text(text)) if text.is_empty() => Ok(None),
            Some(Repr::Text(text)) => date_time_from_text(&text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date-time {text:?}"))),
            Some(Repr::Parts(parts)) => date_time_from_parts(&parts)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date-time {parts:?}"))),
        }
    }
}
