// Date normalization: structured dates, magic keywords and revision-control
// `$Date` keywords to ISO 8601.

use crate::error::{GeoMcfError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_KEYWORD: &str = "$date$";
const YEAR_KEYWORD: &str = "$year$";
const REVISION_KEYWORD: &str = "$Date";

lazy_static! {
    static ref KEYWORD_YEAR: Regex = Regex::new(r"^(?P<year>\d{4})").unwrap();
    static ref KEYWORD_TIMESTAMP: Regex = Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2}) (?P<time>\d{2}:\d{2}:\d{2})(?:\s+(?P<offset>[+-]\d{4}))?"
    )
    .unwrap();
    static ref EMBEDDED_KEYWORD: Regex =
        Regex::new(r"(?s)^(?P<start>.*?)\$Date: (?P<keyword>[^$]*)\$(?P<end>.*)$").unwrap();
}

/// Output shape for revision-control `$Date` keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFormat {
    /// Full `YYYY-MM-DDTHH:MM:SSZ` timestamp
    #[default]
    Default,
    /// Four-digit year only
    Year,
}

impl FromStr for DateFormat {
    type Err = GeoMcfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(DateFormat::Default),
            "year" => Ok(DateFormat::Year),
            other => Err(GeoMcfError::Config(format!(
                "unknown date format '{other}' (expected 'default' or 'year')"
            ))),
        }
    }
}

/// A value handed to the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    Date(NaiveDate),
    /// A UTC date and time
    DateTime(NaiveDateTime),
    Text(String),
}

impl DateValue {
    /// Classify a YAML scalar the way a YAML loader types it: timestamps
    /// become structured values, everything else stays text.
    pub fn parse_yaml(text: &str) -> DateValue {
        let trimmed = text.trim();

        if trimmed.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return DateValue::Date(date);
            }
        }

        if trimmed.len() > 10 && trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            let normalized = if trimmed.as_bytes()[10] == b' ' {
                format!("{}T{}", &trimmed[..10], &trimmed[11..])
            } else {
                trimmed.to_string()
            };

            if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
                return DateValue::DateTime(dt.naive_utc());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
                return DateValue::DateTime(dt);
            }
        }

        DateValue::Text(text.to_string())
    }
}

impl From<&str> for DateValue {
    fn from(value: &str) -> Self {
        DateValue::Text(value.to_string())
    }
}

impl From<String> for DateValue {
    fn from(value: String) -> Self {
        DateValue::Text(value)
    }
}

impl From<NaiveDate> for DateValue {
    fn from(value: NaiveDate) -> Self {
        DateValue::Date(value)
    }
}

impl From<NaiveDateTime> for DateValue {
    fn from(value: NaiveDateTime) -> Self {
        DateValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for DateValue {
    fn from(value: DateTime<Utc>) -> Self {
        DateValue::DateTime(value.naive_utc())
    }
}

/// Normalize a date value to ISO 8601 using the current UTC time for the
/// `$date$` and `$year$` keywords.
pub fn normalize_datestring(value: impl Into<DateValue>, format: DateFormat) -> Result<String> {
    normalize_datestring_at(value, format, Utc::now())
}

/// Normalize a date value against an explicit clock.
///
/// Structured values are formatted as `YYYY-MM-DDTHH:MM:SSZ`, with the time
/// dropped at midnight. Text is checked for `$date$`, `$year$` (whole or
/// embedded) and `$Date: ...$` keywords; anything else is returned unchanged.
pub fn normalize_datestring_at(
    value: impl Into<DateValue>,
    format: DateFormat,
    now: DateTime<Utc>,
) -> Result<String> {
    match value.into() {
        DateValue::Date(date) => Ok(date.format("%Y-%m-%d").to_string()),
        DateValue::DateTime(dt) => {
            if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                Ok(dt.format("%Y-%m-%d").to_string())
            } else {
                Ok(dt.format(TIMESTAMP_FORMAT).to_string())
            }
        }
        DateValue::Text(text) => normalize_text(&text, format, now),
    }
}

fn normalize_text(text: &str, format: DateFormat, now: DateTime<Utc>) -> Result<String> {
    let year = now.format("%Y").to_string();

    if text == DATE_KEYWORD {
        return Ok(now.format(TIMESTAMP_FORMAT).to_string());
    }
    if text == YEAR_KEYWORD {
        return Ok(year);
    }
    if text.contains(YEAR_KEYWORD) {
        return Ok(text.replace(YEAR_KEYWORD, &year));
    }

    if text.starts_with(REVISION_KEYWORD) {
        let keyword = text
            .strip_prefix("$Date: ")
            .ok_or_else(|| invalid(text))?;
        return render_keyword(keyword, format).ok_or_else(|| invalid(text));
    }

    if text.contains(REVISION_KEYWORD) {
        let caps = EMBEDDED_KEYWORD
            .captures(text)
            .ok_or_else(|| invalid(text))?;
        let rendered = render_keyword(&caps["keyword"], format).ok_or_else(|| invalid(text))?;
        return Ok(format!("{}{}{}", &caps["start"], rendered, &caps["end"]));
    }

    Ok(text.to_string())
}

/// Render the body of a `$Date: ...` keyword (everything after `$Date: `).
fn render_keyword(keyword: &str, format: DateFormat) -> Option<String> {
    match format {
        DateFormat::Year => KEYWORD_YEAR
            .captures(keyword)
            .map(|caps| caps["year"].to_string()),
        DateFormat::Default => keyword_timestamp(keyword),
    }
}

/// `YYYY-MM-DD HH:MM:SS [+-HHMM]` to a UTC timestamp.
fn keyword_timestamp(keyword: &str) -> Option<String> {
    let caps = KEYWORD_TIMESTAMP.captures(keyword)?;
    let local = NaiveDateTime::parse_from_str(
        &format!("{} {}", &caps["date"], &caps["time"]),
        "%Y-%m-%d %H:%M:%S",
    )
    .ok()?;

    let utc = match caps.name("offset") {
        Some(offset) => {
            let offset = parse_offset(offset.as_str())?;
            offset
                .from_local_datetime(&local)
                .single()?
                .with_timezone(&Utc)
        }
        None => Utc.from_utc_datetime(&local),
    };

    Some(utc.format(TIMESTAMP_FORMAT).to_string())
}

/// `+HHMM` / `-HHMM`
fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let hours: i32 = offset.get(1..3)?.parse().ok()?;
    let minutes: i32 = offset.get(3..5)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn invalid(value: &str) -> GeoMcfError {
    GeoMcfError::InvalidDate {
        value: value.to_string(),
    }
}
