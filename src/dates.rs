//! Date normalization.
//!
//! Every source reports publication dates differently: RFC 822 in feeds,
//! ISO-8601 with or without an offset in `datetime` attributes and REST
//! payloads, and free text such as `8 March 2024` on HTML listings. This
//! module turns all of them into an aware UTC timestamp, or fails explicitly.
//!
//! Naive input (no offset) is taken to be UTC already. That is lossy for
//! sites that print local time, but it keeps every source on one rule.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Serialization format of the ledger `date` column.
pub const LEDGER_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// Formats carrying an explicit offset, tried after RFC 3339 and RFC 2822.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d %B %Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %B %Y",
    "%d %B, %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d/%m/%Y",
];

static WEEKDAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").unwrap()
});

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());

/// Why a date string could not be normalized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("date text is empty")]
    Empty,
    #[error("unrecognized date format: {0:?}")]
    Unrecognized(String),
}

/// Parse a date in any supported representation into UTC.
///
/// Tried in order: RFC 3339, RFC 2822, ISO-8601 with a numeric offset,
/// naive ISO-8601 date-times and dates, then free-text forms after stripping
/// a leading weekday, ordinal suffixes (`Thursday, 22nd May 2025`) and
/// anything after a `|` separator.
///
/// # Errors
///
/// [`DateError::Empty`] for blank input, [`DateError::Unrecognized`] when no
/// format matches. There is no fallback to the current time.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>, DateError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DateError::Empty);
    }

    if let Some(dt) = parse_with_offset(text) {
        return Ok(dt);
    }
    if let Some(naive) = parse_naive(text) {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let cleaned = clean_free_text(text);
    if cleaned != text {
        if let Some(dt) = parse_with_offset(&cleaned) {
            return Ok(dt);
        }
        if let Some(naive) = parse_naive(&cleaned) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(DateError::Unrecognized(text.to_string()))
}

/// Render a timestamp in the ledger's fixed `YYYY-MM-DDTHH:MM:SS+00:00` form.
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format(LEDGER_DATE_FORMAT).to_string()
}

/// `true` when the timestamp's year is at or after the cutoff year.
pub fn meets_cutoff(dt: &DateTime<Utc>, min_year: i32) -> bool {
    dt.year() >= min_year
}

fn parse_with_offset(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn clean_free_text(text: &str) -> String {
    // Listing metadata such as `14 May 2025 03:05 PM | Events`.
    let text = text.split('|').next().unwrap_or(text);
    let text = WEEKDAY_PREFIX.replace(text, "");
    let text = ORDINAL_SUFFIX.replace_all(&text, "${1}");
    text.replace(" at ", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_rfc3339_with_offset_is_converted() {
        let dt = parse_datetime("2025-05-14T03:00:00+10:00").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 13, 17, 0, 0));

        let dt = parse_datetime("2025-05-14T03:00:00Z").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 3, 0, 0));
    }

    #[test]
    fn test_rfc2822_feed_dates() {
        let dt = parse_datetime("Wed, 14 May 2025 03:00:00 GMT").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 3, 0, 0));

        let dt = parse_datetime("Wed, 14 May 2025 13:00:00 +1000").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 3, 0, 0));
    }

    #[test]
    fn test_naive_iso_is_treated_as_utc() {
        let dt = parse_datetime("2025-05-14T03:00:00").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 3, 0, 0));

        let dt = parse_datetime("2025-05-14 03:00:00").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 3, 0, 0));

        let dt = parse_datetime("2025-05-14").unwrap();
        assert_eq!(dt, ymd_hms(2025, 5, 14, 0, 0, 0));
    }

    #[test]
    fn test_free_text_dates() {
        assert_eq!(parse_datetime("8 March 2024").unwrap(), ymd_hms(2024, 3, 8, 0, 0, 0));
        assert_eq!(parse_datetime("8 Mar 2024").unwrap(), ymd_hms(2024, 3, 8, 0, 0, 0));
        assert_eq!(parse_datetime("March 8, 2024").unwrap(), ymd_hms(2024, 3, 8, 0, 0, 0));
        assert_eq!(parse_datetime("Mar 8, 2024").unwrap(), ymd_hms(2024, 3, 8, 0, 0, 0));
        assert_eq!(
            parse_datetime("14 May 2025 3:05 PM").unwrap(),
            ymd_hms(2025, 5, 14, 15, 5, 0)
        );
    }

    #[test]
    fn test_weekday_and_ordinal_are_stripped() {
        assert_eq!(
            parse_datetime("Thursday, 8 May 2025").unwrap(),
            ymd_hms(2025, 5, 8, 0, 0, 0)
        );
        assert_eq!(parse_datetime("22nd May 2025").unwrap(), ymd_hms(2025, 5, 22, 0, 0, 0));
        assert_eq!(
            parse_datetime("  May 1st, 2025  ").unwrap(),
            ymd_hms(2025, 5, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_trailing_metadata_is_ignored() {
        assert_eq!(
            parse_datetime("14 May 2025 03:05 PM | Regulation").unwrap(),
            ymd_hms(2025, 5, 14, 15, 5, 0)
        );
    }

    #[test]
    fn test_unparseable_input_fails_explicitly() {
        assert_eq!(parse_datetime(""), Err(DateError::Empty));
        assert_eq!(parse_datetime("   "), Err(DateError::Empty));
        assert!(matches!(
            parse_datetime("yesterday-ish"),
            Err(DateError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_format_utc_matches_ledger_pattern() {
        let pattern = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\+00:00$").unwrap();
        let dt = parse_datetime("2025-05-14T03:00:00.999+09:30").unwrap();
        let formatted = format_utc(&dt);
        assert!(pattern.is_match(&formatted), "{formatted}");
        assert_eq!(formatted, "2025-05-13T17:30:00+00:00");
    }

    #[test]
    fn test_meets_cutoff() {
        assert!(!meets_cutoff(&ymd_hms(2024, 12, 31, 23, 59, 59), 2025));
        assert!(meets_cutoff(&ymd_hms(2025, 1, 1, 0, 0, 0), 2025));
        assert!(meets_cutoff(&ymd_hms(2026, 6, 1, 0, 0, 0), 2025));
    }
}
