//! Timestamp utilities
//!
//! Parses the timestamp spellings found in historian and logger CSV exports
//! into naive (UTC-normalised) datetimes, and formats them back for output.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Formats with a time component, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %I:%M:%S%.f %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S%.f",
    "%d-%b-%Y %H:%M",
];

/// Formats carrying an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Date-only formats (midnight).
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a single timestamp cell.
///
/// Offset-bearing values are converted to UTC and the offset dropped, so
/// every parsed value lives on the same naive timeline. Empty cells and bare
/// numbers are never timestamps.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() || !s.chars().any(|c| matches!(c, '-' | '/' | ':')) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }

    // Trailing Z with a space separator is not RFC 3339
    let s = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix(" UTC"))
        .unwrap_or(s)
        .trim_end();

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse the optional cutoff form value. Blank means no cutoff.
pub fn parse_cutoff(raw: &str) -> Option<NaiveDateTime> {
    parse_timestamp(raw)
}

/// Format a timestamp for CSV output and chart axes.
///
/// Sub-second precision is only written when present.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_parse_iso_variants() {
        let expected = dt(2024, 3, 5, 14, 7, 9);
        assert_eq!(parse_timestamp("2024-03-05 14:07:09"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:07:09"), Some(expected));
        assert_eq!(parse_timestamp("  2024-03-05 14:07:09  "), Some(expected));
        assert_eq!(parse_timestamp("2024/03/05 14:07:09"), Some(expected));
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let parsed = parse_timestamp("2024-03-05 14:07:09.250").unwrap();
        assert_eq!(parsed.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_offsets_normalise_to_utc() {
        let expected = dt(2024, 3, 5, 12, 0, 0);
        assert_eq!(parse_timestamp("2024-03-05T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05 07:00:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05 12:00:00Z"), Some(expected));
    }

    #[test]
    fn test_parse_us_style() {
        assert_eq!(
            parse_timestamp("03/05/2024 14:07:09"),
            Some(dt(2024, 3, 5, 14, 7, 9))
        );
        assert_eq!(
            parse_timestamp("3/5/2024 2:07:09 PM"),
            Some(dt(2024, 3, 5, 14, 7, 9))
        );
        assert_eq!(
            parse_timestamp("3/5/2024 12:00 AM"),
            Some(dt(2024, 3, 5, 0, 0, 0))
        );
        assert_eq!(parse_timestamp("03/05/2024"), Some(dt(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn test_parse_minute_precision_and_date_only() {
        assert_eq!(
            parse_timestamp("2024-03-05 14:07"),
            Some(dt(2024, 3, 5, 14, 7, 0))
        );
        assert_eq!(parse_timestamp("2024-03-05"), Some(dt(2024, 3, 5, 0, 0, 0)));
        assert_eq!(
            parse_timestamp("05-Mar-2024 14:07:09"),
            Some(dt(2024, 3, 5, 14, 7, 9))
        );
    }

    #[test]
    fn test_rejects_non_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("42"), None);
        assert_eq!(parse_timestamp("12.5"), None);
        assert_eq!(parse_timestamp("Running"), None);
        assert_eq!(parse_timestamp("2024-13-45 10:00:00"), None);
    }

    #[test]
    fn test_cutoff_blank_is_none() {
        assert_eq!(parse_cutoff(""), None);
        assert_eq!(parse_cutoff("2024-01-01"), Some(dt(2024, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(dt(2024, 3, 5, 4, 7, 9)), "2024-03-05 04:07:09");
        let frac = parse_timestamp("2024-03-05 04:07:09.5").unwrap();
        assert_eq!(format_timestamp(frac), "2024-03-05 04:07:09.500000");
    }
}
