//! Time bucketing for metric trend aggregation
//!
//! - Day buckets: "YYYY-MM-DD" for streak and activity math
//! - Week buckets: "YYYY-Www" (ISO week) for the weekly DI/PR/CS trend

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Format a date as a day bucket string "YYYY-MM-DD".
pub fn day_bucket(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Compute the ISO-week bucket string from a Unix timestamp in milliseconds.
///
/// Returns a string in format "YYYY-Www", e.g. "2024-W07". The year is the
/// ISO week-year, which can differ from the calendar year around January 1st.
pub fn week_bucket(timestamp_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    let iso = dt.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

/// Parse a day bucket string back to a `NaiveDate`.
pub fn parse_day_bucket(bucket: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(bucket, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bucket_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 28).unwrap();
        assert_eq!(day_bucket(date), "2023-12-28");
        assert_eq!(parse_day_bucket(&day_bucket(date)), Some(date));
    }

    #[test]
    fn test_week_bucket() {
        // 2023-12-28 is a Thursday in ISO week 52
        let ts = 1703766896000i64;
        assert_eq!(week_bucket(ts), "2023-W52");
    }

    #[test]
    fn test_week_bucket_iso_year_boundary() {
        // 2024-01-01 belongs to ISO week 2024-W01, but 2023-01-01 (a Sunday)
        // belongs to 2022-W52
        let jan1_2023 = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(week_bucket(jan1_2023), "2022-W52");
    }

    #[test]
    fn test_parse_day_bucket() {
        let date = parse_day_bucket("2023-12-28").unwrap();
        assert_eq!(date.year(), 2023);
        assert_eq!(date.month(), 12);
        assert_eq!(date.day(), 28);
        assert!(parse_day_bucket("not-a-date").is_none());
    }
}
