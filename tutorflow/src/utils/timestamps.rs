//! Timestamp formatting.

use chrono::{DateTime, Local, Utc};

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 string,
/// `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Formats a local time the way log lines are stamped:
/// `YYYY-MM-DD HH:MM:SS,mmm`.
#[must_use]
pub fn log_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S,%3f").to_string()
}

/// Compact calendar day, `YYYYMMDD`, used in per-day file names.
#[must_use]
pub fn day_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_log_and_day_stamps() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_timestamp(&at), "2024-03-09 07:05:01,000");
        assert_eq!(day_stamp(&at), "20240309");
    }
}
