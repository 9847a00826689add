use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use chrono::{NaiveDate, SecondsFormat, Utc};

use crate::error::ScolioError;

static LAST_RECORD_ID: AtomicI64 = AtomicI64::new(0);

/// 将毫秒时间戳格式化为标准时间格式 HH:MM:SS.mmm
pub fn format_timestamp(timestamp_ms: i64) -> String {
    if timestamp_ms < 0 {
        return format!("Invalid timestamp: {}", timestamp_ms);
    }
    let duration = Duration::from_millis(timestamp_ms as u64);

    match UNIX_EPOCH.checked_add(duration) {
        Some(_) => {
            let total_ms = duration.as_millis();
            let seconds = total_ms / 1000;
            let ms = total_ms % 1000;

            let hours = (seconds / 3600) % 24;
            let minutes = (seconds / 60) % 60;
            let secs = seconds % 60;

            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
        }
        None => format!("Invalid timestamp: {}", timestamp_ms),
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 当前时间，ISO-8601 格式，例如 2025-01-01T08:30:00.000Z
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 以毫秒时间戳作为记录ID，同一进程内保证不重复
pub fn generate_record_id() -> String {
    let now = now_millis();
    let mut last = LAST_RECORD_ID.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_RECORD_ID.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(actual) => last = actual,
        }
    }
}

/// MM/DD/YYYY
pub fn format_date_of_birth(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// 接受 YYYY-MM-DD 或 MM/DD/YYYY
pub fn parse_date_of_birth(input: &str) -> Result<NaiveDate, ScolioError> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .map_err(|_| ScolioError::InvalidInput(format!("invalid date of birth '{}'", input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00.000");
        assert_eq!(format_timestamp(3_723_045), "01:02:03.045");
        assert_eq!(format_timestamp(-5), "Invalid timestamp: -5");
    }

    #[test]
    fn test_record_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_record_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_date_of_birth_round_trip() {
        let date = parse_date_of_birth("2012-03-07").unwrap();
        assert_eq!(format_date_of_birth(date), "03/07/2012");
        assert_eq!(parse_date_of_birth("03/07/2012").unwrap(), date);
        assert!(parse_date_of_birth("next tuesday").is_err());
    }

    #[test]
    fn test_iso_timestamp_shape() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
