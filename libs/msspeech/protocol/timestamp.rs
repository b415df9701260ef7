use chrono::{DateTime, Timelike, Utc};

/// Current UTC time in wire form, e.g. `2024-03-01T12:30:05.1234567Z`
pub fn now() -> String {
    format_timestamp(&Utc::now())
}

/// Seconds carry seven fractional digits (100 ns resolution)
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    // Leap seconds report nanos above 999_999_999
    let ticks = (time.nanosecond() / 100).min(9_999_999);
    format!("{}.{:07}Z", time.format("%Y-%m-%dT%H:%M:%S"), ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_has_seven_fraction_digits() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(format_timestamp(&time), "2024-03-01T12:30:05.1234567Z");
    }

    #[test]
    fn test_whole_seconds_are_zero_padded() {
        let time = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_timestamp(&time), "2023-12-31T23:59:59.0000000Z");
    }

    #[test]
    fn test_now_shape() {
        let stamp = now();
        assert_eq!(stamp.len(), "2024-03-01T12:30:05.1234567Z".len());
        assert!(stamp.ends_with('Z'));
    }
}
