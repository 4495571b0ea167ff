use chrono::{DateTime, TimeDelta, Utc};

/// `host_enumeration_report_YYYYMMDD_HHMM_UTC.md`
pub fn default_report_name(now: DateTime<Utc>) -> String {
    format!("host_enumeration_report_{}.md", now.format("%Y%m%d_%H%M_UTC"))
}

pub fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `H:MM:SS`, clamped at zero.
pub fn format_duration(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn test_default_report_name() {
        let at = Utc.with_ymd_and_hms(2025, 11, 3, 14, 5, 59).unwrap();
        assert_eq!(default_report_name(at), "host_enumeration_report_20251103_1405_UTC.md");
        assert_eq!(format_utc(at), "2025-11-03 14:05:59 UTC");
    }

    #[rstest]
    #[case(0, "0:00:00")]
    #[case(59, "0:00:59")]
    #[case(3_725, "1:02:05")]
    #[case(-5, "0:00:00")]
    fn test_format_duration(#[case] secs: i64, #[case] expected: &str) {
        assert_eq!(format_duration(TimeDelta::seconds(secs)), expected);
    }
}
