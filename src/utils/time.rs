//! Time utilities for provider-local times and XMLTV timestamps

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

/// XMLTV timestamp layout, e.g. `20261016060000 +0200`
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Resolve `date` at `hour:00` in `tz`
///
/// Ambiguous local times (DST fall-back) take the earliest instant.
/// Non-existent local times (DST spring-forward gap) move forward minute
/// by minute to the first valid instant.
pub fn resolve_local(tz: Tz, date: NaiveDate, hour: u32) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    resolve_naive(tz, date.and_time(time))
}

/// Resolve a naive provider-local datetime in `tz`
pub fn resolve_naive(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    // DST gaps are at most a couple of hours
    for _ in 0..=180 {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            if candidate != naive {
                debug!("Local time {} does not exist in {}, using {}", naive, tz, dt);
            }
            return dt;
        }
        candidate += Duration::minutes(1);
    }
    tz.from_utc_datetime(&naive)
}

/// Format an instant as an XMLTV timestamp in its own offset
pub fn format_xmltv_time(dt: &DateTime<Tz>) -> String {
    dt.format(XMLTV_TIME_FORMAT).to_string()
}

/// Parse a provider calendar date (`YYYY-MM-DD` or `DD/MM/YYYY`)
pub fn parse_provider_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

/// Parse a provider wall-clock time (`HH:MM` or `HH:MM:SS`)
pub fn parse_provider_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::Madrid;

    #[test]
    fn test_resolve_local_regular_day() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let dt = resolve_local(Madrid, date, 2);
        assert_eq!(format_xmltv_time(&dt), "20261017020000 +0200");
    }

    #[test]
    fn test_resolve_local_skips_dst_gap() {
        // 2026-03-29 02:00 does not exist in Madrid (clocks jump to 03:00)
        let date = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        let dt = resolve_local(Madrid, date, 2);
        assert_eq!(dt.hour(), 3);
        assert_eq!(format_xmltv_time(&dt), "20260329030000 +0200");
    }

    #[test]
    fn test_resolve_local_ambiguous_takes_earliest() {
        // 2026-10-25 02:00 happens twice in Madrid
        let date = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let dt = resolve_local(Madrid, date, 2);
        assert_eq!(format_xmltv_time(&dt), "20261025020000 +0200");
    }

    #[test]
    fn test_parse_provider_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 16);
        assert_eq!(parse_provider_date("2026-10-16"), expected);
        assert_eq!(parse_provider_date("16/10/2026"), expected);
        assert_eq!(parse_provider_date("16-10-2026"), None);
    }

    #[test]
    fn test_parse_provider_time_formats() {
        assert_eq!(parse_provider_time("06:30"), NaiveTime::from_hms_opt(6, 30, 0));
        assert_eq!(parse_provider_time("23:59:59"), NaiveTime::from_hms_opt(23, 59, 59));
        assert_eq!(parse_provider_time("25:00"), None);
    }
}
