//! Local-day windows.
//!
//! Event timestamps are stored as UTC epoch milliseconds. Anything keyed by a
//! calendar day (steps, water, summaries, the food diary) is resolved against
//! the local timezone: a day spans `[local midnight, next local midnight)`.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Resolve a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times that fall in
/// a DST gap are pushed forward an hour.
fn resolve_local(naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(t) = Local.from_local_datetime(&naive).earliest() {
        return t.with_timezone(&Utc);
    }
    let shifted = naive + chrono::Duration::hours(1);
    Local
        .from_local_datetime(&shifted)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&naive), |t| t.with_timezone(&Utc))
}

#[must_use]
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    resolve_local(date.and_time(NaiveTime::MIN))
}

/// Millisecond bounds `[start, end)` of a local day.
#[must_use]
pub fn day_window(date: NaiveDate) -> (i64, i64) {
    let start = day_start(date).timestamp_millis();
    let end = day_start(date + chrono::Duration::days(1)).timestamp_millis();
    (start, end)
}

/// A local wall-clock time on `date`, as UTC.
#[must_use]
pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    resolve_local(date.and_time(time))
}

#[must_use]
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

#[must_use]
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_window_contains_local_times() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let (start, end) = day_window(date);
        assert!(start < end);

        let morning = at(date, 8, 30).timestamp_millis();
        let late = at(date, 23, 59).timestamp_millis();
        assert!(morning >= start && morning < end);
        assert!(late >= start && late < end);

        let next = at(date + chrono::Duration::days(1), 0, 0).timestamp_millis();
        assert_eq!(next, end);
    }

    #[test]
    fn test_local_date_round_trips_through_at() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(local_date(at(date, 12, 0)), date);
    }

    #[test]
    fn test_date_key() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(date_key(date), "2024-01-05");
    }

    #[test]
    fn test_from_millis() {
        let ts = at(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 9, 0);
        assert_eq!(from_millis(ts.timestamp_millis()), ts);
    }
}
