/// Station data staleness detection.
///
/// Rows are only ever overwritten by the refresh jobs; nothing deletes them.
/// A station that stops reporting keeps its last row forever, so consumers
/// compare `last_updated` / `last_reading_time` against a wall-clock
/// threshold to decide whether the data is still worth showing.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, which keeps staleness deterministic in tests.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::model::{DailySummaryRow, LiveStatusRow};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if `timestamp` is older than `max_age_minutes` relative
/// to `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Timestamps in the future are never stale.
pub fn is_stale_at(timestamp: DateTime<Utc>, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    let age_minutes = (now - timestamp).num_minutes();
    age_minutes > 0 && age_minutes as u64 > max_age_minutes
}

/// A summary row is stale when its refresh stamp is too old.
pub fn summary_is_stale_at(row: &DailySummaryRow, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    is_stale_at(row.last_updated, max_age_minutes, now)
}

/// A live row is stale when its reading time, interpreted in the stations'
/// local offset, is too old.
pub fn live_is_stale_at(
    row: &LiveStatusRow,
    offset: FixedOffset,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> bool {
    match local_to_utc(row.last_reading_time, offset) {
        Some(ts) => is_stale_at(ts, max_age_minutes, now),
        // Unrepresentable timestamps are treated as stale.
        None => true,
    }
}

fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::thresholds::classify;
    use crate::model::{SUMMARY_DAYS, StationCode};

    /// A fixed "now" used across all tests: 2025-09-14 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, 13, 0, 0).unwrap()
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn summary_updated_at(ts: DateTime<Utc>) -> DailySummaryRow {
        DailySummaryRow {
            station_code: StationCode::parse("W03215").unwrap(),
            station_name: Some("Khanna".into()),
            latitude: None,
            longitude: None,
            days: [None; SUMMARY_DAYS],
            last_updated: ts,
        }
    }

    fn live_read_at(local: &str) -> LiveStatusRow {
        LiveStatusRow {
            id: StationCode::parse("W03215").unwrap(),
            name: None,
            district: None,
            hgi_status: classify(-20.0),
            latitude: None,
            longitude: None,
            water_level: -20.0,
            last_reading_time: NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M").unwrap(),
        }
    }

    // --- Not stale ----------------------------------------------------------

    #[test]
    fn test_summary_5_minutes_old_is_not_stale() {
        let row = summary_updated_at(Utc.with_ymd_and_hms(2025, 9, 14, 12, 55, 0).unwrap());
        assert!(!summary_is_stale_at(&row, 15, fixed_now()));
    }

    #[test]
    fn test_exactly_at_threshold_is_not_stale() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 14, 12, 45, 0).unwrap(); // 15 min ago
        assert!(
            !is_stale_at(ts, 15, fixed_now()),
            "reading exactly at threshold should not be stale (strictly greater than)"
        );
    }

    #[test]
    fn test_future_timestamp_is_not_stale() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 15, 0, 0, 0).unwrap();
        assert!(!is_stale_at(ts, 0, fixed_now()));
    }

    #[test]
    fn test_live_row_uses_local_offset() {
        // 18:30 IST == 13:00 UTC, zero minutes old.
        let row = live_read_at("2025-09-14 18:30");
        assert!(!live_is_stale_at(&row, ist(), 15, fixed_now()));
    }

    // --- Stale --------------------------------------------------------------

    #[test]
    fn test_one_minute_past_threshold_is_stale() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 14, 12, 44, 0).unwrap(); // 16 min ago
        assert!(is_stale_at(ts, 15, fixed_now()));
    }

    #[test]
    fn test_live_row_two_days_old_is_stale() {
        let row = live_read_at("2025-09-12 10:00");
        assert!(live_is_stale_at(&row, ist(), 24 * 60, fixed_now()));
    }

    #[test]
    fn test_same_row_stale_under_tight_threshold_not_under_loose() {
        let row = summary_updated_at(Utc.with_ymd_and_hms(2025, 9, 14, 12, 30, 0).unwrap());
        assert!(summary_is_stale_at(&row, 20, fixed_now()));
        assert!(!summary_is_stale_at(&row, 60, fixed_now()));
    }
}
