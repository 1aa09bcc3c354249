/// Daily aggregation of district readings into summary rows.
///
/// A district fetch returns a flat, unordered list of readings for many
/// stations over the last ten days, possibly with duplicates. Each station
/// becomes one dense row with the readings bucketed by calendar-day offset
/// from "today": offset 0 (today) lands in `day1_value`, offset 9 in
/// `day10_value`. Anything outside that window is dropped.
///
/// Duplicate policy for one station and one day: the reading with the
/// latest timestamp wins; on equal timestamps the one processed last wins.
/// Date-only payloads therefore behave as plain last-write-wins.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::model::{DailySummaryRow, RawReading, SUMMARY_DAYS, StationCode};

/// Calendar-day distance from `date` to `today` (0 = today, 1 = yesterday).
/// Negative for future dates.
pub fn day_offset(today: NaiveDate, date: NaiveDate) -> i64 {
    (today - date).num_days()
}

/// Column index (0-based into `DailySummaryRow::days`) for a reading date,
/// or `None` when it falls outside the [0, 10) window.
pub fn bucket_index(today: NaiveDate, date: NaiveDate) -> Option<usize> {
    let offset = day_offset(today, date);
    if (0..SUMMARY_DAYS as i64).contains(&offset) {
        Some(offset as usize)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: f64,
    taken_at: NaiveDateTime,
}

struct PartialRow {
    station_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    slots: [Option<Slot>; SUMMARY_DAYS],
}

impl PartialRow {
    /// Identity comes from the first reading seen for the station.
    fn from_first(reading: &RawReading) -> Self {
        PartialRow {
            station_name: reading.station_name.clone(),
            latitude: reading.latitude,
            longitude: reading.longitude,
            slots: [None; SUMMARY_DAYS],
        }
    }

    fn offer(&mut self, index: usize, value: f64, taken_at: NaiveDateTime) {
        let slot = &mut self.slots[index];
        match slot {
            Some(existing) if existing.taken_at > taken_at => {}
            _ => *slot = Some(Slot { value, taken_at }),
        }
    }
}

/// Buckets readings into one summary row per station.
///
/// - Readings without a station code are discarded.
/// - A station's first reading creates its row even if that reading
///   contributes no column, so the station is still upserted (with its
///   day columns cleared).
/// - Readings without a numeric value or a parseable date contribute no
///   column.
///
/// Every row is stamped `last_updated = now`. Rows are returned sorted by
/// station code. For a fixed `today` and `now` the output depends only on
/// the input.
pub fn aggregate_daily(
    readings: &[RawReading],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<DailySummaryRow> {
    let mut stations: BTreeMap<StationCode, PartialRow> = BTreeMap::new();

    for reading in readings {
        let Some(code) = reading.code() else {
            continue;
        };
        let row = stations
            .entry(code)
            .or_insert_with(|| PartialRow::from_first(reading));

        let (Some(value), Some(taken_at)) = (reading.data_value, reading.timestamp()) else {
            continue;
        };
        if let Some(index) = bucket_index(today, taken_at.date()) {
            row.offer(index, value, taken_at);
        }
    }

    stations
        .into_iter()
        .map(|(station_code, partial)| DailySummaryRow {
            station_code,
            station_name: partial.station_name,
            latitude: partial.latitude,
            longitude: partial.longitude,
            days: partial.slots.map(|slot| slot.map(|s| s.value)),
            last_updated: now,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
