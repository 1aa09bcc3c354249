/// Latest-reading-per-station reduction for the live status table.
///
/// The live refresh pulls a week of readings from every district at once.
/// The map view only needs one point per station, so the combined list is
/// reduced to each station's most recent usable reading and classified.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::alert::thresholds::classify;
use crate::model::{LiveStatusRow, RawReading, StationCode};

struct Latest<'a> {
    taken_at: NaiveDateTime,
    value: f64,
    reading: &'a RawReading,
}

/// Single pass over `readings`, keeping the latest reading per station.
///
/// Readings without a station code, numeric value or parseable timestamp
/// are ignored. On equal timestamps the first one seen is kept. Output is
/// sorted by station code.
pub fn latest_per_station(readings: &[RawReading]) -> Vec<LiveStatusRow> {
    let mut latest: BTreeMap<StationCode, Latest<'_>> = BTreeMap::new();

    for reading in readings {
        let (Some(code), Some(value), Some(taken_at)) =
            (reading.code(), reading.data_value, reading.timestamp())
        else {
            continue;
        };
        let candidate = Latest { taken_at, value, reading };
        match latest.get(&code) {
            Some(current) if current.taken_at >= taken_at => {}
            _ => {
                latest.insert(code, candidate);
            }
        }
    }

    latest
        .into_iter()
        .map(|(id, l)| to_live_row(id, l.reading, l.value, l.taken_at))
        .collect()
}

fn to_live_row(
    id: StationCode,
    reading: &RawReading,
    value: f64,
    taken_at: NaiveDateTime,
) -> LiveStatusRow {
    LiveStatusRow {
        id,
        name: reading.station_name.clone(),
        district: reading.district.clone(),
        hgi_status: classify(value),
        latitude: reading.latitude,
        longitude: reading.longitude,
        water_level: value,
        last_reading_time: taken_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataTime, HgiStatus};

    fn reading(code: &str, district: &str, time: &str, value: f64) -> RawReading {
        RawReading {
            station_code: Some(code.to_string()),
            station_name: Some(format!("{} well", code)),
            district: Some(district.to_string()),
            latitude: Some(30.0),
            longitude: Some(75.0),
            data_value: Some(value),
            data_time: Some(DataTime::Text(time.to_string())),
        }
    }

    #[test]
    fn test_one_row_per_station_with_max_timestamp_across_districts() {
        let readings = vec![
            reading("S", "Ludhiana", "2025-09-10T10:00:00", -20.0),
            reading("S", "Sangrur", "2025-09-13T10:00:00", -55.0),
            reading("S", "Ludhiana", "2025-09-12T10:00:00", -25.0),
        ];
        let rows = latest_per_station(&readings);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].water_level, -55.0);
        assert_eq!(rows[0].district.as_deref(), Some("Sangrur"));
        assert_eq!(rows[0].hgi_status, HgiStatus::Red);
        assert_eq!(rows[0].last_reading_time.to_string(), "2025-09-13 10:00:00");
    }

    #[test]
    fn test_equal_timestamps_keep_first_seen() {
        let readings = vec![
            reading("S", "Ludhiana", "2025-09-13", -10.0),
            reading("S", "Ludhiana", "2025-09-13", -40.0),
        ];
        let rows = latest_per_station(&readings);
        assert_eq!(rows[0].water_level, -10.0);
    }

    #[test]
    fn test_unusable_readings_are_ignored() {
        let mut no_code = reading("A", "Ludhiana", "2025-09-13", -10.0);
        no_code.station_code = None;
        let mut no_value = reading("B", "Ludhiana", "2025-09-13", -10.0);
        no_value.data_value = None;
        let mut no_time = reading("C", "Ludhiana", "garbage", -10.0);
        no_time.data_time = Some(DataTime::Text("garbage".into()));
        assert!(latest_per_station(&[no_code, no_value, no_time]).is_empty());
    }

    #[test]
    fn test_value_less_newer_reading_does_not_shadow_older_valid_one() {
        let mut newer = reading("S", "Ludhiana", "2025-09-14", 0.0);
        newer.data_value = None;
        let older = reading("S", "Ludhiana", "2025-09-12", -31.0);
        let rows = latest_per_station(&[newer, older]);
        assert_eq!(rows[0].water_level, -31.0);
        assert_eq!(rows[0].hgi_status, HgiStatus::Yellow);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        assert!(latest_per_station(&[]).is_empty());
    }
}
