/// The two scheduled refresh jobs.
///
/// - `refresh_district_summaries` rebuilds each district's ten-day summary
///   table from a fresh ten-day window.
/// - `refresh_live_status` pulls a week of readings from every district,
///   keeps the newest reading per station and overwrites the shared live
///   table.
///
/// Both jobs fetch all districts concurrently and then handle each
/// district's result on its own: a failed fetch is logged and reported but
/// never stops the other districts from being written.

use std::thread;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::daily::aggregate_daily;
use crate::analysis::latest::latest_per_station;
use crate::db::StationStore;
use crate::districts::District;
use crate::ingest::ReadingSource;
use crate::logging::{self, DataSource};
use crate::model::{GwError, RawReading, SUMMARY_DAYS};

/// Days of history requested by the live job (inclusive window today-7..today).
pub const LIVE_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Concurrent fetch
// ---------------------------------------------------------------------------

/// One district's fetch result.
#[derive(Debug)]
pub struct DistrictFetch<'a> {
    pub district: &'a District,
    pub result: Result<Vec<RawReading>, GwError>,
}

/// Fetches every district on its own scoped thread and waits for all of
/// them. Results come back in `districts` order.
pub fn fetch_all<'a, S>(
    source: &S,
    districts: &'a [District],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DistrictFetch<'a>>
where
    S: ReadingSource + ?Sized,
{
    thread::scope(|scope| {
        let handles: Vec<_> = districts
            .iter()
            .map(|district| {
                let handle = scope.spawn(move || source.fetch_district(district, start, end));
                (district, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(district, handle)| DistrictFetch {
                district,
                result: handle.join().unwrap_or_else(|_| {
                    Err(GwError::Request(format!(
                        "fetch thread for {} panicked",
                        district.api_name
                    )))
                }),
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// District summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DistrictOutcome {
    Refreshed { district: String, table: String, stations: usize },
    NoData { district: String },
    Failed { district: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub message: String,
    pub logs: Vec<String>,
    pub outcomes: Vec<DistrictOutcome>,
}

impl RefreshReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DistrictOutcome::Failed { .. }))
            .count()
    }
}

/// Summary window for `today`: the nine previous days plus today.
pub fn summary_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(SUMMARY_DAYS as i64 - 1), today)
}

pub fn live_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(LIVE_WINDOW_DAYS), today)
}

/// Rebuilds every district's summary table.
///
/// Never fails as a whole; per-district problems are reported in the
/// returned outcomes and log lines.
pub fn refresh_district_summaries<S, T>(
    source: &S,
    store: &mut T,
    districts: &[District],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> RefreshReport
where
    S: ReadingSource + ?Sized,
    T: StationStore + ?Sized,
{
    let (start, end) = summary_window(today);
    logging::info(
        DataSource::System,
        None,
        &format!("Refreshing {} district summaries for {} to {}", districts.len(), start, end),
    );

    let mut logs = Vec::new();
    let mut outcomes = Vec::new();

    for fetch in fetch_all(source, districts, start, end) {
        let district = fetch.district;
        let outcome = match fetch.result {
            Err(err) => {
                logging::log_failure(DataSource::Wris, &district.api_name, "district fetch", &err);
                logs.push(format!("API fetch failed for {}: {}", district.api_name, err));
                DistrictOutcome::Failed {
                    district: district.api_name.clone(),
                    error: err.to_string(),
                }
            }
            Ok(readings) if readings.is_empty() => {
                logs.push(format!("No data found for {}.", district.api_name));
                DistrictOutcome::NoData { district: district.api_name.clone() }
            }
            Ok(readings) => {
                let rows = aggregate_daily(&readings, today, now);
                match store.upsert_daily(&district.table_name, &rows) {
                    Ok(stations) => {
                        logs.push(format!(
                            "Successfully refreshed {} stations for {}.",
                            stations, district.table_name
                        ));
                        DistrictOutcome::Refreshed {
                            district: district.api_name.clone(),
                            table: district.table_name.clone(),
                            stations,
                        }
                    }
                    Err(err) => {
                        logging::log_failure(
                            DataSource::Database,
                            &district.table_name,
                            "summary upsert",
                            &err,
                        );
                        logs.push(format!("Error saving data for {}: {}", district.table_name, err));
                        DistrictOutcome::Failed {
                            district: district.api_name.clone(),
                            error: err.to_string(),
                        }
                    }
                }
            }
        };
        outcomes.push(outcome);
    }

    let mut report = RefreshReport { message: String::new(), logs, outcomes };
    let failed = report.failed_count();
    let total = districts.len();
    logging::log_refresh_summary(DataSource::Wris, total, total - failed, failed);

    report.message = if failed == 0 {
        "All district summaries refreshed successfully!".to_string()
    } else {
        format!("Refreshed {} of {} districts; {} failed.", total - failed, total, failed)
    };
    report
}

// ---------------------------------------------------------------------------
// Live status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRefreshReport {
    pub message: String,
    pub stations_updated: usize,
    pub districts_fetched: usize,
    pub failed_districts: Vec<String>,
}

/// Refreshes the shared live status table.
///
/// Failed district fetches are skipped. An empty reduction is a success
/// that writes nothing. Only the final upsert can fail the job.
pub fn refresh_live_status<S, T>(
    source: &S,
    store: &mut T,
    districts: &[District],
    today: NaiveDate,
) -> Result<LiveRefreshReport, GwError>
where
    S: ReadingSource + ?Sized,
    T: StationStore + ?Sized,
{
    let (start, end) = live_window(today);
    let mut readings = Vec::new();
    let mut failed_districts = Vec::new();
    let mut districts_fetched = 0;

    for fetch in fetch_all(source, districts, start, end) {
        match fetch.result {
            Ok(batch) => {
                districts_fetched += 1;
                readings.extend(batch);
            }
            Err(err) => {
                logging::log_failure(
                    DataSource::Wris,
                    &fetch.district.api_name,
                    "live fetch",
                    &err,
                );
                failed_districts.push(fetch.district.api_name.clone());
            }
        }
    }
    logging::log_refresh_summary(
        DataSource::Wris,
        districts.len(),
        districts_fetched,
        failed_districts.len(),
    );

    let rows = latest_per_station(&readings);
    if rows.is_empty() {
        logging::info(DataSource::System, None, "No live rows to upsert");
        return Ok(LiveRefreshReport {
            message: "No new station data found to update.".to_string(),
            stations_updated: 0,
            districts_fetched,
            failed_districts,
        });
    }

    let stations_updated = store.upsert_live(&rows)?;
    let message = format!(
        "Successfully updated {} stations across {} districts.",
        stations_updated, districts_fetched
    );
    logging::info(DataSource::Database, None, &message);

    Ok(LiveRefreshReport {
        message,
        stations_updated,
        districts_fetched,
        failed_districts,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Complaint;
    use crate::districts::default_districts;
    use crate::model::{DailySummaryRow, DataTime, HgiStatus, LiveStatusRow, StationCode};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned readings per district; districts not in the map fail.
    struct FakeSource {
        by_district: HashMap<String, Vec<RawReading>>,
        windows: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl FakeSource {
        fn new(entries: Vec<(&str, Vec<RawReading>)>) -> Self {
            FakeSource {
                by_district: entries.into_iter().map(|(d, r)| (d.to_string(), r)).collect(),
                windows: Mutex::new(Vec::new()),
            }
        }
    }

    impl ReadingSource for FakeSource {
        fn fetch_district(
            &self,
            district: &District,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<RawReading>, GwError> {
            self.windows.lock().unwrap().push((start, end));
            self.by_district
                .get(&district.api_name)
                .cloned()
                .ok_or(GwError::Http(503))
        }
    }

    #[derive(Default)]
    struct MemStore {
        daily: HashMap<String, Vec<DailySummaryRow>>,
        live: Vec<LiveStatusRow>,
        broken_table: Option<String>,
    }

    impl StationStore for MemStore {
        fn upsert_daily(&mut self, table: &str, rows: &[DailySummaryRow]) -> Result<usize, GwError> {
            if self.broken_table.as_deref() == Some(table) {
                return Err(GwError::Database(format!("relation \"{}\" does not exist", table)));
            }
            let existing = self.daily.entry(table.to_string()).or_default();
            for row in rows {
                existing.retain(|r| r.station_code != row.station_code);
                existing.push(row.clone());
            }
            Ok(rows.len())
        }
        fn fetch_daily(
            &mut self,
            table: &str,
            code: &StationCode,
        ) -> Result<Option<DailySummaryRow>, GwError> {
            Ok(self
                .daily
                .get(table)
                .and_then(|rows| rows.iter().find(|r| &r.station_code == code).cloned()))
        }
        fn list_daily(&mut self, table: &str) -> Result<Vec<DailySummaryRow>, GwError> {
            let mut rows = self.daily.get(table).cloned().unwrap_or_default();
            rows.sort_by(|a, b| a.station_code.cmp(&b.station_code));
            Ok(rows)
        }
        fn upsert_live(&mut self, rows: &[LiveStatusRow]) -> Result<usize, GwError> {
            for row in rows {
                self.live.retain(|r| r.id != row.id);
                self.live.push(row.clone());
            }
            Ok(rows.len())
        }
        fn fetch_live(&mut self) -> Result<Vec<LiveStatusRow>, GwError> {
            Ok(self.live.clone())
        }
        fn insert_complaint(&mut self, _: &Complaint) -> Result<(), GwError> {
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 14).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, 4, 0, 0).unwrap()
    }

    fn reading(code: &str, days_ago: i64, value: f64) -> RawReading {
        RawReading {
            station_code: Some(code.to_string()),
            station_name: Some(format!("{} well", code)),
            latitude: Some(30.9),
            longitude: Some(75.8),
            data_value: Some(value),
            data_time: Some(DataTime::from_date(today() - Duration::days(days_ago))),
            ..Default::default()
        }
    }

    #[test]
    fn test_windows_cover_ten_and_eight_days() {
        let (start, end) = summary_window(today());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 9, 5).unwrap());
        assert_eq!(end, today());
        let (start, _) = live_window(today());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 9, 7).unwrap());
    }

    #[test]
    fn test_fetch_all_keeps_district_order_and_isolates_errors() {
        let source = FakeSource::new(vec![("Ludhiana", vec![reading("L", 0, -1.0)])]);
        let districts = default_districts();
        let fetched = fetch_all(&source, &districts, today(), today());
        let names: Vec<_> = fetched.iter().map(|f| f.district.api_name.as_str()).collect();
        assert_eq!(names, vec!["Ludhiana", "Sangrur", "Amritsar"]);
        assert!(fetched[0].result.is_ok());
        assert_eq!(fetched[1].result.as_ref().unwrap_err(), &GwError::Http(503));
        assert_eq!(source.windows.lock().unwrap().len(), 3, "one call per district");
    }

    #[test]
    fn test_failing_district_does_not_block_the_others() {
        // Sangrur is missing from the fake, so its fetch fails.
        let source = FakeSource::new(vec![
            ("Ludhiana", vec![reading("L1", 0, -12.0), reading("L2", 3, -40.0)]),
            ("Amritsar", vec![reading("A1", 1, -55.0)]),
        ]);
        let mut store = MemStore::default();
        let report =
            refresh_district_summaries(&source, &mut store, &default_districts(), today(), now());

        assert_eq!(store.daily["ludhiana_daily_summary"].len(), 2);
        assert_eq!(store.daily["amritsar_daily_summary"].len(), 1);
        assert!(!store.daily.contains_key("sangrur_daily_summary"));

        assert_eq!(report.failed_count(), 1);
        assert!(matches!(&report.outcomes[1], DistrictOutcome::Failed { district, .. } if district == "Sangrur"));
        assert_eq!(report.message, "Refreshed 2 of 3 districts; 1 failed.");
        assert!(report.logs.contains(&"Successfully refreshed 2 stations for ludhiana_daily_summary.".to_string()));
    }

    #[test]
    fn test_empty_district_reports_no_data() {
        let source = FakeSource::new(vec![
            ("Ludhiana", vec![]),
            ("Sangrur", vec![reading("S1", 0, -1.0)]),
            ("Amritsar", vec![reading("A1", 0, -1.0)]),
        ]);
        let mut store = MemStore::default();
        let report =
            refresh_district_summaries(&source, &mut store, &default_districts(), today(), now());
        assert_eq!(report.logs[0], "No data found for Ludhiana.");
        assert_eq!(report.message, "All district summaries refreshed successfully!");
        assert!(!store.daily.contains_key("ludhiana_daily_summary"));
    }

    #[test]
    fn test_upsert_failure_only_fails_that_district() {
        let source = FakeSource::new(vec![
            ("Ludhiana", vec![reading("L1", 0, -1.0)]),
            ("Sangrur", vec![reading("S1", 0, -1.0)]),
            ("Amritsar", vec![reading("A1", 0, -1.0)]),
        ]);
        let mut store = MemStore {
            broken_table: Some("sangrur_daily_summary".into()),
            ..Default::default()
        };
        let report =
            refresh_district_summaries(&source, &mut store, &default_districts(), today(), now());
        assert_eq!(report.failed_count(), 1);
        assert!(report.logs[1].starts_with("Error saving data for sangrur_daily_summary"));
        assert_eq!(store.daily.len(), 2);
    }

    #[test]
    fn test_rerun_with_same_clock_is_idempotent() {
        let source = FakeSource::new(vec![
            ("Ludhiana", vec![reading("L1", 0, -1.0), reading("L1", 4, -2.0)]),
            ("Sangrur", vec![]),
            ("Amritsar", vec![]),
        ]);
        let mut store = MemStore::default();
        refresh_district_summaries(&source, &mut store, &default_districts(), today(), now());
        let first = store.daily.clone();
        refresh_district_summaries(&source, &mut store, &default_districts(), today(), now());
        assert_eq!(store.daily, first);
    }

    #[test]
    fn test_live_refresh_merges_districts_and_classifies() {
        let mut moved = reading("X", 0, -52.0);
        moved.district = Some("Amritsar".into());
        let source = FakeSource::new(vec![
            ("Ludhiana", vec![reading("X", 2, -20.0), reading("L1", 1, -31.0)]),
            ("Sangrur", vec![]),
            ("Amritsar", vec![moved]),
        ]);
        let mut store = MemStore::default();
        let report = refresh_live_status(&source, &mut store, &default_districts(), today()).unwrap();

        assert_eq!(report.stations_updated, 2);
        assert_eq!(report.message, "Successfully updated 2 stations across 3 districts.");
        let x = store.live.iter().find(|r| r.id.as_str() == "X").unwrap();
        assert_eq!(x.water_level, -52.0, "newest reading across districts wins");
        assert_eq!(x.hgi_status, HgiStatus::Red);
        assert_eq!(source.windows.lock().unwrap()[0].0, NaiveDate::from_ymd_opt(2025, 9, 7).unwrap());
    }

    #[test]
    fn test_live_refresh_with_nothing_to_write_is_success() {
        let source = FakeSource::new(vec![("Ludhiana", vec![])]);
        let mut store = MemStore::default();
        let report = refresh_live_status(&source, &mut store, &default_districts(), today()).unwrap();
        assert_eq!(report.message, "No new station data found to update.");
        assert_eq!(report.stations_updated, 0);
        assert_eq!(report.failed_districts, vec!["Sangrur", "Amritsar"]);
        assert!(store.live.is_empty());
    }

    #[test]
    fn test_report_serializes_outcome_status() {
        let outcome = DistrictOutcome::NoData { district: "Sangrur".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_data");
        assert_eq!(json["district"], "Sangrur");
    }
}
