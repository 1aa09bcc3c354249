/// Postgres persistence for summary, live status and complaint rows.
///
/// The refresh jobs treat the database purely as an upsert sink keyed by
/// the natural station key; the read-side commands select whole rows back.
/// Everything goes through the `StationStore` trait so the jobs can be
/// exercised against an in-memory store in tests.
///
/// Schema: `sql/001_base_schema.sql`.

use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use serde::{Deserialize, Serialize};

use crate::config::{ENV_DATABASE_URL, env_secret};
use crate::districts::is_safe_table_name;
use crate::logging::{self, DataSource};
use crate::model::{DailySummaryRow, GwError, LiveStatusRow, SUMMARY_DAYS, StationCode};

/// The shared cross-district table read by the map view.
pub const LIVE_TABLE: &str = "live_station_data";

pub const COMPLAINTS_TABLE: &str = "complaints";

// ---------------------------------------------------------------------------
// Complaint
// ---------------------------------------------------------------------------

/// A complaint submitted from the farmer dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub name: String,
    pub contact: String,
    pub complaint: String,
}

impl Complaint {
    /// All three fields are required.
    pub fn validate(&self) -> Result<(), GwError> {
        for (field, value) in [
            ("name", &self.name),
            ("contact", &self.contact),
            ("complaint", &self.complaint),
        ] {
            if value.trim().is_empty() {
                return Err(GwError::MissingInput(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Row storage with upsert-on-conflict semantics.
pub trait StationStore {
    /// Insert-or-replace summary rows keyed by station code. A replaced row
    /// is overwritten whole: day columns absent from `rows` become NULL.
    fn upsert_daily(&mut self, table: &str, rows: &[DailySummaryRow]) -> Result<usize, GwError>;

    fn fetch_daily(
        &mut self,
        table: &str,
        station_code: &StationCode,
    ) -> Result<Option<DailySummaryRow>, GwError>;

    /// Every row of a summary table, ordered by station code.
    fn list_daily(&mut self, table: &str) -> Result<Vec<DailySummaryRow>, GwError>;

    /// Insert-or-replace live rows keyed by station id.
    fn upsert_live(&mut self, rows: &[LiveStatusRow]) -> Result<usize, GwError>;

    fn fetch_live(&mut self) -> Result<Vec<LiveStatusRow>, GwError>;

    fn insert_complaint(&mut self, complaint: &Complaint) -> Result<(), GwError>;
}

// ---------------------------------------------------------------------------
// Connection helpers
// ---------------------------------------------------------------------------

/// Connects using `DATABASE_URL` (loaded from `.env` if present).
pub fn connect() -> Result<Client, GwError> {
    dotenv::dotenv().ok();
    let url = env_secret(ENV_DATABASE_URL)
        .ok_or_else(|| GwError::Config(format!("{} must be set", ENV_DATABASE_URL)))?;
    Ok(Client::connect(&url, NoTls)?)
}

/// Connects and checks that every table in `tables` exists.
pub fn connect_and_verify(tables: &[&str]) -> Result<Client, GwError> {
    let mut client = connect()?;
    let mut missing = Vec::new();
    for table in tables {
        let row = client.query_one(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
            &[table],
        )?;
        if !row.get::<_, bool>(0) {
            missing.push(*table);
        }
    }
    if !missing.is_empty() {
        return Err(GwError::Database(format!(
            "missing tables: {} (apply sql/001_base_schema.sql)",
            missing.join(", ")
        )));
    }
    Ok(client)
}

// ---------------------------------------------------------------------------
// SQL construction
// ---------------------------------------------------------------------------

fn day_columns() -> Vec<String> {
    (1..=SUMMARY_DAYS).map(|n| format!("day{}_value", n)).collect()
}

fn checked_table(table: &str) -> Result<&str, GwError> {
    if is_safe_table_name(table) {
        Ok(table)
    } else {
        Err(GwError::Config(format!("refusing unsafe table name '{}'", table)))
    }
}

/// `INSERT .. ON CONFLICT (station_code) DO UPDATE` for a summary table.
pub fn daily_upsert_sql(table: &str) -> Result<String, GwError> {
    let table = checked_table(table)?;
    let mut columns = vec![
        "station_code".to_string(),
        "station_name".to_string(),
        "latitude".to_string(),
        "longitude".to_string(),
    ];
    columns.extend(day_columns());
    columns.push("last_updated".to_string());

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .skip(1)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (station_code) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    ))
}

fn daily_select_sql(table: &str) -> Result<String, GwError> {
    Ok(format!("{} WHERE station_code = $1", daily_list_sql_base(table)?))
}

fn daily_list_sql(table: &str) -> Result<String, GwError> {
    Ok(format!("{} ORDER BY station_code", daily_list_sql_base(table)?))
}

fn daily_list_sql_base(table: &str) -> Result<String, GwError> {
    let table = checked_table(table)?;
    Ok(format!(
        "SELECT station_code, station_name, latitude, longitude, {}, last_updated FROM {}",
        day_columns().join(", "),
        table
    ))
}

const LIVE_UPSERT_SQL: &str = "INSERT INTO live_station_data
    (id, name, district, hgi_status, latitude, longitude, water_level, last_reading_time)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (id) DO UPDATE SET
        name = EXCLUDED.name,
        district = EXCLUDED.district,
        hgi_status = EXCLUDED.hgi_status,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        water_level = EXCLUDED.water_level,
        last_reading_time = EXCLUDED.last_reading_time";

const LIVE_SELECT_SQL: &str = "SELECT id, name, district, hgi_status, latitude, longitude,
    water_level, last_reading_time FROM live_station_data ORDER BY id";

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        PgStore { client }
    }

    pub fn connect() -> Result<Self, GwError> {
        Ok(PgStore::new(connect()?))
    }
}

fn station_code_from(row: &Row, idx: usize) -> Result<StationCode, GwError> {
    let raw: String = row.try_get(idx)?;
    StationCode::parse(&raw).ok_or_else(|| GwError::Database("row with blank station code".into()))
}

fn summary_from_row(row: &Row) -> Result<DailySummaryRow, GwError> {
    let mut days = [None; SUMMARY_DAYS];
    for (i, day) in days.iter_mut().enumerate() {
        *day = row.try_get::<_, Option<f64>>(4 + i)?;
    }
    Ok(DailySummaryRow {
        station_code: station_code_from(row, 0)?,
        station_name: row.try_get(1)?,
        latitude: row.try_get(2)?,
        longitude: row.try_get(3)?,
        days,
        last_updated: row.try_get(4 + SUMMARY_DAYS)?,
    })
}

fn live_from_row(row: &Row) -> Result<LiveStatusRow, GwError> {
    let status: String = row.try_get(3)?;
    Ok(LiveStatusRow {
        id: station_code_from(row, 0)?,
        name: row.try_get(1)?,
        district: row.try_get(2)?,
        hgi_status: status.parse()?,
        latitude: row.try_get(4)?,
        longitude: row.try_get(5)?,
        water_level: row.try_get(6)?,
        last_reading_time: row.try_get(7)?,
    })
}

impl StationStore for PgStore {
    fn upsert_daily(&mut self, table: &str, rows: &[DailySummaryRow]) -> Result<usize, GwError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = daily_upsert_sql(table)?;

        let mut tx = self.client.transaction()?;
        let statement = tx.prepare(&sql)?;
        for row in rows {
            let code = row.station_code.as_str();
            let mut params: Vec<&(dyn ToSql + Sync)> =
                vec![&code, &row.station_name, &row.latitude, &row.longitude];
            for day in &row.days {
                params.push(day);
            }
            params.push(&row.last_updated);
            tx.execute(&statement, &params)?;
        }
        tx.commit()?;

        logging::debug(
            DataSource::Database,
            None,
            &format!("upserted {} rows into {}", rows.len(), table),
        );
        Ok(rows.len())
    }

    fn fetch_daily(
        &mut self,
        table: &str,
        station_code: &StationCode,
    ) -> Result<Option<DailySummaryRow>, GwError> {
        let sql = daily_select_sql(table)?;
        let rows = self.client.query(sql.as_str(), &[&station_code.as_str()])?;
        rows.first().map(summary_from_row).transpose()
    }

    fn list_daily(&mut self, table: &str) -> Result<Vec<DailySummaryRow>, GwError> {
        let sql = daily_list_sql(table)?;
        let rows = self.client.query(sql.as_str(), &[])?;
        rows.iter().map(summary_from_row).collect()
    }

    fn upsert_live(&mut self, rows: &[LiveStatusRow]) -> Result<usize, GwError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.client.transaction()?;
        let statement = tx.prepare(LIVE_UPSERT_SQL)?;
        for row in rows {
            let id = row.id.as_str();
            let status = row.hgi_status.as_str();
            tx.execute(
                &statement,
                &[
                    &id,
                    &row.name,
                    &row.district,
                    &status,
                    &row.latitude,
                    &row.longitude,
                    &row.water_level,
                    &row.last_reading_time,
                ],
            )?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn fetch_live(&mut self) -> Result<Vec<LiveStatusRow>, GwError> {
        let rows = self.client.query(LIVE_SELECT_SQL, &[])?;
        rows.iter().map(live_from_row).collect()
    }

    fn insert_complaint(&mut self, complaint: &Complaint) -> Result<(), GwError> {
        complaint.validate()?;
        self.client.execute(
            "INSERT INTO complaints (name, contact, complaint) VALUES ($1, $2, $3)",
            &[&complaint.name.trim(), &complaint.contact.trim(), &complaint.complaint.trim()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_upsert_sql_covers_every_column() {
        let sql = daily_upsert_sql("ludhiana_daily_summary").unwrap();
        assert!(sql.starts_with("INSERT INTO ludhiana_daily_summary"));
        assert!(sql.contains("ON CONFLICT (station_code) DO UPDATE SET"));
        for n in 1..=SUMMARY_DAYS {
            let col = format!("day{}_value = EXCLUDED.day{}_value", n, n);
            assert!(sql.contains(&col), "upsert must overwrite {}", col);
        }
        assert!(sql.contains("last_updated = EXCLUDED.last_updated"));
        assert!(sql.contains("$15"), "4 identity + 10 day + 1 stamp = 15 params");
        assert!(!sql.contains("$16"));
        assert!(
            !sql.contains("station_code = EXCLUDED"),
            "conflict key should not be in the SET list"
        );
    }

    #[test]
    fn test_unsafe_table_rejected_before_sql_is_built() {
        assert!(daily_upsert_sql("x; DROP TABLE complaints").is_err());
        assert!(daily_select_sql("Robert'); --").is_err());
        assert!(daily_list_sql("a b").is_err());
    }

    #[test]
    fn test_list_sql_orders_by_station_and_has_no_filter() {
        let sql = daily_list_sql("amritsar_daily_summary").unwrap();
        assert!(sql.ends_with("FROM amritsar_daily_summary ORDER BY station_code"));
        assert!(!sql.contains("$1"));
        assert!(sql.contains("day10_value, last_updated"));
        let one = daily_select_sql("amritsar_daily_summary").unwrap();
        assert!(one.ends_with("WHERE station_code = $1"));
    }

    #[test]
    fn test_complaint_requires_all_fields() {
        let ok = Complaint {
            name: "Gurpreet".into(),
            contact: "98140 00000".into(),
            complaint: "Handpump dry since Monday".into(),
        };
        assert!(ok.validate().is_ok());

        let blank = Complaint { contact: "  ".into(), ..ok };
        assert!(matches!(blank.validate(), Err(GwError::MissingInput(m)) if m.contains("contact")));
    }

    #[test]
    #[ignore] // Requires DATABASE_URL and the base schema
    fn db_tables_exist() {
        let tables = [LIVE_TABLE, COMPLAINTS_TABLE, "ludhiana_daily_summary"];
        connect_and_verify(&tables).expect("schema should be applied");
    }
}
