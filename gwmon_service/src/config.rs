/// Service configuration.
///
/// Loaded from a TOML file (`gwmon.toml` by default). Every field has a
/// default, so a missing file yields the built-in configuration. Secrets
/// (`DATABASE_URL`, `OPENWEATHER_API_KEY`, `GEMINI_API_KEY`) never live in
/// the file; they are read from the environment after `.env` is loaded.

use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;

use crate::districts::{self, District};
use crate::model::GwError;

pub const DEFAULT_CONFIG_PATH: &str = "gwmon.toml";

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_WEATHER_KEY: &str = "OPENWEATHER_API_KEY";
pub const ENV_LLM_KEY: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Offset of the stations' local clock from UTC. "Today" for day
    /// bucketing is the calendar date at this offset. Defaults to IST.
    pub utc_offset_minutes: i32,
    pub upstream: UpstreamConfig,
    pub districts: Vec<District>,
    pub weather: WeatherConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub state_name: String,
    pub agency_name: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of debug, info, warn, error.
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub interval_minutes: u64,
    /// Readings older than this are counted as stale in KPIs.
    pub stale_after_minutes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            utc_offset_minutes: 330,
            upstream: UpstreamConfig::default(),
            districts: districts::default_districts(),
            weather: WeatherConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: "https://indiawris.gov.in/Dataset/Ground%20Water%20Level".to_string(),
            state_name: "Punjab".to_string(),
            agency_name: "CGWB".to_string(),
            page_size: 2000,
            timeout_secs: 60,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            base_url: "https://api.openweathermap.org/data/2.5/forecast".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            console_timestamps: true,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            interval_minutes: 360,
            stale_after_minutes: 48 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads configuration from `path`, or from `gwmon.toml` if it exists, or
/// falls back to defaults. An explicitly given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, GwError> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if required {
            return Err(GwError::Config(format!("config file not found: {}", path.display())));
        }
        return Ok(ServiceConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| GwError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&text)
}

/// Parses and validates a TOML config document.
pub fn parse_config(text: &str) -> Result<ServiceConfig, GwError> {
    let mut config: ServiceConfig =
        toml::from_str(text).map_err(|e| GwError::Config(e.to_string()))?;
    config.normalize();
    config.validate()?;
    Ok(config)
}

impl ServiceConfig {
    fn normalize(&mut self) {
        for district in &mut self.districts {
            district.api_name = district.api_name.trim().to_string();
            if district.table_name.trim().is_empty() {
                district.table_name = districts::table_for(&district.api_name);
            }
        }
    }

    pub fn validate(&self) -> Result<(), GwError> {
        if self.districts.is_empty() {
            return Err(GwError::Config("at least one district must be configured".into()));
        }
        let mut tables = std::collections::HashSet::new();
        for district in &self.districts {
            if district.api_name.is_empty() {
                return Err(GwError::Config("district api_name must not be empty".into()));
            }
            if !districts::is_safe_table_name(&district.table_name) {
                return Err(GwError::Config(format!(
                    "unsafe table name '{}' for district {}",
                    district.table_name, district.api_name
                )));
            }
            if !tables.insert(district.table_name.as_str()) {
                return Err(GwError::Config(format!(
                    "table '{}' configured for more than one district",
                    district.table_name
                )));
            }
        }
        if self.upstream.page_size == 0 {
            return Err(GwError::Config("upstream.page_size must be positive".into()));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(GwError::Config("utc_offset_minutes out of range".into()));
        }
        Ok(())
    }

    pub fn local_offset(&self) -> FixedOffset {
        // validate() bounds the offset; hand-built configs fall back to UTC.
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }

    /// Calendar date at the stations' local offset.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::minutes(i64::from(self.utc_offset_minutes))).date_naive()
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Reads a secret from the environment, treating blank values as absent.
pub fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = parse_config("").expect("empty config should be valid");
        assert_eq!(config.districts.len(), 3);
        assert_eq!(config.upstream.state_name, "Punjab");
        assert_eq!(config.utc_offset_minutes, 330);
    }

    #[test]
    fn test_districts_without_table_take_conventional_name() {
        let text = r#"
            [[districts]]
            api_name = "Patiala"

            [[districts]]
            api_name = "Bathinda"
            table_name = "bathinda_summary"
        "#;
        let config = parse_config(text).expect("config should parse");
        assert_eq!(config.districts[0].table_name, "patiala_daily_summary");
        assert_eq!(config.districts[1].table_name, "bathinda_summary");
    }

    #[test]
    fn test_unsafe_table_name_rejected() {
        let text = r#"
            [[districts]]
            api_name = "Patiala"
            table_name = "patiala; drop table users"
        "#;
        let err = parse_config(text).expect_err("unsafe table must be rejected");
        assert!(matches!(err, GwError::Config(_)));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let text = r#"
            [[districts]]
            api_name = "Patiala"
            [[districts]]
            api_name = "patiala"
        "#;
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn test_empty_district_list_rejected() {
        assert!(parse_config("districts = []").is_err());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_config("[upstream]\npage_size = 500\n").unwrap();
        assert_eq!(config.upstream.page_size, 500);
        assert_eq!(config.upstream.agency_name, "CGWB");
    }

    #[test]
    fn test_today_uses_local_offset() {
        let config = ServiceConfig::default();
        // 20:00 UTC is already 01:30 the next day in IST.
        let now = Utc.with_ymd_and_hms(2025, 9, 14, 20, 0, 0).unwrap();
        assert_eq!(config.today(now), NaiveDate::from_ymd_opt(2025, 9, 15).unwrap());

        let utc = ServiceConfig { utc_offset_minutes: 0, ..ServiceConfig::default() };
        assert_eq!(utc.today(now), NaiveDate::from_ymd_opt(2025, 9, 14).unwrap());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "utc_offset_minutes = 0\n[daemon]\ninterval_minutes = 30").unwrap();
        let config = load_config(Some(file.path())).expect("file should load");
        assert_eq!(config.utc_offset_minutes, 0);
        assert_eq!(config.daemon.interval_minutes, 30);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/gwmon.toml")));
        assert!(result.is_err());
    }
}
