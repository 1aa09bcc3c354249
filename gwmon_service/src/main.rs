//! gwmon: groundwater monitoring refresh jobs and dashboard queries.
//!
//! Every subcommand prints one JSON document on stdout. Failures print
//! `{"error": "..."}` and exit non-zero. Logs go to stderr or the file
//! configured under `[logging]`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use gwmon_service::alert::thresholds::daily_alerts;
use gwmon_service::analysis::{forecast, geo, kpi, listing};
use gwmon_service::config::{self, ENV_LLM_KEY, ENV_WEATHER_KEY, ServiceConfig};
use gwmon_service::db::{Complaint, LIVE_TABLE, PgStore, StationStore};
use gwmon_service::ingest::llm::LlmClient;
use gwmon_service::ingest::weather::WeatherClient;
use gwmon_service::ingest::wris::WrisClient;
use gwmon_service::logging::{self, DataSource, LogLevel};
use gwmon_service::model::GwError;
use gwmon_service::{refresh, verify};

#[derive(Parser, Debug)]
#[command(name = "gwmon", version, about = "Groundwater monitoring refresh service")]
struct Cli {
    /// Path to the TOML config file (defaults to ./gwmon.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild every district's ten-day summary table
    RefreshDistricts,
    /// Overwrite the live status table with the newest reading per station
    RefreshLive,
    /// Run both refresh jobs on the configured interval
    Run {
        /// Stop after this many cycles (runs forever when omitted)
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Five-day level forecast for one station
    Forecast {
        #[arg(long)]
        station: String,
        #[arg(long)]
        district: String,
    },
    /// Stations stored for one district, with latest level and history
    Stations {
        #[arg(long)]
        district: String,
    },
    /// Crop recommendation for a location
    Recommend {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value = "en")]
        locale: String,
    },
    /// Today's Red and Yellow station alerts
    Alerts,
    /// Dashboard headline numbers
    Kpi,
    /// Stations closest to a location
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Search stations by name, code or district
    Search { query: String },
    /// Submit a complaint
    Complain {
        #[arg(long)]
        name: String,
        #[arg(long)]
        contact: String,
        #[arg(long)]
        complaint: String,
    },
    /// Check every district against the live API
    Verify,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let result = config::load_config(cli.config.as_deref()).and_then(|config| {
        let level: LogLevel = config.logging.level.parse()?;
        logging::init_logger(level, config.logging.file.as_deref(), config.logging.console_timestamps)?;
        execute(cli.command, &config)
    });

    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()));
            ExitCode::SUCCESS
        }
        Err(err) => {
            logging::error(DataSource::System, None, &err.to_string());
            println!("{}", json!({ "error": err.to_string() }));
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command, config: &ServiceConfig) -> Result<Value, GwError> {
    let now = Utc::now();
    let today = config.today(now);

    match command {
        Command::RefreshDistricts => {
            let source = WrisClient::new(config.upstream.clone())?;
            let mut store = PgStore::connect()?;
            let report =
                refresh::refresh_district_summaries(&source, &mut store, &config.districts, today, now);
            Ok(serde_json::to_value(report)?)
        }
        Command::RefreshLive => {
            let source = WrisClient::new(config.upstream.clone())?;
            let mut store = PgStore::connect()?;
            let report = refresh::refresh_live_status(&source, &mut store, &config.districts, today)?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Run { cycles } => run_daemon(config, cycles),
        Command::Forecast { station, district } => {
            let mut store = PgStore::connect()?;
            let rain = WeatherClient::new(
                config.weather.clone(),
                config::env_secret(ENV_WEATHER_KEY),
                config.local_offset(),
            )?;
            let result =
                forecast::station_forecast(&mut store, &rain, &config.districts, &station, &district)?;
            Ok(serde_json::to_value(result)?)
        }
        Command::Stations { district } => {
            let mut store = PgStore::connect()?;
            let result = listing::list_district_stations(
                &mut store,
                &config.districts,
                &district,
                config.daemon.stale_after_minutes,
                now,
            )?;
            Ok(serde_json::to_value(result)?)
        }
        Command::Recommend { lat, lon, locale } => {
            let client = LlmClient::new(config.llm.clone(), config::env_secret(ENV_LLM_KEY))?;
            let recommendation = client.recommend(lat, lon, &locale, today.month())?;
            Ok(serde_json::to_value(recommendation)?)
        }
        Command::Alerts => {
            let rows = PgStore::connect()?.fetch_live()?;
            Ok(serde_json::to_value(daily_alerts(&rows, today))?)
        }
        Command::Kpi => {
            let rows = PgStore::connect()?.fetch_live()?;
            let summary = kpi::summarize(
                &rows,
                config.local_offset(),
                now,
                config.daemon.stale_after_minutes,
            );
            Ok(serde_json::to_value(summary)?)
        }
        Command::Nearest { lat, lon, limit } => {
            let rows = PgStore::connect()?.fetch_live()?;
            Ok(serde_json::to_value(geo::nearest_stations(&rows, (lat, lon), limit))?)
        }
        Command::Search { query } => {
            let rows = PgStore::connect()?.fetch_live()?;
            Ok(serde_json::to_value(geo::search_stations(&rows, &query))?)
        }
        Command::Complain { name, contact, complaint } => {
            let complaint = Complaint { name, contact, complaint };
            complaint.validate()?;
            PgStore::connect()?.insert_complaint(&complaint)?;
            Ok(json!({ "message": "Complaint submitted." }))
        }
        Command::Verify => {
            let source = WrisClient::new(config.upstream.clone())?;
            let report = verify::run_verification(&source, &config.districts, today, now);
            Ok(serde_json::to_value(report)?)
        }
    }
}

/// Runs both jobs every `daemon.interval_minutes`. A failed cycle is logged
/// and retried on the next tick; only setup errors end the loop.
fn run_daemon(config: &ServiceConfig, cycles: Option<u64>) -> Result<Value, GwError> {
    let mut tables: Vec<&str> = config.districts.iter().map(|d| d.table_name.as_str()).collect();
    tables.push(LIVE_TABLE);
    let mut store = PgStore::new(gwmon_service::db::connect_and_verify(&tables)?);
    let source = WrisClient::new(config.upstream.clone())?;
    let interval = Duration::from_secs(config.daemon.interval_minutes.max(1) * 60);

    logging::info(
        DataSource::System,
        None,
        &format!(
            "Starting refresh loop: {} districts every {} minutes",
            config.districts.len(),
            config.daemon.interval_minutes
        ),
    );

    let mut completed = 0u64;
    loop {
        let now = Utc::now();
        let today = config.today(now);

        let summary =
            refresh::refresh_district_summaries(&source, &mut store, &config.districts, today, now);
        logging::info(DataSource::System, None, &summary.message);

        match refresh::refresh_live_status(&source, &mut store, &config.districts, today) {
            Ok(live) => logging::info(DataSource::System, None, &live.message),
            Err(err) => logging::log_failure(DataSource::Database, LIVE_TABLE, "live refresh", &err),
        }

        completed += 1;
        if cycles.is_some_and(|max| completed >= max) {
            return Ok(json!({ "message": format!("Completed {} refresh cycles.", completed) }));
        }
        std::thread::sleep(interval);
    }
}
