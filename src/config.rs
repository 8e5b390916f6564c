use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;
use clap::Parser;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Phytoscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Diagnoses are listed 10 per page. Part of the listing contract.
pub const DIAGNOSIS_PAGE_SIZE: u32 = 10;

/// Page size for every other listing.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Get the application data directory
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("phytoscan.db")
}

/// Default directory for persisted report snapshots
pub fn default_reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// Whole-hour UTC offsets accepted for calendar days.
pub const MAX_UTC_OFFSET_HOURS: i32 = 23;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "phytoscan=info,tower_http=info"
}

/// Runtime settings for the server binary. Every flag can also be
/// supplied through the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "phytoscan",
    version,
    about = "Plant diagnosis verification and task dispatch service"
)]
pub struct Settings {
    /// SQLite database file
    #[arg(long, env = "PHYTOSCAN_DATABASE", default_value_os_t = default_database_path())]
    pub database: PathBuf,

    /// Address the HTTP API listens on
    #[arg(long, env = "PHYTOSCAN_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Directory for persisted report snapshots
    #[arg(long, env = "PHYTOSCAN_REPORTS_DIR", default_value_os_t = default_reports_dir())]
    pub reports_dir: PathBuf,

    /// Base URL of the inference service used to recreate diagnoses
    #[arg(long, env = "PHYTOSCAN_INFERENCE_URL")]
    pub inference_url: Option<String>,

    /// Inference request timeout in seconds
    #[arg(long, env = "PHYTOSCAN_INFERENCE_TIMEOUT_SECS", default_value_t = 120)]
    pub inference_timeout_secs: u64,

    /// Offset from UTC, in hours, that defines calendar days in time series
    #[arg(
        long,
        env = "PHYTOSCAN_UTC_OFFSET_HOURS",
        default_value_t = 0,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i32).range(-23..=23)
    )]
    pub utc_offset_hours: i32,

    /// JSON catalog (diseases, treatments, users) inserted on startup when missing
    #[arg(long, env = "PHYTOSCAN_CATALOG_SEED")]
    pub catalog_seed: Option<PathBuf>,

    /// Labels the inference model can emit; each gets a disease row on startup
    #[arg(long, env = "PHYTOSCAN_INFERENCE_LABELS", value_delimiter = ',')]
    pub inference_labels: Vec<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("UTC offset {0}h is outside -{MAX_UTC_OFFSET_HOURS}..={MAX_UTC_OFFSET_HOURS}")]
pub struct InvalidUtcOffset(pub i32);

impl Settings {
    /// Offset that defines calendar days.
    pub fn day_offset(&self) -> Result<FixedOffset, InvalidUtcOffset> {
        let hours = self.utc_offset_hours;
        if !(-MAX_UTC_OFFSET_HOURS..=MAX_UTC_OFFSET_HOURS).contains(&hours) {
            return Err(InvalidUtcOffset(hours));
        }
        FixedOffset::east_opt(hours * 3600).ok_or(InvalidUtcOffset(hours))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            reports_dir: default_reports_dir(),
            inference_url: None,
            inference_timeout_secs: 120,
            utc_offset_hours: 0,
            catalog_seed: None,
            inference_labels: Vec::new(),
        }
    }
}
