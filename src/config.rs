use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::{ScreenerParams, Thresholds, TradeDate};

pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_ARCHIVE_URL: &str = "https://nsearchives.nseindia.com";

/// NSE rejects requests without a browser-looking user agent.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// First trade date published in the UDiFF bhavcopy layout. Earlier dates use the legacy archive.
pub const UDIFF_FIRST_DATE: (i32, u32, u32) = (2024, 7, 8);

pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Export file name prefixes, suffixed with `_<DD-MM-YYYY>.csv`.
pub const REPORT_FILE_PREFIX: &str = "OI_Data";
pub const MOVERS_FILE_PREFIX: &str = "OI_Winners";

/// Dashboard slider bounds and defaults (percent).
pub mod threshold_bounds {
    pub const GAIN_MIN: f64 = 5.0;
    pub const GAIN_MAX: f64 = 50.0;
    pub const GAIN_DEFAULT: f64 = 10.0;
    pub const LOSS_MIN: f64 = -50.0;
    pub const LOSS_MAX: f64 = -1.0;
    pub const LOSS_DEFAULT: f64 = -5.0;
    pub const STEP: f64 = 1.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Dashboard log destination (LOG_FILE). The headless binary logs to stderr.
    pub log_file: String,
    pub nse_base_url: String,
    pub nse_archive_url: String,
    pub http_timeout: Duration,
    /// Directory the OI_Data / OI_Winners files are written to (EXPORT_DIR)
    pub export_dir: String,
    /// Bhavcopy date as typed, DD-MM-YYYY (OI_DATE). Validated when a run starts.
    pub date: String,
    pub gain_threshold: f64,
    pub loss_threshold: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        use threshold_bounds::*;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: std::env::var("LOG_FILE").unwrap_or_else(|_| "oi-screener.log".to_string()),
            nse_base_url: std::env::var("NSE_BASE_URL")
                .unwrap_or_else(|_| NSE_BASE_URL.to_string()),
            nse_archive_url: std::env::var("NSE_ARCHIVE_URL")
                .unwrap_or_else(|_| NSE_ARCHIVE_URL.to_string()),
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?),
            export_dir: std::env::var("EXPORT_DIR").unwrap_or_else(|_| ".".to_string()),
            date: std::env::var("OI_DATE").unwrap_or_else(|_| TradeDate::today_string()),
            gain_threshold: parse_env("OI_GAIN_THRESHOLD", GAIN_DEFAULT)?,
            loss_threshold: parse_env("OI_LOSS_THRESHOLD", LOSS_DEFAULT)?,
        })
    }

    /// Validate the run parameters carried by this config.
    pub fn screener_params(&self) -> Result<ScreenerParams> {
        Ok(ScreenerParams {
            date: TradeDate::parse(&self.date)?,
            thresholds: Thresholds::new(self.gain_threshold, self.loss_threshold)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
