use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::Source;

pub const CONGRESS_TRADES_FILE: &str = "congress_trades.csv";
pub const INSIDER_TRADES_FILE: &str = "insider_trades.csv";
pub const HEDGE_FUND_TRADES_FILE: &str = "hedge_fund_trades.csv";
pub const BUY_TABLE_FILE: &str = "buy_recommendations.csv";
pub const SELL_TABLE_FILE: &str = "sell_recommendations.csv";

/// Column holding the ticker in every raw dataset.
pub const TICKER_COLUMN: &str = "ticker";

/// Placeholder the collectors write when a row has no ticker.
pub const TICKER_SENTINEL: &str = "-";

/// Candidates with less combined weighted activity than this are noise.
pub const MIN_TOTAL_WEIGHT: f64 = 1.5;

/// Default refresh cadence (minutes).
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: i64 = 5;

/// Default per-collector wall-clock limit (seconds).
pub const DEFAULT_COLLECTOR_TIMEOUT_SECS: u64 = 600;

/// Per-source, per-direction multipliers applied to event counts.
/// Insider sells weigh less than insider buys: routine selling is a weaker signal.
pub mod weights {
    pub const CONGRESS_BUY: f64 = 1.0;
    pub const CONGRESS_SELL: f64 = 1.0;
    pub const INSIDER_BUY: f64 = 2.5;
    pub const INSIDER_SELL: f64 = 1.8;
    pub const HEDGE_FUND_BUY: f64 = 1.5;
    pub const HEDGE_FUND_SELL: f64 = 1.5;
}

/// Confidence percentage cut-offs for the categorical label.
pub mod confidence_thresholds {
    pub const HIGH_MIN: f64 = 66.0;
    pub const MEDIUM_MIN: f64 = 33.0;
}

/// Index ETFs hidden from the read feed unless the caller opts out.
pub const EXCLUDED_ETFS: &[&str] = &[
    "SPY", "QQQ", "VTI", "IWM", "DIA", "IVV", "EFA", "EEM", "XLF", "XLK", "XLE", "XLV", "XLY",
    "XLP", "XLI", "XLB", "VNQ", "TLT", "HYG", "ARKK",
];

/// Locations of the raw datasets and published tables inside the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    dir: PathBuf,
}

impl DataPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dataset(&self, source: Source) -> PathBuf {
        let file = match source {
            Source::Congress => CONGRESS_TRADES_FILE,
            Source::Insider => INSIDER_TRADES_FILE,
            Source::HedgeFund => HEDGE_FUND_TRADES_FILE,
        };
        self.dir.join(file)
    }

    pub fn buy_table(&self) -> PathBuf {
        self.dir.join(BUY_TABLE_FILE)
    }

    pub fn sell_table(&self) -> PathBuf {
        self.dir.join(SELL_TABLE_FILE)
    }
}

/// Executable plus arguments for one external collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CollectorCommand {
    /// Split a whitespace-separated command line. Quoting is not supported.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub data_dir: PathBuf,
    /// Pause between cycles (REFRESH_INTERVAL_MINUTES). `None` runs a single cycle.
    pub refresh_interval: Option<Duration>,
    pub collector_timeout: Duration,
    /// Collectors in the order they run each cycle.
    pub collectors: Vec<(Source, CollectorCommand)>,
    pub api_enabled: bool,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let refresh_interval_minutes = std::env::var("REFRESH_INTERVAL_MINUTES")
            .unwrap_or_else(|_| DEFAULT_REFRESH_INTERVAL_MINUTES.to_string())
            .trim()
            .parse::<i64>()
            .map_err(|_| {
                AppError::Config("REFRESH_INTERVAL_MINUTES must be a whole number".to_string())
            })?;
        let refresh_interval = refresh_interval_from_minutes(refresh_interval_minutes)?;

        let collector_timeout_secs = std::env::var("COLLECTOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_COLLECTOR_TIMEOUT_SECS.to_string())
            .trim()
            .parse::<u64>()
            .map_err(|_| {
                AppError::Config("COLLECTOR_TIMEOUT_SECS must be a positive number".to_string())
            })?;

        let api_enabled = match std::env::var("API_ENABLED") {
            Ok(v) => parse_bool(&v).ok_or_else(|| {
                AppError::Config("API_ENABLED must be true or false".to_string())
            })?,
            Err(_) => true,
        };

        let collectors = [Source::Insider, Source::Congress, Source::HedgeFund]
            .into_iter()
            .map(|source| collector_from_env(source).map(|cmd| (source, cmd)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            refresh_interval,
            collector_timeout: Duration::from_secs(collector_timeout_secs),
            collectors,
            api_enabled,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(self.data_dir.clone())
    }
}

/// Zero or negative minutes mean run once and stop.
pub fn refresh_interval_from_minutes(minutes: i64) -> Result<Option<Duration>> {
    if minutes <= 0 {
        return Ok(None);
    }
    let secs = (minutes as u64).checked_mul(60).ok_or_else(|| {
        AppError::Config(format!("REFRESH_INTERVAL_MINUTES={minutes} is too large"))
    })?;
    Ok(Some(Duration::from_secs(secs)))
}

fn collector_from_env(source: Source) -> Result<CollectorCommand> {
    let (var, default) = match source {
        Source::Insider => (
            "INSIDER_COLLECTOR_CMD",
            "python3 scripts/insider_data_scraper.py",
        ),
        Source::Congress => (
            "CONGRESS_COLLECTOR_CMD",
            "python3 scripts/congress_data_scraper.py",
        ),
        Source::HedgeFund => (
            "HEDGE_FUND_COLLECTOR_CMD",
            "python3 scripts/hedge_fund_data_scraper.py",
        ),
    };
    let line = std::env::var(var).unwrap_or_else(|_| default.to_string());
    CollectorCommand::parse(&line).ok_or_else(|| AppError::Config(format!("{var} must not be empty")))
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
