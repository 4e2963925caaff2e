//! Application settings, read from `settings.toml`.
use chrono::{DateTime, Utc};
use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub database: Database,
    pub bind: Option<String>,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Finance {
    /// Events ordered before this date are never priced.
    pub price_events_min_date: Option<DateTime<Utc>>,
    #[serde(default = "default_lock_timeout")]
    pub cashflow_lock_timeout_minutes: i64,
    /// Period of the background jobs (auto-use, expiry, pricing). No jobs
    /// run when unset.
    pub jobs_interval_minutes: Option<u64>,
}

impl Default for Finance {
    fn default() -> Self {
        Self {
            price_events_min_date: None,
            cashflow_lock_timeout_minutes: default_lock_timeout(),
            jobs_interval_minutes: None,
        }
    }
}

fn default_lock_timeout() -> i64 {
    engine::DEFAULT_CASHFLOW_LOCK_TIMEOUT_MINUTES
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub finance: Finance,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .build()?;

        settings.try_deserialize()
    }
}
