use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// No URL means the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,

    pub api_prefix: String,
    pub rate_protected_per_min: u32,

    pub geofence_poll: Duration,
    pub location_ttl: Duration,
    pub zones_path: Option<PathBuf>,
    pub work_offset: FixedOffset,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn var_or<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();

        let poll_secs: u64 = var_or("GEOFENCE_POLL_SECS", 30)?;
        if poll_secs == 0 {
            return Err(AppError::Config("GEOFENCE_POLL_SECS must be at least 1".into()));
        }
        let offset_hours: i32 = var_or("WORK_UTC_OFFSET_HOURS", -5)?;
        let work_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("WORK_UTC_OFFSET_HOURS out of range: {offset_hours}"))
        })?;

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "0.0.0.0:8080".to_string())?,
            database_url: optional_var("DATABASE_URL"),
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: var_or("RUN_MIGRATIONS", false)?,

            api_prefix: var_or("API_PREFIX", "/api".to_string())?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            geofence_poll: Duration::from_secs(poll_secs),
            location_ttl: Duration::from_secs(var_or("LOCATION_TTL_SECS", 300)?),
            zones_path: optional_var("GEOFENCE_ZONES_PATH").map(PathBuf::from),
            work_offset,

            log_dir: var_or("LOG_DIR", "logs".to_string())?,
            log_level: var_or("LOG_LEVEL", tracing::Level::DEBUG)?,
        })
    }
}
