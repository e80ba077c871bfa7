use std::{env, path::PathBuf};

use chrono_tz::Tz;

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub max_pool_size: u32,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    /// Civil time zone every trip and checkpoint timestamp is captured in.
    pub trip_timezone: Tz,
    pub logo_path: PathBuf,
    pub default_admin_password: String,
    pub default_driver_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/trips.db".to_string()),
            max_pool_size: env::var("MAX_POOL_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiration_hours: parse_expiration_hours(
                &env::var("JWT_EXPIRATION_HOURS").unwrap_or_else(|_| "24".to_string()),
            )?,
            trip_timezone: parse_timezone(
                &env::var("TRIP_TIMEZONE").unwrap_or_else(|_| "Asia/Riyadh".to_string()),
            )?,
            logo_path: env::var("LOGO_PATH")
                .unwrap_or_else(|_| "static/logo.png".to_string())
                .into(),
            default_admin_password: env::var("DEFAULT_ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
            default_driver_password: env::var("DEFAULT_DRIVER_PASSWORD")
                .ok()
                .filter(|password| !password.is_empty()),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Token lifetime in hours, at most ten years.
const MAX_EXPIRATION_HOURS: i64 = 24 * 365 * 10;

fn parse_expiration_hours(raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|hours| (1..=MAX_EXPIRATION_HOURS).contains(hours))
        .ok_or_else(|| ConfigError::InvalidExpiration(raw.to_string()))
}

fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Unknown time zone: {0}")]
    InvalidTimezone(String),

    #[error("JWT_EXPIRATION_HOURS must be between 1 and 87600, got {0}")]
    InvalidExpiration(String),
}
