//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::game::UserId;
use crate::util::rate_limit::RateLimitScope;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Secret the bearer tokens are signed with
    pub jwt_secret: String,

    /// Users taking part in this round
    pub roster: Vec<UserId>,
    pub map_width: i32,
    pub map_height: i32,
    /// Optional JSON file with a row-major terrain matrix
    pub map_file: Option<PathBuf>,
    /// Seed for spawn placement; random when unset
    pub map_seed: Option<u64>,

    /// Whether operation budgets are shared per user or per connection
    pub rate_limit_scope: RateLimitScope,
    /// Send the `debug` flag to watchers
    pub watch_debug_flag: bool,

    /// Delay between spawning the roster and accepting connections
    pub start_delay: Duration,
    /// Round length; the server shuts down afterwards
    pub round_duration: Duration,

    /// Allowed client origin for CORS
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let roster = parse_roster(
            &env::var("ROUND_ROSTER").map_err(|_| ConfigError::Missing("ROUND_ROSTER"))?,
        )?;

        let rate_limit_scope = match env::var("RATE_LIMIT_SCOPE") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("RATE_LIMIT_SCOPE", v))?,
            Err(_) => RateLimitScope::default(),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,

            roster,
            map_width: parse_or("MAP_WIDTH", 11)?,
            map_height: parse_or("MAP_HEIGHT", 11)?,
            map_file: env::var("MAP_FILE").ok().map(PathBuf::from),
            map_seed: parse_opt("MAP_SEED")?,

            rate_limit_scope,
            watch_debug_flag: parse_or("WATCH_DEBUG_FLAG", false)?,

            start_delay: Duration::from_secs(parse_or("START_DELAY_SECS", 2)?),
            round_duration: Duration::from_secs(parse_or("ROUND_DURATION_SECS", 3600)?),

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

/// Comma separated user ids, duplicates dropped
pub fn parse_roster(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    let mut roster: Vec<UserId> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse()
            .map_err(|_| ConfigError::Invalid("ROUND_ROSTER", part.to_string()))?;
        if !roster.contains(&id) {
            roster.push(id);
        }
    }
    if roster.is_empty() {
        return Err(ConfigError::Invalid("ROUND_ROSTER", raw.to_string()));
    }
    Ok(roster)
}

fn parse_opt<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key, v)),
        Err(_) => Ok(None),
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}
