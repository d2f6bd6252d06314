//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::WorldConfig;
use crate::matchmaking::AdmissionPolicy;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format
    pub log_format: LogFormat,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Parameters for every new room's world
    pub world: WorldConfig,
    /// Which join admission policy rooms use
    pub admission: AdmissionPolicy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:2567".to_string()),
        };

        let defaults = WorldConfig::default();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            world: WorldConfig {
                alpaca_count: parse_or(&lookup, "ALPACA_COUNT", defaults.alpaca_count)?,
                decoration_count: parse_or(&lookup, "DECORATION_COUNT", defaults.decoration_count)?,
                clamp_player_intent: parse_or(
                    &lookup,
                    "CLAMP_PLAYER_INTENT",
                    defaults.clamp_player_intent,
                )?,
            },
            admission: parse_or(&lookup, "ADMISSION_POLICY", AdmissionPolicy::CreateOrOccupied)?,
        })
    }
}

/// `text` for humans, `json` for log shippers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
