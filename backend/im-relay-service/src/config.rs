use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for a single history page.
pub const MAX_HISTORY_PAGE_LIMIT: i64 = 200;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: usize,
    pub redis_url: String,
    pub last_chat_key_prefix: String,
    pub port: u16,
    pub websocket: WebSocketConfig,
    pub history_page_limit: i64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into());
        let last_chat_key_prefix =
            lookup("LAST_CHAT_KEY_PREFIX").unwrap_or_else(|| "im:last_chat".into());

        let port = parse_or(&lookup, "PORT", 8080u16)?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 20usize)?;
        let heartbeat_secs = parse_or(&lookup, "WS_HEARTBEAT_INTERVAL_SECS", 5u64)?;
        let timeout_secs = parse_or(&lookup, "WS_CLIENT_TIMEOUT_SECS", 30u64)?;
        let history_page_limit = parse_or(&lookup, "HISTORY_PAGE_LIMIT", 50i64)?;
        let log_format = parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?;

        if heartbeat_secs == 0 || timeout_secs <= heartbeat_secs {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed a non-zero WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }
        if !(1..=MAX_HISTORY_PAGE_LIMIT).contains(&history_page_limit) {
            return Err(AppError::Config(format!(
                "HISTORY_PAGE_LIMIT must be between 1 and {MAX_HISTORY_PAGE_LIMIT}"
            )));
        }

        Ok(Self {
            database_url,
            db_max_connections,
            redis_url,
            last_chat_key_prefix,
            port,
            websocket: WebSocketConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                client_timeout: Duration::from_secs(timeout_secs),
            },
            history_page_limit,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} is not a valid value: {raw}"))),
    }
}
