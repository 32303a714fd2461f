//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:8080`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DB_MAX_CONNECTIONS`: pool size (default 25)
/// - `CACHE_CAPACITY`: maximum cached orders (default 100)
/// - `WARM_CACHE`: fill the cache from the store before serving (default true)
/// - `INGEST_TIMEOUT_MS`, `READ_TIMEOUT_MS`: per-message and per-lookup deadlines
/// - `KAFKA_BROKERS`, `KAFKA_TOPIC`, `KAFKA_GROUP_ID`: consumer settings
/// - `STATIC_DIR`: directory holding the lookup page (default: this crate's `static/`)
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub cache_capacity: usize,
    pub warm_cache: bool,
    pub ingest_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub static_dir: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: parsed("HOST").unwrap_or(defaults.host),
            port: parse_or(parsed("PORT"), defaults.port),
            log_level: parsed("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_or(parsed("LOG_FORMAT"), defaults.log_format),
            database_url: parsed("DATABASE_URL"),
            db_max_connections: parse_or(parsed("DB_MAX_CONNECTIONS"), defaults.db_max_connections),
            cache_capacity: parse_or(parsed("CACHE_CAPACITY"), defaults.cache_capacity),
            warm_cache: parse_or(parsed("WARM_CACHE"), defaults.warm_cache),
            ingest_timeout_ms: parse_or(parsed("INGEST_TIMEOUT_MS"), defaults.ingest_timeout_ms),
            read_timeout_ms: parse_or(parsed("READ_TIMEOUT_MS"), defaults.read_timeout_ms),
            kafka_brokers: parsed("KAFKA_BROKERS").unwrap_or(defaults.kafka_brokers),
            kafka_topic: parsed("KAFKA_TOPIC").unwrap_or(defaults.kafka_topic),
            kafka_group_id: parsed("KAFKA_GROUP_ID").unwrap_or(defaults.kafka_group_id),
            static_dir: parsed("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            db_max_connections: 25,
            cache_capacity: 100,
            warm_cache: true,
            ingest_timeout_ms: 5_000,
            read_timeout_ms: 2_000,
            kafka_brokers: "localhost:9092".to_string(),
            kafka_topic: "orders".to_string(),
            kafka_group_id: "order-tracker-group".to_string(),
            static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        }
    }
}
