//! Configuration module for the EvalTrack backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Quiet period before a dirty collection is flushed, in milliseconds
    pub debounce_ms: u64,
    /// Forced flush interval bounding staleness, in milliseconds
    pub flush_interval_ms: u64,
    /// Delay between a forced resync and its follow-up refresh, in milliseconds
    pub resync_settle_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("EVALTRACK_DB_PATH")
            .unwrap_or_else(|_| "./data/evaltrack.sqlite".to_string())
            .into();

        let bind_addr = env::var("EVALTRACK_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8087".to_string())
            .parse()
            .expect("Invalid EVALTRACK_BIND_ADDR format");

        let log_level = env::var("EVALTRACK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let debounce_ms = env_u64("EVALTRACK_DEBOUNCE_MS", 500);
        let flush_interval_ms = env_u64("EVALTRACK_FLUSH_INTERVAL_MS", 30_000);
        let resync_settle_ms = env_u64("EVALTRACK_RESYNC_SETTLE_MS", 250);

        Self {
            db_path,
            bind_addr,
            log_level,
            debounce_ms,
            flush_interval_ms,
            resync_settle_ms,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("EVALTRACK_DB_PATH");
        env::remove_var("EVALTRACK_BIND_ADDR");
        env::remove_var("EVALTRACK_LOG_LEVEL");
        env::remove_var("EVALTRACK_DEBOUNCE_MS");
        env::remove_var("EVALTRACK_FLUSH_INTERVAL_MS");
        env::remove_var("EVALTRACK_RESYNC_SETTLE_MS");

        let config = Config::from_env();

        assert_eq!(config.db_path, PathBuf::from("./data/evaltrack.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8087");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.flush_interval_ms, 30_000);
        assert_eq!(config.resync_settle_ms, 250);
    }

    #[test]
    fn test_malformed_numeric_falls_back_to_default() {
        env::set_var("EVALTRACK_DEBOUNCE_MS", "soon");
        let config = Config::from_env();
        assert_eq!(config.debounce_ms, 500);
        env::remove_var("EVALTRACK_DEBOUNCE_MS");
    }
}
