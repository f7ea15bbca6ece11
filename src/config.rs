//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Log output format selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Bound of every per-session delivery queue.
    pub subscriber_queue_capacity: usize,

    /// Whether `clear` emits an empty-mapping change per cleared entity.
    pub broadcast_on_clear: bool,

    /// Directory served under `/static`.
    pub static_dir: PathBuf,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            subscriber_queue_capacity: 10_000,
            broadcast_on_clear: true,
            static_dir: PathBuf::from("static"),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid LISTEN_ADDR {raw:?}"))?,
            Err(_) => defaults.listen_addr,
        };

        let subscriber_queue_capacity =
            parse_env("SUBSCRIBER_QUEUE_CAPACITY", defaults.subscriber_queue_capacity).max(1);
        let broadcast_on_clear = parse_env_bool("BROADCAST_ON_CLEAR", defaults.broadcast_on_clear);
        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            subscriber_queue_capacity,
            broadcast_on_clear,
            static_dir,
            log_format,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean, returning `default` on
/// missing or unrecognized values.
fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Accepts `"true"`, `"1"`, `"false"`, `"0"` (case-insensitive).
fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw == "1" || raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw == "0" || raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_generous() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.subscriber_queue_capacity, 10_000);
        assert!(config.broadcast_on_clear);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn bool_parsing_ignores_case() {
        for raw in ["true", "TRUE", "True", "tRuE", "1", " true "] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "FALSE", "False", "0"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        for raw in ["yes", "", "2", "truthy"] {
            assert_eq!(parse_bool(raw), None, "{raw}");
        }
    }

    #[test]
    fn missing_variables_fall_back() {
        assert_eq!(parse_env("WORLDCAST_TEST_UNSET_NUMBER", 7usize), 7);
        assert!(parse_env_bool("WORLDCAST_TEST_UNSET_FLAG", true));
        assert!(!parse_env_bool("WORLDCAST_TEST_UNSET_FLAG", false));
    }
}
