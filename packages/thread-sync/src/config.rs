//! Client configuration.
//!
//! Loaded from `config.toml` in the platform config directory (or the file
//! named by `THREAD_SYNC_CONFIG`), then overridden by environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionOptions, ReconnectPolicy};
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_THREAD_PATH: &str = "/messages/thread";
pub const DEFAULT_SEND_PATH: &str = "/messages/send";
pub const WS_CONNECT_PATH: &str = "/ws/connect";

/// Configuration for the REST client and live transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, including the version prefix.
    pub api_url: String,
    /// Live transport endpoint. Derived from `api_url` when unset.
    pub ws_url: Option<String>,
    pub thread_path: String,
    pub send_path: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            thread_path: DEFAULT_THREAD_PATH.to_string(),
            send_path: DEFAULT_SEND_PATH.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect settings for the live transport. Disabled unless opted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Load from the default path, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_path(&Self::default_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Can be overridden with the `THREAD_SYNC_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("THREAD_SYNC_CONFIG") {
            return PathBuf::from(path);
        }

        directories::ProjectDirs::from("", "", "thread-sync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("thread-sync.toml"))
    }

    /// Read a TOML config file. Missing files yield the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `THREAD_SYNC_API_URL` and `THREAD_SYNC_WS_URL`.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_blank_env("THREAD_SYNC_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = non_blank_env("THREAD_SYNC_WS_URL") {
            self.ws_url = Some(url);
        }
    }

    /// URL of the live transport endpoint.
    ///
    /// `http` becomes `ws`, `https` becomes `wss`, and `/ws/connect` is
    /// appended to the API path.
    pub fn websocket_url(&self) -> Result<String> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }

        let api = self.api_url.trim_end_matches('/');
        let (scheme, rest) = if let Some(rest) = api.strip_prefix("https://") {
            ("wss", rest)
        } else if let Some(rest) = api.strip_prefix("http://") {
            ("ws", rest)
        } else {
            return Err(Error::Config(format!(
                "api_url must start with http:// or https://: {}",
                self.api_url
            )));
        };

        Ok(format!("{}://{}{}", scheme, rest, WS_CONNECT_PATH))
    }

    /// URL for fetching one thread's snapshot.
    pub fn thread_url(&self, thread_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.api_url.trim_end_matches('/'),
            self.thread_path,
            thread_id
        )
    }

    pub fn send_url(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), self.send_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport options derived from this config.
    pub fn connection_options(&self) -> ConnectionOptions {
        let reconnect = if self.reconnect.enabled {
            ReconnectPolicy::Backoff {
                initial: Duration::from_millis(self.reconnect.initial_delay_ms.max(1)),
                max: Duration::from_millis(self.reconnect.max_delay_ms.max(1)),
            }
        } else {
            ReconnectPolicy::Disabled
        };

        ConnectionOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            reconnect,
            ..ConnectionOptions::default()
        }
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_websocket_url_derived_from_api_url() {
        let config = ClientConfig::default();
        assert_eq!(
            config.websocket_url().unwrap(),
            "ws://127.0.0.1:8000/api/v1/ws/connect"
        );

        let config = ClientConfig {
            api_url: "https://api.example.com/api/v1/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.websocket_url().unwrap(),
            "wss://api.example.com/api/v1/ws/connect"
        );
    }

    #[test]
    fn test_explicit_websocket_url_wins() {
        let config = ClientConfig {
            ws_url: Some("ws://push.example.com/live".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(config.websocket_url().unwrap(), "ws://push.example.com/live");
    }

    #[test]
    fn test_websocket_url_rejects_unknown_scheme() {
        let config = ClientConfig {
            api_url: "ftp://example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.websocket_url(), Err(Error::Config(_))));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ClientConfig::default();
        assert_eq!(
            config.thread_url("t1"),
            "http://127.0.0.1:8000/api/v1/messages/thread/t1"
        );
        assert_eq!(config.send_url(), "http://127.0.0.1:8000/api/v1/messages/send");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::from_path(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
api_url = "https://api.example.com/api/v1"

[reconnect]
enabled = true
"#,
        )
        .unwrap();

        let config = ClientConfig::from_path(&path).unwrap();
        assert_eq!(config.api_url, "https://api.example.com/api/v1");
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert!(matches!(
            config.connection_options().reconnect,
            ReconnectPolicy::Backoff { .. }
        ));
    }

    #[test]
    fn test_zero_reconnect_delays_are_floored() {
        let mut config = ClientConfig::default();
        config.reconnect = ReconnectConfig {
            enabled: true,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        };

        assert_eq!(
            config.connection_options().reconnect,
            ReconnectPolicy::Backoff {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(1),
            }
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = [").unwrap();

        assert!(matches!(ClientConfig::from_path(&path), Err(Error::Config(_))));
    }
}
