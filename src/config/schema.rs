//! Static configuration schema.
//!
//! The static configuration is read once at startup. It declares the entry points,
//! lifecycle timings, the providers that feed dynamic configuration, and the
//! optional ping/API endpoints. Everything routed at runtime lives in the dynamic
//! configuration (see [`crate::config::dynamic`]).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::dynamic::DynamicConfig;

/// Root static configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Named listeners.
    pub entry_points: BTreeMap<String, EntryPointConfig>,

    /// Shutdown timings.
    pub lifecycle: LifecycleConfig,

    /// Router-level path matching policy.
    pub routing: RoutingConfig,

    /// Settings for the default upstream forwarder.
    pub forwarding: ForwardingConfig,

    /// Health endpoint. Disabled when absent.
    pub ping: Option<PingConfig>,

    /// Administrative read API. Disabled when absent.
    pub api: Option<ApiConfig>,

    /// Logging settings.
    pub log: LogConfig,

    /// Configuration sources.
    pub providers: ProvidersConfig,
}

impl Default for StaticConfig {
    fn default() -> Self {
        let mut entry_points = BTreeMap::new();
        entry_points.insert("web".to_string(), EntryPointConfig::default());
        Self {
            entry_points,
            lifecycle: LifecycleConfig::default(),
            routing: RoutingConfig::default(),
            forwarding: ForwardingConfig::default(),
            ping: None,
            api: None,
            log: LogConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// A single entry point (listener).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryPointConfig {
    /// Bind address (e.g., "0.0.0.0:8000"). Port 0 picks an ephemeral port.
    pub address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".to_string(),
            max_connections: 10_000,
        }
    }
}

impl EntryPointConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

/// Graceful shutdown timings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on draining once entry points stop accepting, in milliseconds.
    pub grace_timeout_ms: u64,

    /// How long entry points keep accepting after the health probe flips, in
    /// milliseconds. Zero closes listeners as soon as draining starts, so
    /// `/ping` is never seen answering 503.
    pub request_accept_grace_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_timeout_ms: 10_000,
            request_accept_grace_timeout_ms: 500,
        }
    }
}

impl LifecycleConfig {
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    pub fn request_accept_grace_timeout(&self) -> Duration {
        Duration::from_millis(self.request_accept_grace_timeout_ms)
    }
}

/// What to do with a trailing slash that has no exact match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlashPolicy {
    /// Redirect (301) to the slash-stripped path when that path matches.
    #[default]
    Redirect,
    /// Treat `/a/` and `/a` as different paths.
    Preserve,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub trailing_slash: TrailingSlashPolicy,
}

/// Upstream forwarding settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Time allowed for an upstream to produce response headers, in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 30_000,
        }
    }
}

impl ForwardingConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Health endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PingConfig {
    /// Entry point serving `/ping`.
    pub entry_point: String,
}

/// Administrative API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Entry point serving `/api/...`.
    pub entry_point: String,

    /// Bearer token required on every API request, if set.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Enabled configuration providers.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub file: Option<FileProviderConfig>,

    /// Dynamic configuration embedded in the static file.
    pub inline: Option<DynamicConfig>,
}

/// File provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileProviderConfig {
    /// Path to a TOML file holding a dynamic configuration.
    pub path: PathBuf,

    /// Reload the file when it changes.
    #[serde(default = "default_watch")]
    pub watch: bool,
}

fn default_watch() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: StaticConfig = toml::from_str("").unwrap();
        assert_eq!(config.entry_points.len(), 1);
        assert_eq!(config.entry_points["web"].address, "0.0.0.0:8000");
        assert_eq!(config.lifecycle.grace_timeout(), Duration::from_secs(10));
        assert_eq!(config.lifecycle.request_accept_grace_timeout(), Duration::from_millis(500));
        assert_eq!(config.routing.trailing_slash, TrailingSlashPolicy::Redirect);
        assert!(config.ping.is_none());
    }

    #[test]
    fn parses_full_static_config() {
        let raw = r#"
            [entry_points.web]
            address = "127.0.0.1:8000"

            [entry_points.traefik]
            address = "127.0.0.1:8001"
            max_connections = 16

            [lifecycle]
            grace_timeout_ms = 10000
            request_accept_grace_timeout_ms = 2000

            [routing]
            trailing_slash = "preserve"

            [ping]
            entry_point = "traefik"

            [api]
            entry_point = "traefik"
            api_key = "secret"

            [providers.file]
            path = "dynamic.toml"

            [providers.inline.services.whoami.load_balancer]
            servers = [{ url = "http://10.0.0.1:80" }]
        "#;
        let config: StaticConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.entry_points.len(), 2);
        assert_eq!(config.entry_points["traefik"].max_connections, 16);
        assert_eq!(config.routing.trailing_slash, TrailingSlashPolicy::Preserve);
        assert_eq!(
            config.lifecycle.request_accept_grace_timeout(),
            Duration::from_secs(2)
        );
        assert_eq!(config.ping.unwrap().entry_point, "traefik");
        assert_eq!(config.api.unwrap().api_key.as_deref(), Some("secret"));
        let file = config.providers.file.unwrap();
        assert!(file.watch);
        assert!(config.providers.inline.unwrap().services.contains_key("whoami"));
    }
}
