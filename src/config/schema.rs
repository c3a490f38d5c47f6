//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the uploader.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the upload service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct UploaderConfig {
    /// Listener and routing settings.
    pub server: ServerConfig,

    /// Where uploaded files are stored.
    pub storage: StorageConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Reload behaviour.
    pub reload: ReloadConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address used in standalone mode (e.g., "127.0.0.1:8080").
    pub listen_address: String,

    /// Path under which the service is reachable (e.g., "/upload").
    pub base_path: String,

    /// Upper bound on a single drain. Absent means wait indefinitely.
    pub drain_timeout_secs: Option<u64>,

    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Drain deadline as a [`Duration`], if one is configured.
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8080".to_string(),
            base_path: "/upload".to_string(),
            drain_timeout_secs: None,
            max_upload_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that receives uploaded files.
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "./uploads".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Reload behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReloadConfig {
    /// Treat modifications of the config file as a reload request.
    pub watch_config: bool,

    /// Whether the final shutdown waits for drains started by earlier reloads.
    pub await_reload_drains: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            watch_config: false,
            await_reload_drains: true,
        }
    }
}
