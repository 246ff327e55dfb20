//! ecoroute.toml configuration parser.
//!
//! The file form keeps every field optional; [`EcorouteConfig::resolve`]
//! fills defaults, applies validation and produces [`Settings`] with real
//! durations. Environment overrides sit between the two steps.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;

pub const ENV_PERFORMANCE_URL: &str = "PERFORMANCE_SERVICE_URL";
pub const ENV_ECO_URL: &str = "ECO_SERVICE_URL";
pub const ENV_TARGET_NAME: &str = "MANAGED_TARGET_NAME";
pub const ENV_DOCKER_SOCKET: &str = "DOCKER_SOCKET";

/// Accepted range for `sensor.threshold`, gCO2eq/kWh.
pub const MIN_THRESHOLD: f64 = 1.0;
pub const MAX_THRESHOLD: f64 = 100_000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcorouteConfig {
    pub performance: Option<ServiceConfig>,
    pub eco: Option<ServiceConfig>,
    pub infrastructure: Option<InfrastructureConfig>,
    pub sensor: Option<SensorConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub timeout: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    pub enabled: Option<bool>,
    pub target_name: Option<String>,
    pub docker_socket: Option<String>,
    pub warmup: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub status_poll_interval: Option<String>,
}

// ── Resolved settings ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub performance: ServiceSettings,
    pub eco: ServiceSettings,
    pub infrastructure: InfrastructureSettings,
    /// gCO2eq/kWh at or above which the grid is HIGH.
    pub sensor_threshold: f64,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub url: String,
    pub timeout: Duration,
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureSettings {
    pub enabled: bool,
    pub target_name: String,
    pub docker_socket: PathBuf,
    pub warmup: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub port: u16,
    pub status_poll_interval: Duration,
}

impl EcorouteConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override file values with environment variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_PERFORMANCE_URL) {
            self.performance.get_or_insert_with(Default::default).url = Some(url);
        }
        if let Some(url) = lookup(ENV_ECO_URL) {
            self.eco.get_or_insert_with(Default::default).url = Some(url);
        }
        if let Some(name) = lookup(ENV_TARGET_NAME) {
            self.infrastructure.get_or_insert_with(Default::default).target_name = Some(name);
        }
        if let Some(socket) = lookup(ENV_DOCKER_SOCKET) {
            self.infrastructure.get_or_insert_with(Default::default).docker_socket = Some(socket);
        }
    }

    /// Override from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Fill defaults and validate.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let performance = resolve_service(
            self.performance.as_ref(),
            ("performance.url", "performance.timeout"),
            ("http://performance-service:8001/predict/", "15s", "XGBoost"),
        )?;
        let eco = resolve_service(
            self.eco.as_ref(),
            ("eco.url", "eco.timeout"),
            ("http://eco-service:8002/predict/", "10s", "Holt-Winters"),
        )?;

        let infra = self.infrastructure.clone().unwrap_or_default();
        let target_name = infra
            .target_name
            .unwrap_or_else(|| "forecast-performance".to_string());
        if target_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "infrastructure.target_name",
                reason: "must not be empty".to_string(),
            });
        }
        let infrastructure = InfrastructureSettings {
            enabled: infra.enabled.unwrap_or(true),
            target_name,
            docker_socket: PathBuf::from(
                infra
                    .docker_socket
                    .unwrap_or_else(|| "/var/run/docker.sock".to_string()),
            ),
            warmup: duration_field("infrastructure.warmup", infra.warmup.as_deref(), "5s")?,
        };

        let sensor_threshold = self
            .sensor
            .as_ref()
            .and_then(|s| s.threshold)
            .unwrap_or(300.0);
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&sensor_threshold) {
            return Err(ConfigError::Invalid {
                field: "sensor.threshold",
                reason: format!(
                    "must be between {MIN_THRESHOLD} and {MAX_THRESHOLD} g/kWh, got {sensor_threshold}"
                ),
            });
        }

        let server = self.server.clone().unwrap_or_default();
        let server = ServerSettings {
            port: server.port.unwrap_or(8090),
            status_poll_interval: nonzero_duration_field(
                "server.status_poll_interval",
                server.status_poll_interval.as_deref(),
                "15s",
            )?,
        };

        Ok(Settings {
            performance,
            eco,
            infrastructure,
            sensor_threshold,
            server,
        })
    }
}

fn resolve_service(
    config: Option<&ServiceConfig>,
    fields: (&'static str, &'static str),
    defaults: (&str, &str, &str),
) -> Result<ServiceSettings, ConfigError> {
    let config = config.cloned().unwrap_or_default();
    let url = config.url.unwrap_or_else(|| defaults.0.to_string());
    if !url.starts_with("http://") {
        return Err(ConfigError::Invalid {
            field: fields.0,
            reason: format!("'{url}' is not a plain http:// URL"),
        });
    }

    Ok(ServiceSettings {
        url,
        timeout: nonzero_duration_field(fields.1, config.timeout.as_deref(), defaults.1)?,
        model_name: config.model_name.unwrap_or_else(|| defaults.2.to_string()),
    })
}

fn duration_field(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<Duration, ConfigError> {
    let raw = value.unwrap_or(default);
    parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: raw.to_string(),
    })
}

/// Like `duration_field`, but zero is rejected.
fn nonzero_duration_field(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<Duration, ConfigError> {
    let duration = duration_field(field, value, default)?;
    if duration.is_zero() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(duration)
}
