/// Service configuration loader - parses gwmon.toml
///
/// Separates deployment settings (port, simulator cadence, auth secret,
/// deployment region) from code. Every field has a default, so an absent
/// `gwmon.toml` runs the service with stock settings.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::broadcast::DEFAULT_SUBSCRIBER_BUFFER;

/// Default location of the service configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "gwmon.toml";

/// Environment variable overriding `[auth].secret`.
pub const AUTH_SECRET_ENV: &str = "GWMON_AUTH_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub simulator: SimulatorSettings,
    pub broadcast: BroadcastSettings,
    pub auth: AuthSettings,
    pub region: RegionBounds,
    pub seed: SeedSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Worker threads for ordinary (non-streaming) requests.
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            worker_threads: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Half-width of the uniform fluctuation band around the baseline, meters.
    pub fluctuation_m: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 5,
            fluctuation_m: 2.0,
        }
    }
}

impl SimulatorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastSettings {
    pub subscriber_buffer: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared token-signing secret. `None` disables authentication.
    pub secret: Option<String>,
}

/// Bounding box every station coordinate must fall inside.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegionBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Default for RegionBounds {
    /// Mainland India with a small margin.
    fn default() -> Self {
        Self {
            min_latitude: 6.0,
            max_latitude: 38.0,
            min_longitude: 68.0,
            max_longitude: 98.0,
        }
    }
}

impl RegionBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedSettings {
    pub stations_file: PathBuf,
    /// Hours of hourly history generated when the reading store is empty.
    pub history_hours: u32,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            stations_file: PathBuf::from("stations.toml"),
            history_hours: 24,
        }
    }
}

impl ServiceConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration.
    ///
    /// With an explicit `path` the file must exist. Without one,
    /// `gwmon.toml` is used if present and defaults otherwise. The
    /// `GWMON_AUTH_SECRET` environment variable (or `.env` entry) overrides
    /// the configured auth secret.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::read_file(default)?
                } else {
                    ServiceConfig::default()
                }
            }
        };

        if let Ok(secret) = env::var(AUTH_SECRET_ENV) {
            if !secret.is_empty() {
                config.auth.secret = Some(secret);
            }
        }

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents, path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulator.interval_seconds == 0 {
            return Err(ConfigError::Invalid("simulator.interval_seconds must be > 0".into()));
        }
        if !(self.simulator.fluctuation_m.is_finite() && self.simulator.fluctuation_m >= 0.0) {
            return Err(ConfigError::Invalid("simulator.fluctuation_m must be >= 0".into()));
        }
        if self.server.worker_threads == 0 {
            return Err(ConfigError::Invalid("server.worker_threads must be > 0".into()));
        }
        let r = &self.region;
        if r.min_latitude >= r.max_latitude || r.min_longitude >= r.max_longitude {
            return Err(ConfigError::Invalid("region bounds are empty".into()));
        }
        if matches!(&self.auth.secret, Some(s) if s.is_empty()) {
            return Err(ConfigError::Invalid("auth.secret must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ServiceConfig, ConfigError> {
        ServiceConfig::from_toml(text, Path::new("test.toml"))
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.simulator.interval(), Duration::from_secs(5));
        assert_eq!(config.simulator.fluctuation_m, 2.0);
        assert!(config.simulator.enabled);
        assert!(config.auth.secret.is_none());
        assert_eq!(config.seed.history_hours, 24);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [server]
            port = 8080

            [simulator]
            interval_seconds = 1

            [auth]
            secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.simulator.interval_seconds, 1);
        assert_eq!(config.simulator.fluctuation_m, 2.0);
        assert_eq!(config.auth.secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = parse("[simulator]\ninterval_seconds = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_reports_path() {
        let err = parse("[server\nport = ").unwrap_err();
        assert!(err.to_string().contains("test.toml"));
    }

    #[test]
    fn test_default_region_contains_indian_cities() {
        let region = RegionBounds::default();
        assert!(region.contains(19.0760, 72.8777)); // Mumbai
        assert!(region.contains(28.7041, 77.1025)); // Delhi
        assert!(!region.contains(40.5614, -89.9956));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = ServiceConfig::load(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
