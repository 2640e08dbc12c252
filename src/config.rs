// Startup configuration: `main.{toml,yaml,json}` from an environment-specific
// directory, overridable through `FLIGHT_`-prefixed environment variables.

use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{circuit_breaker::BreakerConfig, client::ClientConfig, error::ConfigurationError};

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_ENV_PREFIX: &str = "FLIGHT";
const CONFIG_FILE_STEM: &str = "main";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub flight: FlightConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FlightConfig {
    pub host: String,
    pub port: u16,
    /// Appended to the base address for seat bookings, e.g. `/book`.
    pub book_seat_path: Option<String>,
    /// Appended to the base address for flight detail lookups.
    pub flight_details_path: Option<String>,
    // zero falls back to the client defaults
    pub timeout_ms: u64,
    pub max_idle_connections: usize,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cool_down_ms: u64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 633,
            book_seat_path: None,
            flight_details_path: None,
            timeout_ms: 0,
            max_idle_connections: 0,
            failure_threshold: 0,
            success_threshold: 0,
            cool_down_ms: 0,
        }
    }
}

impl FlightConfig {
    pub fn address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                name: "flight.host",
                reason: "must not be empty".to_string(),
            });
        }

        let base_url = self.address();
        let with_path = |path: &Option<String>| path.as_ref().map(|p| format!("{base_url}{p}"));

        Ok(ClientConfig {
            book_seat_url: with_path(&self.book_seat_path),
            flight_details_url: with_path(&self.flight_details_path),
            timeout_ms: self.timeout_ms,
            idle_timeout_ms: self.timeout_ms,
            max_idle_connections: self.max_idle_connections,
            circuit_breaker_config: BreakerConfig {
                failure_threshold: self.failure_threshold,
                success_threshold: self.success_threshold,
                cool_down: Duration::from_millis(self.cool_down_ms),
                half_open_max_calls: 0,
            },
            base_url,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    /// Log file, appended to. Stdout when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "error".to_string(),
            file: None,
        }
    }
}

/// Directory holding `main.*` for `environment`. An empty environment means
/// development, read from `./files/etc/gobiz/development`.
pub fn config_dir(environment: &str) -> PathBuf {
    if environment.is_empty() {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("files/etc/gobiz")
            .join(DEFAULT_ENVIRONMENT)
    } else {
        PathBuf::from("/etc/gobiz").join(environment)
    }
}

pub struct ConfigLoader {
    dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self) -> Result<AppConfig, ConfigurationError> {
        let file = self.dir.join(CONFIG_FILE_STEM);
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&file.to_string_lossy()).required(true))
            .add_source(
                ::config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = settings.try_deserialize()?;
        tracing::debug!(dir = %self.dir.display(), "configuration loaded");
        Ok(app_config)
    }
}
