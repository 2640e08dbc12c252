use std::{fs::OpenOptions, sync::Mutex};
use tracing_subscriber::EnvFilter;

use crate::{config::LoggerConfig, error::ConfigurationError};

/// Maps the configured level to a filter directive. `fatal` has no tracing
/// counterpart and is treated as `error`.
pub fn level_directive(level: &str) -> &str {
    match level.trim() {
        "" => "error",
        l if l.eq_ignore_ascii_case("fatal") => "error",
        l => l,
    }
}

/// Installs the global fmt subscriber. Writes to `config.file` when set,
/// stdout otherwise. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggerConfig) -> Result<(), ConfigurationError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(&config.level)))
        .map_err(|e| ConfigurationError::Logger(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let res = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigurationError::Logger(format!("{}: {e}", path.display())))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stdout).try_init(),
    };

    res.map_err(|e| ConfigurationError::Logger(e.to_string()))
}
