//! Tracing subscriber setup for applications embedding the queue.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::ConfigError;
use crate::loader::ConfigLoader;
use crate::schema::LoggingConfig;

/// Parse a filter directive such as `info` or `outbox_queue=debug`.
pub fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level).map_err(|e| ConfigError::InvalidValue {
        field: "logging.level".to_string(),
        message: e.to_string(),
    })
}

/// Install a global subscriber: console output plus an optional rolling daily file.
///
/// `RUST_LOG` takes precedence over `config.level`. The returned guard must be
/// kept alive for buffered file output to be flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };

    let console = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let dir = ConfigLoader::expand_path(&dir.to_string_lossy());
            std::fs::create_dir_all(&dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(config.file_prefix.as_str())
                .filename_suffix("log")
                .max_log_files(config.max_log_files)
                .build(&dir)
                .map_err(|e| ConfigError::Logging(e.to_string()))?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = if config.json {
                fmt::layer().json().with_writer(non_blocking).boxed()
            } else {
                fmt::layer().with_writer(non_blocking).with_ansi(false).boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}
