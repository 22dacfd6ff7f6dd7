//! Configuration validation.

use crate::error::ConfigError;
use crate::logging::build_filter;
use crate::schema::OutboxConfig;

/// Launch delays above this many seconds draw a warning.
const LONG_LAUNCH_DELAY_SECS: f64 = 60.0;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse the errors into a single [`ConfigError::Validation`].
    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.is_valid() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigError::Validation(message))
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &OutboxConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_queue(config, &mut result);
        Self::validate_reachability(config, &mut result);
        Self::validate_storage(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_queue(config: &OutboxConfig, result: &mut ValidationResult) {
        let delay = config.queue.launch_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            result.add_error(ValidationError::new(
                "queue.launch_delay_secs",
                "launch_delay_secs must be a non-negative number",
            ));
        } else if delay > LONG_LAUNCH_DELAY_SECS {
            result.add_warning(ValidationWarning::new(
                "queue.launch_delay_secs",
                "launch_delay_secs is very high (>60), queued work will wait a long time after launch",
            ));
        }
    }

    fn validate_reachability(config: &OutboxConfig, result: &mut ValidationResult) {
        let reachability = &config.reachability;

        if reachability.target.trim().is_empty() {
            result.add_error(ValidationError::new(
                "reachability.target",
                "Reachability target cannot be empty",
            ));
        } else if let Some(port) = reachability.explicit_port() {
            match port.parse::<u16>() {
                Ok(0) | Err(_) => result.add_error(ValidationError::new(
                    "reachability.target",
                    format!("Invalid port '{}' in reachability target", port),
                )),
                Ok(_) => {}
            }
        }

        if reachability.probe_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "reachability.probe_interval_secs",
                "probe_interval_secs must be greater than 0",
            ));
        }

        if reachability.probe_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "reachability.probe_timeout_ms",
                "probe_timeout_ms must be greater than 0",
            ));
        }
    }

    fn validate_storage(config: &OutboxConfig, result: &mut ValidationResult) {
        if config.storage.db_path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                "storage.db_path",
                "db_path cannot be empty",
            ));
        }
    }

    fn validate_logging(config: &OutboxConfig, result: &mut ValidationResult) {
        if let Err(e) = build_filter(&config.logging.level) {
            result.add_error(ValidationError::new("logging.level", e.to_string()));
        }

        if config.logging.log_dir.is_some() && config.logging.max_log_files == 0 {
            result.add_warning(ValidationWarning::new(
                "logging.max_log_files",
                "max_log_files is 0, rotated log files will never be pruned",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
