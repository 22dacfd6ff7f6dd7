//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Configuration is invalid: {0}")]
    Validation(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = ConfigError::NotFound("outbox.toml".to_string());
        assert!(err.to_string().contains("outbox.toml"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::InvalidValue {
            field: "reachability.target".to_string(),
            message: "must not be empty".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("reachability.target"));
        assert!(display.contains("must not be empty"));
    }

    #[test]
    fn test_env_var_not_set_error() {
        let err = ConfigError::EnvVarNotSet("OUTBOX_HOST".to_string());
        assert!(err.to_string().contains("OUTBOX_HOST"));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_validation_error() {
        let err = ConfigError::Validation("queue.launch_delay_secs: negative".to_string());
        assert!(err.to_string().contains("launch_delay_secs"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::from(io_err);
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_from() {
        let toml_err = toml::from_str::<toml::Value>("invalid = [unclosed").unwrap_err();
        let err = ConfigError::from(toml_err);
        assert!(err.to_string().contains("TOML parse error"));
    }
}
