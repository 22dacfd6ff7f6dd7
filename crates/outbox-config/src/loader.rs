//! Configuration loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::OutboxConfig;
use crate::validator::ConfigValidator;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<OutboxConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<OutboxConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: OutboxConfig = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load a file and reject it if validation reports errors.
    pub fn load_validated(path: &Path) -> Result<OutboxConfig, ConfigError> {
        let config = Self::load(path)?;
        let result = ConfigValidator::validate(&config);
        for warning in &result.warnings {
            tracing::warn!("Config warning at {}: {}", warning.path, warning.message);
        }
        result.into_result()?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.outbox`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}
