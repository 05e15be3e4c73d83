use thiserror::Error;

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.service.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "service.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.service.audit_recent_limit <= 0 {
            return Err(ConfigError::InvalidConfig(
                "service.audit_recent_limit must be positive".to_string(),
            ));
        }

        if self.database.min_connections() > self.database.max_connections() {
            return Err(ConfigError::InvalidConfig(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections(),
                self.database.max_connections()
            )));
        }

        if self.database.max_connections() == 0 {
            return Err(ConfigError::InvalidConfig(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
