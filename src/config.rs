//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Invalid port
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_bounds() {
        let config = DatabaseConfig {
            url: "postgres://localhost/findmylostid".to_string(),
            max_connections: 5,
            min_connections: 10,
            connection_timeout: 30,
            idle_timeout: None,
        };

        assert!(config.validate().is_err());
    }
}
