//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs the service against the in-memory order store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

/// Storefront settings: pricing thresholds, public URLs, and the
/// credentials the admin and notification paths rely on.
///
/// Gateway credentials are NOT loaded here: each gateway adapter owns its
/// own `*Config::from_env` so a missing credential fails that gateway's
/// initiation loudly without taking the rest of the service down.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store_name: String,
    /// Public base URL of the storefront, used for redirect targets.
    pub app_base_url: String,
    /// Orders at or above this subtotal ship free (whole rupees).
    pub free_shipping_threshold: i64,
    /// Flat shipping fee below the threshold (whole rupees).
    pub shipping_fee: i64,
    /// Bearer token required by the admin order-update endpoint.
    pub admin_api_token: Option<String>,
    /// Customer-support WhatsApp number for confirmation messages.
    pub whatsapp_number: Option<String>,
    /// Admin WhatsApp number for new-order alerts.
    pub admin_whatsapp_number: Option<String>,
    /// Directory where payment-proof uploads are written.
    pub upload_dir: String,
    /// Optional HTTP relay that receives confirmation payloads.
    pub notify_relay_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            store: StoreConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
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
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
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
            url: env::var("DATABASE_URL").ok(),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
            connection_timeout_secs: env::var("DATABASE_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("DATABASE_CONNECT_TIMEOUT_SECS".to_string())
                })?,
        })
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(StoreConfig {
            store_name: env::var("STORE_NAME").unwrap_or_else(|_| "Little Threads".to_string()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            free_shipping_threshold: parse_amount("FREE_SHIPPING_THRESHOLD", 3000)?,
            shipping_fee: parse_amount("SHIPPING_FEE", 200)?,
            admin_api_token: env::var("ADMIN_API_TOKEN").ok().filter(|v| !v.is_empty()),
            whatsapp_number: env::var("SUPPORT_WHATSAPP_NUMBER").ok(),
            admin_whatsapp_number: env::var("ADMIN_WHATSAPP_NUMBER").ok(),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            notify_relay_url: env::var("NOTIFY_RELAY_URL").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_base_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "APP_BASE_URL cannot be empty".to_string(),
            ));
        }
        if self.free_shipping_threshold < 0 || self.shipping_fee < 0 {
            return Err(ConfigError::InvalidValue(
                "shipping threshold and fee must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_amount(var: &str, default: i64) -> Result<i64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue(var.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_store_config() -> StoreConfig {
        StoreConfig {
            store_name: "Little Threads".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            free_shipping_threshold: 3000,
            shipping_fee: 200,
            admin_api_token: None,
            whatsapp_number: None,
            admin_whatsapp_number: None,
            upload_dir: "uploads".to_string(),
            notify_relay_url: None,
        }
    }

    #[test]
    fn store_config_rejects_negative_shipping() {
        let config = StoreConfig {
            free_shipping_threshold: -1,
            ..base_store_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_config_rejects_zero_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins: vec![],
        };
        assert!(config.validate().is_err());
    }
}
