use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.iamport.kr";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Payment gateway credentials and shop identity, passed to the payment
/// reconciler at construction.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Gateway REST API key
    pub api_key: String,

    /// Gateway REST API secret
    pub api_secret: String,

    /// Shop-wide merchant identifier presented to the payment widget
    pub shop_id: String,

    /// Payment-channel (PG provider) selector
    pub pay_channel: String,

    /// Gateway REST base URL
    #[serde(default = "default_gateway_base_url")]
    #[validate(url(message = "Gateway base URL must be a valid URL"))]
    pub base_url: String,

    /// Bound on every outbound gateway request; expiry is treated as a
    /// transport failure
    #[serde(default = "default_gateway_timeout")]
    #[validate(range(min = 1, message = "Gateway timeout must be at least 1 second"))]
    pub timeout_secs: u64,
}

fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}

fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            shop_id: String::new(),
            pay_channel: "html5_inicis".to_string(),
            base_url: default_gateway_base_url(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL is required"))]
    pub database_url: String,

    /// Bind host
    #[validate(length(min = 1, message = "Bind host is required"))]
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Environment name: development, test, production
    pub environment: String,

    /// Log level directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs instead of human-readable ones
    #[serde(default)]
    pub log_json: bool,

    /// Create missing tables at startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Payment gateway settings
    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl AppConfig {
    /// Constructs a configuration from explicit values, used by tests and
    /// tools that bypass file/environment loading.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            gateway: GatewayConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from defaults, optional `config/` files for the
/// selected environment, and `APP__`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .set_default("gateway.api_key", "")?
        .set_default("gateway.api_secret", "")?
        .set_default("gateway.shop_id", "")?
        .set_default("gateway.pay_channel", "html5_inicis")?
        .set_default("gateway.base_url", DEFAULT_GATEWAY_BASE_URL)?
        .set_default("gateway.timeout_secs", DEFAULT_GATEWAY_TIMEOUT_SECS as i64)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
    Ok(cfg)
}

/// Initialises the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            8080,
            "test".to_string(),
        )
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let mut cfg = base_config();
        cfg.database_url = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_gateway_base_url_is_rejected() {
        let mut cfg = base_config();
        cfg.gateway.base_url = "not a url".to_string();
        assert!(cfg.validate().is_err());
    }
}
