use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Billing constants for the volumetric-to-money chain. These are tariff
/// values from the gas supplier contract, injected rather than hard-coded.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BillingSettings {
    /// Volumetric-to-energy conversion (m3 -> kWh)
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: Decimal,

    /// Base tariff per kWh
    #[serde(default = "default_unit_price")]
    pub unit_price: Decimal,

    /// Solidarity contribution surcharge rate applied over the subtotal
    #[serde(default = "default_contribution_rate")]
    pub contribution_rate: Decimal,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            conversion_factor: default_conversion_factor(),
            unit_price: default_unit_price(),
            contribution_rate: default_contribution_rate(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment name: development, test, production
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Run embedded migrations at startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// When a receipt arrives without a resolvable order id, audit it under a
    /// synthetic `ORD_<millis>` identifier instead of rejecting the step.
    /// Mirrors the orchestrator's eventual-consistency tolerance.
    #[serde(default)]
    pub allow_synthetic_order_ids: bool,

    #[serde(default)]
    #[validate]
    pub billing: BillingSettings,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_conversion_factor() -> Decimal {
    dec!(11.6)
}

fn default_unit_price() -> Decimal {
    dec!(52.70)
}

fn default_contribution_rate() -> Decimal {
    dec!(0.20)
}

/// Loads configuration from `config/` files layered with `APP_`-prefixed
/// environment variables (e.g. `APP_DATABASE_URL`, `APP_BILLING__UNIT_PRICE`).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
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
        .set_default("database_url", "sqlite://gas_procurement.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when present.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("gas_procurement_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_defaults_match_tariff_contract() {
        let billing = BillingSettings::default();
        assert_eq!(billing.conversion_factor, dec!(11.6));
        assert_eq!(billing.unit_price, dec!(52.70));
        assert_eq!(billing.contribution_rate, dec!(0.20));
    }

    #[test]
    fn load_config_uses_defaults_without_files() {
        let cfg = load_config().expect("defaults should load");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(!cfg.allow_synthetic_order_ids);
    }
}
