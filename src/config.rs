use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub marketplace: MarketplaceConfig,
    pub repricing: RepricingConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Whole-request timeout of the HTTP client, in seconds.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepricingConfig {
    /// Amount subtracted from the cheapest competitor price.
    pub margin: Decimal,
    /// Upper bound for each competitor fetch and each price publish.
    pub request_timeout_secs: u64,
    pub max_concurrent_products: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl RepricingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("database.url", "sqlite://data/repricer.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("marketplace.base_url", "https://kaspi.kz/merchantcabinet/api/v1")?
            .set_default("marketplace.user_agent", "SellerRepricer/0.1")?
            .set_default("marketplace.request_timeout", 30)?
            .set_default("repricing.margin", "1")?
            .set_default("repricing.request_timeout_secs", 15)?
            .set_default("repricing.max_concurrent_products", 4)?
            .set_default("scheduler.interval_secs", 300)?
            .set_default("scheduler.run_on_startup", true)?
            .set_default("logging.level", "info")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9001)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("REPRICER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if Url::parse(&self.marketplace.base_url).is_err() {
            return Err(ConfigError::Message("Invalid marketplace base_url format".into()));
        }

        if self.marketplace.request_timeout == 0 {
            return Err(ConfigError::Message("Marketplace request_timeout must be greater than 0".into()));
        }

        if self.repricing.margin.is_sign_negative() {
            return Err(ConfigError::Message("Repricing margin cannot be negative".into()));
        }

        if self.repricing.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Repricing request_timeout_secs must be greater than 0".into()));
        }

        if self.repricing.max_concurrent_products == 0 {
            return Err(ConfigError::Message("Repricing max_concurrent_products must be greater than 0".into()));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
