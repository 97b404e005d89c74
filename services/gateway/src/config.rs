use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the gateway
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Key-value store backend selection
    #[serde(default)]
    pub store: StoreConfig,
    /// Database configuration (postgres backend only)
    pub database: Option<DatabaseConfig>,
    /// Collection size limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Value of the Access-Control-Allow-Origin header
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

/// Which key-value backend to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Caps on the stored lists. Overflow evicts the oldest entries.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,
    #[serde(default = "default_max_submissions")]
    pub max_submissions: usize,
}

// Default value functions
fn default_service_name() -> String {
    "resource-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_max_videos() -> usize {
    50
}

fn default_max_submissions() -> usize {
    100
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "resource-gateway")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            .set_default("store.backend", "memory")?
            // Add config file if present
            .add_source(
                config::File::with_name("config/gateway")
                    .required(false)
            )
            .add_source(
                config::File::with_name("/etc/resource-gateway/gateway")
                    .required(false)
            )
            // Override with environment variables
            // GATEWAY__API__PORT -> api.port
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.database.is_none() {
            anyhow::bail!("store.backend = postgres requires a [database] section");
        }
        if self.limits.max_videos == 0 || self.limits.max_submissions == 0 {
            anyhow::bail!("limits.max_videos and limits.max_submissions must be positive");
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Get database connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get database idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            allow_origin: default_allow_origin(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_videos: default_max_videos(),
            max_submissions: default_max_submissions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.limits.max_videos, 50);
        assert_eq!(config.limits.max_submissions, 100);
        assert_eq!(config.api.allow_origin, "*");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_backend_requires_database() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.database = Some(DatabaseConfig {
            url: "postgres://localhost/gateway".to_string(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            run_migrations: true,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = Config::default();
        config.limits.max_submissions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_source() {
        let config: Config = config::Config::builder()
            .set_default("store.backend", "postgres")
            .unwrap()
            .set_default("database.url", "postgres://db/gateway")
            .unwrap()
            .set_default("limits.max_videos", 5)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.limits.max_videos, 5);
        assert_eq!(config.limits.max_submissions, 100);
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 10);
        assert!(database.run_migrations);
        assert_eq!(config.api.port, 8080);
    }
}
