use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Prefix of every environment variable read by the service
pub const ENV_PREFIX: &str = "CAFETERIA";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_users_table")]
    pub users_table_name: String,
    #[serde(default = "default_dishes_table")]
    pub dishes_table_name: String,
    #[serde(default = "default_restaurants_table")]
    pub restaurants_table_name: String,
    #[serde(default = "default_carts_table")]
    pub carts_table_name: String,
    #[serde(default = "default_orders_table")]
    pub orders_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Override for DynamoDB Local and similar emulators
    #[serde(default)]
    pub dynamodb_endpoint: Option<String>,
}

/// Page sizes of the paginated listings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaginationConfig {
    #[serde(default = "default_menu_page_size")]
    pub menu_page_size: u32,
    #[serde(default = "default_restaurants_page_size")]
    pub restaurants_page_size: u32,
    #[serde(default = "default_cart_page_size")]
    pub cart_page_size: u32,
    #[serde(default = "default_orders_page_size")]
    pub orders_page_size: u32,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

/// Deserialize one configuration section from `CAFETERIA_*` variables
fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let pagination = PaginationConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()));
        if let Some(endpoint) = &database.dynamodb_endpoint {
            info!("Using DynamoDB endpoint override: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client: DynamoDbClient::new(&aws_config),
        };

        let config = Config {
            server,
            database,
            pagination,
            aws,
            observability,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        info!("Validating configuration");

        self.server.validate()?;
        self.database.validate()?;
        self.pagination.validate()?;

        info!("Configuration validation completed");
        Ok(())
    }
}

impl ServerConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Request timeout cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_timeout(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl DatabaseConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    /// Every table used by the service with its partition key
    pub fn tables(&self) -> Vec<(&str, &'static str)> {
        vec![
            (self.users_table_name.as_str(), "user_id"),
            (self.dishes_table_name.as_str(), "dish_id"),
            (self.restaurants_table_name.as_str(), "restaurant_id"),
            (self.carts_table_name.as_str(), "cart_id"),
            (self.orders_table_name.as_str(), "order_id"),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some((_, key)) = self.tables().iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: format!("Table name for {} cannot be empty", key),
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            users_table_name: default_users_table(),
            dishes_table_name: default_dishes_table(),
            restaurants_table_name: default_restaurants_table(),
            carts_table_name: default_carts_table(),
            orders_table_name: default_orders_table(),
            region: default_region(),
            dynamodb_endpoint: None,
        }
    }
}

impl PaginationConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("pagination")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            self.menu_page_size,
            self.restaurants_page_size,
            self.cart_page_size,
            self.orders_page_size,
        ];
        if sizes.contains(&0) {
            return Err(ConfigError::ValidationError {
                message: "Page sizes must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            menu_page_size: default_menu_page_size(),
            restaurants_page_size: default_restaurants_page_size(),
            cart_page_size: default_cart_page_size(),
            orders_page_size: default_orders_page_size(),
        }
    }
}

impl ObservabilityConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024 // 1MB
}

pub(crate) fn default_users_table() -> String {
    "CafeteriaUsers".to_string()
}

pub(crate) fn default_dishes_table() -> String {
    "CafeteriaDishes".to_string()
}

pub(crate) fn default_restaurants_table() -> String {
    "CafeteriaRestaurants".to_string()
}

pub(crate) fn default_carts_table() -> String {
    "CafeteriaCarts".to_string()
}

pub(crate) fn default_orders_table() -> String {
    "CafeteriaOrders".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_menu_page_size() -> u32 {
    5
}

pub(crate) fn default_restaurants_page_size() -> u32 {
    10
}

pub(crate) fn default_cart_page_size() -> u32 {
    5
}

pub(crate) fn default_orders_page_size() -> u32 {
    10
}

pub(crate) fn default_service_name() -> String {
    "cafeteria-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests;
