use super::{
    default_carts_table, default_dishes_table, default_host, default_log_level,
    default_max_request_size, default_orders_table, default_port, default_region,
    default_restaurants_table, default_service_name, default_timeout, default_users_table,
    ConfigError, DatabaseConfig, ObservabilityConfig, PaginationConfig, ServerConfig,
};
use std::env;
use std::time::Duration;

#[test]
fn test_server_config_defaults() {
    env::remove_var("CAFETERIA_HOST");
    env::remove_var("CAFETERIA_PORT");
    env::remove_var("CAFETERIA_REQUEST_TIMEOUT_SECONDS");
    env::remove_var("CAFETERIA_MAX_REQUEST_SIZE");

    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.request_timeout_seconds, 30);
    assert_eq!(config.max_request_size, 1024 * 1024);
}

#[test]
fn test_database_config_from_env() {
    env::set_var("CAFETERIA_DISHES_TABLE_NAME", "TestDishes");
    env::set_var("CAFETERIA_ORDERS_TABLE_NAME", "TestOrders");
    env::set_var("CAFETERIA_DYNAMODB_ENDPOINT", "http://localhost:8000");

    let config = DatabaseConfig::from_env().unwrap();

    assert_eq!(config.dishes_table_name, "TestDishes");
    assert_eq!(config.orders_table_name, "TestOrders");
    assert_eq!(
        config.dynamodb_endpoint.as_deref(),
        Some("http://localhost:8000")
    );
    assert_eq!(config.tables().len(), 5);
    assert!(config.validate().is_ok());

    env::remove_var("CAFETERIA_DISHES_TABLE_NAME");
    env::remove_var("CAFETERIA_ORDERS_TABLE_NAME");
    env::remove_var("CAFETERIA_DYNAMODB_ENDPOINT");
}

#[test]
fn test_pagination_config_from_env() {
    env::set_var("CAFETERIA_MENU_PAGE_SIZE", "7");

    let config = PaginationConfig::from_env().unwrap();

    assert_eq!(config.menu_page_size, 7);
    assert_eq!(config.restaurants_page_size, 10);
    assert_eq!(config.cart_page_size, 5);
    assert_eq!(config.orders_page_size, 10);

    env::remove_var("CAFETERIA_MENU_PAGE_SIZE");
}

#[test]
fn test_observability_config_from_env() {
    env::set_var("CAFETERIA_SERVICE_NAME", "test-service");
    env::set_var("CAFETERIA_SERVICE_VERSION", "1.0.0");
    env::set_var("CAFETERIA_LOG_LEVEL", "debug");

    let config = ObservabilityConfig::from_env().unwrap();

    assert_eq!(config.service_name, "test-service");
    assert_eq!(config.service_version, "1.0.0");
    assert_eq!(config.log_level, "debug");

    env::remove_var("CAFETERIA_SERVICE_NAME");
    env::remove_var("CAFETERIA_SERVICE_VERSION");
    env::remove_var("CAFETERIA_LOG_LEVEL");
}

#[test]
fn test_server_config_request_timeout() {
    let config = ServerConfig {
        request_timeout_seconds: 45,
        ..Default::default()
    };

    assert_eq!(config.request_timeout(), Duration::from_secs(45));
}

#[test]
fn test_validation_rejects_bad_values() {
    let server = ServerConfig {
        port: 0,
        ..Default::default()
    };
    assert!(matches!(
        server.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    let pagination = PaginationConfig {
        cart_page_size: 0,
        ..Default::default()
    };
    assert!(pagination.validate().is_err());
    assert!(PaginationConfig::default().validate().is_ok());
}

#[test]
fn test_config_error_display() {
    let error = ConfigError::ValidationError {
        message: "Invalid configuration".to_string(),
    };
    assert_eq!(error.to_string(), "Validation error: Invalid configuration");

    let error = ConfigError::LoadError {
        message: "bad value".to_string(),
    };
    assert_eq!(error.to_string(), "Configuration loading error: bad value");
}

#[test]
fn test_default_values() {
    assert_eq!(default_host(), "0.0.0.0");
    assert_eq!(default_port(), 8080);
    assert_eq!(default_timeout(), 30);
    assert_eq!(default_max_request_size(), 1024 * 1024);
    assert_eq!(default_users_table(), "CafeteriaUsers");
    assert_eq!(default_dishes_table(), "CafeteriaDishes");
    assert_eq!(default_restaurants_table(), "CafeteriaRestaurants");
    assert_eq!(default_carts_table(), "CafeteriaCarts");
    assert_eq!(default_orders_table(), "CafeteriaOrders");
    assert_eq!(default_region(), "us-west-2");
    assert_eq!(default_service_name(), "cafeteria-rs");
    assert_eq!(default_log_level(), "info");
}
