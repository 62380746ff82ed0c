use aws_sdk_dynamodb::Client as DynamoDbClient;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::{DatabaseConfig, PaginationConfig, ServerConfig};
use crate::handlers::{
    admin, api, cors_middleware, health_check, metrics_handler, request_validation_middleware,
    security_headers_middleware,
};
use crate::observability::{observability_middleware, Metrics};
use crate::repositories::{
    CartRepository, DishRepository, DynamoDbCartRepository, DynamoDbDishRepository,
    DynamoDbOrderRepository, DynamoDbRestaurantRepository, DynamoDbUserRepository,
    OrderRepository, RestaurantRepository, TableManager, UserRepository,
};
use crate::services::{
    CartService, DishService, OrderRepositories, OrderService, RestaurantService, UserService,
};

/// Storage behind the services
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub dishes: Arc<dyn DishRepository>,
    pub restaurants: Arc<dyn RestaurantRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    /// DynamoDB-backed repositories, one table each
    pub fn dynamodb(client: Arc<DynamoDbClient>, database: &DatabaseConfig) -> Self {
        let region = database.region.clone();
        Self {
            users: Arc::new(DynamoDbUserRepository::new(
                client.clone(),
                database.users_table_name.clone(),
                region.clone(),
            )),
            dishes: Arc::new(DynamoDbDishRepository::new(
                client.clone(),
                database.dishes_table_name.clone(),
                region.clone(),
            )),
            restaurants: Arc::new(DynamoDbRestaurantRepository::new(
                client.clone(),
                database.restaurants_table_name.clone(),
                region.clone(),
            )),
            carts: Arc::new(DynamoDbCartRepository::new(
                client.clone(),
                database.carts_table_name.clone(),
                region.clone(),
            )),
            orders: Arc::new(DynamoDbOrderRepository::new(
                client,
                database.orders_table_name.clone(),
                database.carts_table_name.clone(),
                region,
            )),
        }
    }
}

/// Everything the router needs besides the repositories
pub struct AppSettings {
    pub server: ServerConfig,
    pub pagination: PaginationConfig,
    pub database: DatabaseConfig,
}

/// Build the services and the full HTTP router
pub fn create_app(
    repositories: Repositories,
    table_manager: Arc<TableManager>,
    metrics: Arc<Metrics>,
    settings: AppSettings,
) -> Router {
    let metrics_for_middleware = metrics.clone();
    let pagination = &settings.pagination;

    let dish_service = Arc::new(DishService::new(
        repositories.dishes.clone(),
        pagination,
        metrics.clone(),
    ));
    let restaurant_service = Arc::new(RestaurantService::new(
        repositories.restaurants.clone(),
        repositories.orders.clone(),
        pagination,
        metrics.clone(),
    ));
    let user_service = Arc::new(UserService::new(
        repositories.users.clone(),
        repositories.carts.clone(),
        repositories.orders.clone(),
        metrics.clone(),
    ));
    let cart_service = Arc::new(CartService::new(
        repositories.carts.clone(),
        repositories.dishes.clone(),
        repositories.users.clone(),
        pagination,
        metrics.clone(),
    ));
    let order_service = Arc::new(OrderService::new(
        OrderRepositories {
            orders: repositories.orders,
            carts: repositories.carts,
            dishes: repositories.dishes,
            restaurants: repositories.restaurants,
            users: repositories.users,
        },
        pagination,
        metrics.clone(),
    ));

    let api_state = api::ApiState {
        dish_service: dish_service.clone(),
        restaurant_service: restaurant_service.clone(),
        cart_service: cart_service.clone(),
        order_service: order_service.clone(),
        user_service: user_service.clone(),
    };

    let admin_state = admin::AdminState {
        dish_service,
        restaurant_service,
        user_service,
        cart_service,
        order_service,
        table_manager,
        database: settings.database,
    };

    Router::new()
        // Health and metrics endpoints (with metrics state)
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(api::create_api_router(api_state))
        .merge(admin::create_admin_router(admin_state))
        // Add middleware layers (order matters - outer to inner)
        .layer(RequestBodyLimitLayer::new(settings.server.max_request_size))
        .layer(TimeoutLayer::new(settings.server.request_timeout()))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(request_validation_middleware))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
