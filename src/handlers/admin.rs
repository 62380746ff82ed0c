use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::errors::{bad_request, service_error_to_response, ApiError};
use crate::config::DatabaseConfig;
use crate::models::{
    CartFilters, CartStatus, CartSummary, CreateDishRequest, CreateRestaurantRequest,
    CreateUserRequest, Dish, DishFilters, OrderFilters, OrderResponse, Restaurant,
    UpdateDishRequest, UpdateRestaurantRequest, UpdateUserRequest, User,
};
use crate::repositories::TableManager;
use crate::services::{CartService, DishService, OrderService, RestaurantService, UserService};

/// Admin state containing services
#[derive(Clone)]
pub struct AdminState {
    pub dish_service: Arc<DishService>,
    pub restaurant_service: Arc<RestaurantService>,
    pub user_service: Arc<UserService>,
    pub cart_service: Arc<CartService>,
    pub order_service: Arc<OrderService>,
    pub table_manager: Arc<TableManager>,
    pub database: DatabaseConfig,
}

/// Response for seeding operations
#[derive(Debug, Serialize, Deserialize)]
pub struct SeedResponse {
    pub message: String,
    pub dishes_created: usize,
    pub restaurants_created: usize,
    pub timestamp: String,
}

/// Response for table setup operations
#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDishesQuery {
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCartsQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<String>,
    pub restaurant_id: Option<String>,
    pub search: Option<String>,
}

/// Create admin router with database management and back-office endpoints
pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        // Database setup and seeding
        .route("/api/admin/setup-tables", post(setup_tables))
        .route("/api/admin/seed", post(seed_database))
        // Catalog and customer management
        .route("/api/admin/users", get(list_users).post(create_user))
        .route(
            "/api/admin/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/admin/dishes", get(list_dishes).post(create_dish))
        .route(
            "/api/admin/dishes/:dish_id",
            get(get_dish).put(update_dish).delete(delete_dish),
        )
        .route(
            "/api/admin/restaurants",
            get(list_restaurants).post(create_restaurant),
        )
        .route(
            "/api/admin/restaurants/:restaurant_id",
            get(get_restaurant)
                .put(update_restaurant)
                .delete(delete_restaurant),
        )
        // Read-only listings
        .route("/api/admin/carts", get(list_carts))
        .route("/api/admin/orders", get(list_orders))
        .with_state(state)
}

// =============================================================================
// DATABASE SETUP AND SEEDING ENDPOINTS
// =============================================================================

/// Set up the required DynamoDB tables
#[instrument(name = "setup_tables", skip(state))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<SetupTablesResponse>, ApiError> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    info!("Setting up DynamoDB tables");

    match state.table_manager.create_all_tables(&state.database).await {
        Ok(tables_created) => {
            info!("Successfully created tables: {:?}", tables_created);

            Ok(Json(SetupTablesResponse {
                message: format!("Successfully created {} tables", tables_created.len()),
                tables_created,
                timestamp,
            }))
        }
        Err(err) => {
            error!("Failed to create tables: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to create tables",
                    "message": err.to_string(),
                    "timestamp": timestamp,
                })),
            ))
        }
    }
}

/// Seed the catalog with a sample menu and pickup locations
#[instrument(name = "seed_database", skip(state))]
pub async fn seed_database(State(state): State<AdminState>) -> Result<Json<SeedResponse>, ApiError> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    info!("Seeding database with sample data");

    let mut errors = Vec::new();

    let mut dishes_created = 0;
    for request in sample_dishes() {
        let name = request.name.clone();
        match state.dish_service.create_dish(request).await {
            Ok(_) => dishes_created += 1,
            Err(err) => {
                warn!("Failed to seed dish {}: {}", name, err);
                errors.push(format!("{}: {}", name, err));
            }
        }
    }

    let mut restaurants_created = 0;
    for request in sample_restaurants() {
        let address = request.address.clone();
        match state.restaurant_service.create_restaurant(request).await {
            Ok(_) => restaurants_created += 1,
            Err(err) => {
                warn!("Failed to seed restaurant {}: {}", address, err);
                errors.push(format!("{}: {}", address, err));
            }
        }
    }

    if dishes_created + restaurants_created == 0 && !errors.is_empty() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to seed database",
                "details": errors,
                "timestamp": timestamp,
            })),
        ));
    }

    let message = if errors.is_empty() {
        format!(
            "Database seeded successfully with {} dishes and {} restaurants",
            dishes_created, restaurants_created
        )
    } else {
        warn!("Database seeding completed with {} errors", errors.len());
        format!(
            "Database seeded with {} dishes and {} restaurants, {} errors occurred",
            dishes_created,
            restaurants_created,
            errors.len()
        )
    };

    Ok(Json(SeedResponse {
        message,
        dishes_created,
        restaurants_created,
        timestamp,
    }))
}

// =============================================================================
// USER MANAGEMENT ENDPOINTS
// =============================================================================

#[instrument(name = "admin_list_users", skip(state))]
pub async fn list_users(
    State(state): State<AdminState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    state
        .user_service
        .list_users(query.search)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_create_user", skip(state, request), fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AdminState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    match state.user_service.create_user(request).await {
        Ok(user) => {
            info!("Successfully created user with ID: {}", user.id);
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(err) => {
            error!("Failed to create user: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "admin_get_user", skip(state), fields(user_id = %user_id))]
pub async fn get_user(
    State(state): State<AdminState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .user_service
        .get_user(&user_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_update_user", skip(state, request), fields(user_id = %user_id))]
pub async fn update_user(
    State(state): State<AdminState>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    match state.user_service.update_user(&user_id, request).await {
        Ok(user) => Ok(Json(user)),
        Err(err) => {
            error!("Failed to update user {}: {}", user_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Delete a user with their carts and orders
#[instrument(name = "admin_delete_user", skip(state), fields(user_id = %user_id))]
pub async fn delete_user(
    State(state): State<AdminState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.user_service.delete_user(&user_id).await {
        Ok(()) => {
            info!("Successfully deleted user: {}", user_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            error!("Failed to delete user {}: {}", user_id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// DISH MANAGEMENT ENDPOINTS
// =============================================================================

#[instrument(name = "admin_list_dishes", skip(state))]
pub async fn list_dishes(
    State(state): State<AdminState>,
    Query(query): Query<ListDishesQuery>,
) -> Result<Json<Vec<Dish>>, ApiError> {
    let filters = DishFilters {
        search_term: query.search,
        min_price: query.min_price,
        max_price: query.max_price,
    };

    state
        .dish_service
        .list_dishes(filters)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_create_dish", skip(state, request), fields(
    dish_name = %request.name,
    price = %request.price,
))]
pub async fn create_dish(
    State(state): State<AdminState>,
    Json(request): Json<CreateDishRequest>,
) -> Result<(StatusCode, Json<Dish>), ApiError> {
    info!("Admin creating new dish: {}", request.name);

    match state.dish_service.create_dish(request).await {
        Ok(dish) => {
            info!("Successfully created dish with ID: {}", dish.id);
            Ok((StatusCode::CREATED, Json(dish)))
        }
        Err(err) => {
            error!("Failed to create dish: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "admin_get_dish", skip(state), fields(dish_id = %dish_id))]
pub async fn get_dish(
    State(state): State<AdminState>,
    Path(dish_id): Path<String>,
) -> Result<Json<Dish>, ApiError> {
    state
        .dish_service
        .get_dish(&dish_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_update_dish", skip(state, request), fields(
    dish_id = %dish_id,
    dish_name = request.name.as_deref(),
    price = request.price.as_ref().map(|p| p.to_string()).as_deref(),
))]
pub async fn update_dish(
    State(state): State<AdminState>,
    Path(dish_id): Path<String>,
    Json(request): Json<UpdateDishRequest>,
) -> Result<Json<Dish>, ApiError> {
    match state.dish_service.update_dish(&dish_id, request).await {
        Ok(dish) => {
            info!("Successfully updated dish: {}", dish.name);
            Ok(Json(dish))
        }
        Err(err) => {
            error!("Failed to update dish {}: {}", dish_id, err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "admin_delete_dish", skip(state), fields(dish_id = %dish_id))]
pub async fn delete_dish(
    State(state): State<AdminState>,
    Path(dish_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.dish_service.delete_dish(&dish_id).await {
        Ok(()) => {
            info!("Successfully deleted dish: {}", dish_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            error!("Failed to delete dish {}: {}", dish_id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// RESTAURANT MANAGEMENT ENDPOINTS
// =============================================================================

#[instrument(name = "admin_list_restaurants", skip(state))]
pub async fn list_restaurants(
    State(state): State<AdminState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Restaurant>>, ApiError> {
    state
        .restaurant_service
        .search_restaurants(query.search)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_create_restaurant", skip(state, request), fields(address = %request.address))]
pub async fn create_restaurant(
    State(state): State<AdminState>,
    Json(request): Json<CreateRestaurantRequest>,
) -> Result<(StatusCode, Json<Restaurant>), ApiError> {
    match state.restaurant_service.create_restaurant(request).await {
        Ok(restaurant) => Ok((StatusCode::CREATED, Json(restaurant))),
        Err(err) => {
            error!("Failed to create restaurant: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "admin_get_restaurant", skip(state), fields(restaurant_id = %restaurant_id))]
pub async fn get_restaurant(
    State(state): State<AdminState>,
    Path(restaurant_id): Path<String>,
) -> Result<Json<Restaurant>, ApiError> {
    state
        .restaurant_service
        .get_restaurant(&restaurant_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_update_restaurant", skip(state, request), fields(restaurant_id = %restaurant_id))]
pub async fn update_restaurant(
    State(state): State<AdminState>,
    Path(restaurant_id): Path<String>,
    Json(request): Json<UpdateRestaurantRequest>,
) -> Result<Json<Restaurant>, ApiError> {
    match state
        .restaurant_service
        .update_restaurant(&restaurant_id, request)
        .await
    {
        Ok(restaurant) => Ok(Json(restaurant)),
        Err(err) => {
            error!("Failed to update restaurant {}: {}", restaurant_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Delete a restaurant; its orders remain without a pickup location
#[instrument(name = "admin_delete_restaurant", skip(state), fields(restaurant_id = %restaurant_id))]
pub async fn delete_restaurant(
    State(state): State<AdminState>,
    Path(restaurant_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state
        .restaurant_service
        .delete_restaurant(&restaurant_id)
        .await
    {
        Ok(()) => {
            info!("Successfully deleted restaurant: {}", restaurant_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            error!("Failed to delete restaurant {}: {}", restaurant_id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// CART AND ORDER LISTINGS
// =============================================================================

#[instrument(name = "admin_list_carts", skip(state), fields(
    status = query.status.as_deref(),
    search = query.search.as_deref(),
))]
pub async fn list_carts(
    State(state): State<AdminState>,
    Query(query): Query<ListCartsQuery>,
) -> Result<Json<Vec<CartSummary>>, ApiError> {
    let filters = query_to_cart_filters(query).map_err(bad_request)?;

    state
        .cart_service
        .list_carts(filters)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "admin_list_orders", skip(state))]
pub async fn list_orders(
    State(state): State<AdminState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let filters = OrderFilters {
        user_id: query.user_id,
        restaurant_id: query.restaurant_id,
        search_term: query.search,
    };

    state
        .order_service
        .list_orders(filters)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn query_to_cart_filters(query: ListCartsQuery) -> Result<CartFilters, String> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(status) => Some(status.parse::<CartStatus>()?),
    };

    Ok(CartFilters {
        status,
        username_search: query.search,
    })
}

fn dish(name: &str, ingredients: &str, price: Decimal, weight: Decimal) -> CreateDishRequest {
    CreateDishRequest {
        name: name.to_string(),
        ingredients: ingredients.to_string(),
        price,
        weight,
    }
}

/// Sample menu
fn sample_dishes() -> Vec<CreateDishRequest> {
    vec![
        dish(
            "Borscht",
            "beetroot, cabbage, potatoes, carrots, sour cream",
            dec!(10.99),
            dec!(350),
        ),
        dish(
            "Deruny",
            "potatoes, onion, egg, flour, sour cream",
            dec!(12.99),
            dec!(250),
        ),
        dish(
            "Varenyky with cherries",
            "flour, cherries, sugar",
            dec!(9.49),
            dec!(300),
        ),
        dish(
            "Chicken Kyiv",
            "chicken breast, butter, dill, breadcrumbs",
            dec!(15.50),
            dec!(280),
        ),
        dish(
            "Holubtsi",
            "cabbage leaves, rice, minced pork, tomato sauce",
            dec!(13.25),
            dec!(320),
        ),
        dish(
            "Syrnyky",
            "cottage cheese, egg, flour, sugar",
            dec!(8.75),
            dec!(200),
        ),
        dish("Uzvar", "dried apples, pears, prunes", dec!(3.20), dec!(250)),
    ]
}

/// Sample pickup locations
fn sample_restaurants() -> Vec<CreateRestaurantRequest> {
    ["123 Main St", "48 Khreshchatyk St", "7 Market Square"]
        .into_iter()
        .map(|address| CreateRestaurantRequest {
            address: address.to_string(),
        })
        .collect()
}
