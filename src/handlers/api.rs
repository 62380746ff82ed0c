use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::errors::{bad_request, service_error_to_response, ApiError};
use crate::models::{
    AddCartItemRequest, CartResponse, CheckoutRequest, Dish, OrderResponse, Page, PageQuery,
    Restaurant, UpdateCartItemRequest,
};
use crate::services::{CartService, DishService, OrderService, RestaurantService, UserService};

/// Shared application state containing all services
#[derive(Clone)]
pub struct ApiState {
    pub dish_service: Arc<DishService>,
    pub restaurant_service: Arc<RestaurantService>,
    pub cart_service: Arc<CartService>,
    pub order_service: Arc<OrderService>,
    pub user_service: Arc<UserService>,
}

/// Landing page numbers
#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub restaurants: usize,
    pub orders: usize,
    pub users: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageOnlyQuery {
    pub page: Option<u32>,
}

/// Portions to take off a cart line, one when omitted
#[derive(Debug, Default, Deserialize)]
pub struct RemoveItemQuery {
    pub quantity: Option<u32>,
}

/// Confirmation returned by a successful checkout
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub order: OrderResponse,
}

/// Create API router with all public endpoints
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/overview", get(overview))
        .route("/api/menu", get(list_menu))
        .route("/api/dishes/:dish_id", get(get_dish))
        .route("/api/restaurants", get(list_restaurants))
        .route("/api/cart/:user_id", get(get_cart))
        .route("/api/cart/:user_id/items", post(add_cart_item))
        .route(
            "/api/cart/:user_id/items/:dish_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/api/cart/:user_id/checkout", post(checkout_cart))
        .route("/api/orders/:user_id", get(list_orders))
        .route("/api/orders/:user_id/:order_id", get(get_order))
        .with_state(state)
}

// =============================================================================
// CATALOG ENDPOINTS
// =============================================================================

/// Counts shown on the landing page
#[instrument(name = "overview", skip(state))]
pub async fn overview(State(state): State<ApiState>) -> Result<Json<OverviewResponse>, ApiError> {
    let counts = tokio::try_join!(
        state.restaurant_service.count(),
        state.order_service.count(),
        state.user_service.count(),
    );

    match counts {
        Ok((restaurants, orders, users)) => Ok(Json(OverviewResponse {
            restaurants,
            orders,
            users,
        })),
        Err(err) => {
            error!("Failed to build overview: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Dishes ordered by name, one page at a time
#[instrument(name = "list_menu", skip(state), fields(
    page = ?query.page,
    search = query.search.as_deref(),
))]
pub async fn list_menu(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Dish>>, ApiError> {
    info!("Listing menu");

    match state.dish_service.list_menu(query).await {
        Ok(page) => {
            info!("Successfully listed {} dishes", page.items.len());
            Ok(Json(page))
        }
        Err(err) => {
            error!("Failed to list menu: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "get_dish", skip(state), fields(dish_id = %dish_id))]
pub async fn get_dish(
    State(state): State<ApiState>,
    Path(dish_id): Path<String>,
) -> Result<Json<Dish>, ApiError> {
    match state.dish_service.get_dish(&dish_id).await {
        Ok(dish) => Ok(Json(dish)),
        Err(err) => {
            error!("Failed to get dish {}: {}", dish_id, err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "list_restaurants", skip(state), fields(
    page = ?query.page,
    search = query.search.as_deref(),
))]
pub async fn list_restaurants(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Restaurant>>, ApiError> {
    match state.restaurant_service.list_restaurants(query).await {
        Ok(page) => Ok(Json(page)),
        Err(err) => {
            error!("Failed to list restaurants: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// CART ENDPOINTS
// =============================================================================

/// Get a user's draft cart
#[instrument(name = "get_cart", skip(state), fields(user_id = %user_id))]
pub async fn get_cart(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageOnlyQuery>,
) -> Result<Json<CartResponse>, ApiError> {
    info!("Getting cart for user: {}", user_id);

    match state.cart_service.get_cart(&user_id, query.page).await {
        Ok(cart) => {
            info!(
                "Successfully retrieved cart with {} items",
                cart.total_items
            );
            Ok(Json(cart))
        }
        Err(err) => {
            error!("Failed to get cart for user {}: {}", user_id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Add an item to the cart
#[instrument(name = "add_cart_item", skip(state, request), fields(
    user_id = %user_id,
    dish_id = %request.dish_id,
    quantity = %request.quantity,
))]
pub async fn add_cart_item(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    crate::info_with_trace!(
        "Adding item to cart for user: {}, dish_id: {}, quantity: {}",
        user_id, request.dish_id, request.quantity
    );

    match state.cart_service.add_item(&user_id, request).await {
        Ok(cart) => {
            crate::info_with_trace!("Successfully added item to cart");
            Ok((StatusCode::CREATED, Json(cart)))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to add item to cart: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Set the quantity of an item in the cart
#[instrument(name = "update_cart_item", skip(state, request), fields(
    user_id = %user_id,
    dish_id = %dish_id,
    quantity = %request.quantity,
))]
pub async fn update_cart_item(
    State(state): State<ApiState>,
    Path((user_id, dish_id)): Path<(String, String)>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    crate::info_with_trace!(
        "Updating cart item for user: {}, dish_id: {}, new_quantity: {}",
        user_id, dish_id, request.quantity
    );

    match state
        .cart_service
        .update_item(&user_id, &dish_id, request)
        .await
    {
        Ok(cart) => Ok(Json(cart)),
        Err(err) => {
            crate::error_with_trace!("Failed to update cart item: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Remove portions of an item, or the whole line without `?quantity`
#[instrument(name = "remove_cart_item", skip(state), fields(
    user_id = %user_id,
    dish_id = %dish_id,
    quantity = ?query.quantity,
))]
pub async fn remove_cart_item(
    State(state): State<ApiState>,
    Path((user_id, dish_id)): Path<(String, String)>,
    Query(query): Query<RemoveItemQuery>,
) -> Result<Json<CartResponse>, ApiError> {
    match state
        .cart_service
        .remove_item(&user_id, &dish_id, query.quantity)
        .await
    {
        Ok(cart) => {
            crate::info_with_trace!("Successfully removed item from cart");
            Ok(Json(cart))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to remove item from cart: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Checkout the draft cart and create an order
#[instrument(name = "checkout_cart", skip(state, payload), fields(user_id = %user_id))]
pub async fn checkout_cart(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        // No body is read as an empty request, which then fails restaurant validation
        Err(JsonRejection::MissingJsonContentType(_)) => CheckoutRequest::default(),
        Err(rejection) => return Err(bad_request(rejection.body_text())),
    };

    info!("Processing checkout for user: {}", user_id);

    match state.order_service.checkout(&user_id, request).await {
        Ok(order) => {
            crate::info_with_trace!(
                "Checkout completed successfully for order: {}",
                order.order_id
            );
            Ok((
                StatusCode::CREATED,
                Json(CheckoutResponse {
                    message: format!("Order {} has been placed", order.order_id),
                    order,
                }),
            ))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to process checkout: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// ORDER ENDPOINTS
// =============================================================================

#[instrument(name = "list_orders", skip(state), fields(user_id = %user_id))]
pub async fn list_orders(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageOnlyQuery>,
) -> Result<Json<Page<OrderResponse>>, ApiError> {
    match state
        .order_service
        .list_user_orders(&user_id, query.page)
        .await
    {
        Ok(page) => Ok(Json(page)),
        Err(err) => {
            error!("Failed to list orders for user {}: {}", user_id, err);
            Err(service_error_to_response(err))
        }
    }
}

#[instrument(name = "get_order", skip(state), fields(user_id = %user_id, order_id = %order_id))]
pub async fn get_order(
    State(state): State<ApiState>,
    Path((user_id, order_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    match state.order_service.get_order(&user_id, &order_id).await {
        Ok(order) => Ok(Json(order)),
        Err(err) => {
            error!("Failed to get order {}: {}", order_id, err);
            Err(service_error_to_response(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;
    use crate::models::{CreateDishRequest, CreateRestaurantRequest, CreateUserRequest, User};
    use crate::observability::Metrics;
    use crate::services::mocks::{
        MockTestCartRepository, MockTestDishRepository, MockTestOrderRepository,
        MockTestRestaurantRepository, MockTestUserRepository,
    };
    use crate::services::OrderRepositories;
    use axum::{body::Body, http::Request};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    const ALICE: &str = "U0a1b2c3d";

    fn alice() -> User {
        let mut user = User::new(CreateUserRequest {
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: None,
            phone_number: "+380501234567".to_string(),
        });
        user.id = ALICE.to_string();
        user
    }

    fn router(
        dishes: MockTestDishRepository,
        restaurants: MockTestRestaurantRepository,
        carts: MockTestCartRepository,
    ) -> Router {
        let mut users = MockTestUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(Some(alice())));

        let pagination = PaginationConfig::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let dishes = Arc::new(dishes);
        let restaurants = Arc::new(restaurants);
        let carts = Arc::new(carts);
        let users = Arc::new(users);
        let orders = Arc::new(MockTestOrderRepository::new());

        create_api_router(ApiState {
            dish_service: Arc::new(DishService::new(
                dishes.clone(),
                &pagination,
                metrics.clone(),
            )),
            restaurant_service: Arc::new(RestaurantService::new(
                restaurants.clone(),
                orders.clone(),
                &pagination,
                metrics.clone(),
            )),
            cart_service: Arc::new(CartService::new(
                carts.clone(),
                dishes.clone(),
                users.clone(),
                &pagination,
                metrics.clone(),
            )),
            order_service: Arc::new(OrderService::new(
                OrderRepositories {
                    orders: orders.clone(),
                    carts: carts.clone(),
                    dishes: dishes.clone(),
                    restaurants: restaurants.clone(),
                    users: users.clone(),
                },
                &pagination,
                metrics.clone(),
            )),
            user_service: Arc::new(UserService::new(users, carts, orders, metrics)),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart() {
        let mut restaurants = MockTestRestaurantRepository::new();
        restaurants.expect_find_by_id().returning(|_| {
            Ok(Some(Restaurant::new(CreateRestaurantRequest {
                address: "123 Main St".to_string(),
            })))
        });
        let mut carts = MockTestCartRepository::new();
        carts.expect_find_draft_cart().returning(|_| Ok(None));

        let app = router(MockTestDishRepository::new(), restaurants, carts);
        let response = app
            .oneshot(
                Request::post(format!("/api/cart/{}/checkout", ALICE))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"restaurant_id":"R12345678"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Your cart is empty");
    }

    #[tokio::test]
    async fn test_bodiless_checkout_requires_restaurant() {
        let app = router(
            MockTestDishRepository::new(),
            MockTestRestaurantRepository::new(),
            MockTestCartRepository::new(),
        );
        let response = app
            .oneshot(
                Request::post(format!("/api/cart/{}/checkout", ALICE))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_with_malformed_body() {
        let app = router(
            MockTestDishRepository::new(),
            MockTestRestaurantRepository::new(),
            MockTestCartRepository::new(),
        );
        let response = app
            .oneshot(
                Request::post(format!("/api/cart/{}/checkout", ALICE))
                    .header("content-type", "application/json")
                    .body(Body::from("{\"restaurant_id\":"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_menu_page_past_the_end() {
        let mut dishes = MockTestDishRepository::new();
        dishes.expect_find_all().returning(|_| {
            Ok(vec![Dish::new(CreateDishRequest {
                name: "Borscht".to_string(),
                ingredients: "beetroot, cabbage".to_string(),
                price: dec!(10.99),
                weight: dec!(350),
            })])
        });

        let app = router(
            dishes,
            MockTestRestaurantRepository::new(),
            MockTestCartRepository::new(),
        );
        let response = app
            .oneshot(Request::get("/api/menu?page=3").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_remove_zero_portions_is_rejected() {
        let app = router(
            MockTestDishRepository::new(),
            MockTestRestaurantRepository::new(),
            MockTestCartRepository::new(),
        );
        let response = app
            .oneshot(
                Request::delete(format!("/api/cart/{}/items/D12345678?quantity=0", ALICE))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
