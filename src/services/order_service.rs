use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::PaginationConfig;
use crate::models::{
    normalize_search, validate_user_id, CheckoutRequest, Order, OrderFilters, OrderResponse, Page,
    Restaurant, ServiceError, ServiceResult, Validate,
};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::{
    CartRepository, DishRepository, OrderRepository, RestaurantRepository, UserRepository,
};

/// Repositories the checkout flow reads from and writes to
pub struct OrderRepositories {
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub dishes: Arc<dyn DishRepository>,
    pub restaurants: Arc<dyn RestaurantRepository>,
    pub users: Arc<dyn UserRepository>,
}

/// Checkout and order history
pub struct OrderService {
    repositories: OrderRepositories,
    page_size: u32,
    metrics: Arc<Metrics>,
    tracer: BusinessTracingMiddleware,
}

impl OrderService {
    pub fn new(
        repositories: OrderRepositories,
        pagination: &PaginationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repositories,
            page_size: pagination.orders_page_size,
            tracer: BusinessTracingMiddleware::new(metrics.clone()),
            metrics,
        }
    }

    /// Turn the user's draft cart into an order at the chosen restaurant.
    ///
    /// The order, the completed cart and the release of the draft slot are
    /// written in one transaction; on any failure nothing changes.
    #[instrument(skip(self, request), fields(user_id = %user_id, restaurant_id = ?request.restaurant_id))]
    pub async fn checkout(
        &self,
        user_id: &str,
        request: CheckoutRequest,
    ) -> ServiceResult<OrderResponse> {
        self.tracer
            .trace_cart_operation("checkout", user_id, async {
                request.validate()?;
                self.ensure_user(user_id).await?;

                let restaurant_id = request.restaurant_id.unwrap_or_default();
                let restaurant = self
                    .repositories
                    .restaurants
                    .find_by_id(restaurant_id.trim())
                    .await?
                    .ok_or_else(|| ServiceError::ValidationError {
                        message: format!("Restaurant {} does not exist", restaurant_id.trim()),
                    })?;

                let mut cart = match self.repositories.carts.find_draft_cart(user_id).await? {
                    Some(cart) if !cart.is_empty() => cart,
                    _ => {
                        info!("Checkout attempted with an empty cart");
                        return Err(ServiceError::EmptyCart {
                            user_id: user_id.to_string(),
                        });
                    }
                };

                let ids: Vec<String> = cart.items.iter().map(|item| item.dish_id.clone()).collect();
                let dishes = self.repositories.dishes.find_many(&ids).await?;
                let dropped = cart.reprice(&dishes);
                if !dropped.is_empty() {
                    info!(dropped = ?dropped, "Dishes removed from the menu since they were added");
                }
                if cart.is_empty() {
                    return Err(ServiceError::EmptyCart {
                        user_id: user_id.to_string(),
                    });
                }

                let order = cart.create_order(Some(&restaurant))?;

                if let Err(e) = self.repositories.orders.place_order(&order, &cart).await {
                    crate::error_with_trace!(error = %e, cart_id = %cart.id, "Order placement rolled back");
                    return Err(ServiceError::OrderCreationFailed {
                        message: e.to_string(),
                    });
                }

                self.metrics.record_order_placed(order.total_price);
                crate::info_with_trace!(
                    order_id = %order.id,
                    total_price = %order.total_price,
                    "Order placed"
                );
                Ok::<_, ServiceError>(order.to_response(Some(restaurant)))
            })
            .await
    }

    /// One page of the user's orders, oldest first
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_orders(
        &self,
        user_id: &str,
        page: Option<u32>,
    ) -> ServiceResult<Page<OrderResponse>> {
        self.ensure_user(user_id).await?;

        let orders = self.repositories.orders.find_by_user(user_id).await?;
        let page = Page::paginate(orders, page.unwrap_or(1), self.page_size)?;

        let restaurants = self.restaurants_of(&page.items).await?;
        info!("Listed {} of {} orders", page.items.len(), page.total_count);
        Ok(page.map(|order| {
            let restaurant = lookup(&restaurants, order.restaurant_id.as_deref());
            order.to_response(restaurant)
        }))
    }

    /// A single order, visible only to the user who placed it
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn get_order(&self, user_id: &str, order_id: &str) -> ServiceResult<OrderResponse> {
        let order = self
            .repositories
            .orders
            .find_by_id(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| ServiceError::OrderNotFound {
                id: order_id.to_string(),
            })?;

        let restaurant = match order.restaurant_id.as_deref() {
            Some(id) => self.repositories.restaurants.find_by_id(id).await?,
            None => None,
        };
        Ok(order.to_response(restaurant))
    }

    /// Admin listing, oldest first. The search term matches order, cart and
    /// restaurant ids as well as the username of the customer.
    #[instrument(skip(self), fields(filters = ?filters))]
    pub async fn list_orders(&self, filters: OrderFilters) -> ServiceResult<Vec<OrderResponse>> {
        let search = normalize_search(filters.search_term.clone()).map(|term| term.to_lowercase());
        let orders = self
            .repositories
            .orders
            .find_all(OrderFilters {
                search_term: None,
                ..filters
            })
            .await?;

        let orders: Vec<Order> = match &search {
            Some(term) => {
                let usernames: HashMap<String, String> = self
                    .repositories
                    .users
                    .find_all(None)
                    .await?
                    .into_iter()
                    .map(|user| (user.id, user.username.to_lowercase()))
                    .collect();

                orders
                    .into_iter()
                    .filter(|order| {
                        order.matches_search(term)
                            || usernames
                                .get(&order.user_id)
                                .is_some_and(|username| username.contains(term.as_str()))
                    })
                    .collect()
            }
            None => orders,
        };

        let restaurants = self.restaurants_of(&orders).await?;
        info!("Found {} orders", orders.len());
        Ok(orders
            .into_iter()
            .map(|order| {
                let restaurant = lookup(&restaurants, order.restaurant_id.as_deref());
                order.to_response(restaurant)
            })
            .collect())
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.repositories.orders.count().await?)
    }

    async fn ensure_user(&self, user_id: &str) -> ServiceResult<()> {
        validate_user_id(user_id)?;
        match self.repositories.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::UserNotFound {
                id: user_id.to_string(),
            }),
        }
    }

    /// Resolve the distinct restaurants referenced by `orders`
    async fn restaurants_of(&self, orders: &[Order]) -> ServiceResult<HashMap<String, Restaurant>> {
        let mut restaurants = HashMap::new();
        for id in orders.iter().filter_map(|order| order.restaurant_id.as_deref()) {
            if restaurants.contains_key(id) {
                continue;
            }
            if let Some(restaurant) = self.repositories.restaurants.find_by_id(id).await? {
                restaurants.insert(id.to_string(), restaurant);
            }
        }
        Ok(restaurants)
    }
}

fn lookup(restaurants: &HashMap<String, Restaurant>, id: Option<&str>) -> Option<Restaurant> {
    id.and_then(|id| restaurants.get(id)).cloned()
}
