use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::PaginationConfig;
use crate::models::{
    check_page, normalize_search, validate_entity_id, validate_user_id, AddCartItemRequest, Cart,
    CartFilters, CartResponse, CartSummary, Dish, RepositoryError, ServiceError, ServiceResult,
    UpdateCartItemRequest, Validate, MAX_CART_QUANTITY,
};
use crate::observability::{BusinessTracingMiddleware, Metrics};
use crate::repositories::{CartRepository, DishRepository, UserRepository};

/// Service for the draft cart of each user
pub struct CartService {
    cart_repository: Arc<dyn CartRepository>,
    dish_repository: Arc<dyn DishRepository>,
    user_repository: Arc<dyn UserRepository>,
    page_size: u32,
    tracer: BusinessTracingMiddleware,
}

impl CartService {
    pub fn new(
        cart_repository: Arc<dyn CartRepository>,
        dish_repository: Arc<dyn DishRepository>,
        user_repository: Arc<dyn UserRepository>,
        pagination: &PaginationConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cart_repository,
            dish_repository,
            user_repository,
            page_size: pagination.cart_page_size,
            tracer: BusinessTracingMiddleware::new(metrics),
        }
    }

    /// The user's draft cart with current catalog prices, one page of lines at a time
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: &str, page: Option<u32>) -> ServiceResult<CartResponse> {
        info!("Getting cart");

        let page = page.unwrap_or(1);
        self.ensure_user(user_id).await?;

        let cart = match self.cart_repository.find_draft_cart(user_id).await? {
            Some(cart) => self.refresh_prices(cart).await?,
            None => {
                check_page(page, 0, self.page_size)?;
                info!("No draft cart, returning empty cart");
                return Ok(CartResponse::empty(user_id, self.page_size));
            }
        };

        check_page(page, cart.items.len(), self.page_size)?;
        info!("Cart retrieved with {} lines", cart.items.len());
        Ok(cart.to_response(page, self.page_size))
    }

    /// Add portions of a dish, starting a draft cart on the first add
    #[instrument(skip(self, request), fields(user_id = %user_id, dish_id = %request.dish_id, quantity = request.quantity))]
    pub async fn add_item(
        &self,
        user_id: &str,
        request: AddCartItemRequest,
    ) -> ServiceResult<CartResponse> {
        self.tracer
            .trace_cart_operation("add_item", user_id, async {
                request.validate()?;
                self.ensure_user(user_id).await?;

                let dish = self
                    .dish_repository
                    .find_by_id(&request.dish_id)
                    .await?
                    .ok_or_else(|| ServiceError::DishNotFound {
                        id: request.dish_id.clone(),
                    })?;

                let cart = match self.cart_repository.find_draft_cart(user_id).await? {
                    Some(mut cart) => {
                        add_within_limit(&mut cart, &dish, request.quantity)?;
                        self.save(cart).await?
                    }
                    None => {
                        let mut cart = Cart::new(user_id.to_string());
                        cart.add_product(&dish, request.quantity);
                        match self.cart_repository.create_draft_cart(cart).await {
                            Ok(cart) => {
                                info!(cart_id = %cart.id, "Draft cart created");
                                cart
                            }
                            Err(RepositoryError::DuplicateKey { .. }) => {
                                // Lost the race for the draft slot, add to the winner's cart
                                let mut cart = self.existing_draft(user_id).await?;
                                add_within_limit(&mut cart, &dish, request.quantity)?;
                                self.save(cart).await?
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                };

                info!("Item added to cart");
                Ok::<_, ServiceError>(cart.to_response(1, self.page_size))
            })
            .await
    }

    /// Set the quantity of a dish; zero removes the line
    #[instrument(skip(self, request), fields(user_id = %user_id, dish_id = %dish_id, quantity = request.quantity))]
    pub async fn update_item(
        &self,
        user_id: &str,
        dish_id: &str,
        request: UpdateCartItemRequest,
    ) -> ServiceResult<CartResponse> {
        self.tracer
            .trace_cart_operation("update_item", user_id, async {
                request.validate()?;
                validate_entity_id("dish_id", dish_id, 'D')?;
                self.ensure_user(user_id).await?;

                if request.quantity == 0 {
                    return self.remove(user_id, dish_id, u32::MAX).await;
                }

                let dish = self
                    .dish_repository
                    .find_by_id(dish_id)
                    .await?
                    .ok_or_else(|| ServiceError::DishNotFound {
                        id: dish_id.to_string(),
                    })?;

                let cart = match self.cart_repository.find_draft_cart(user_id).await? {
                    Some(mut cart) => {
                        cart.update_quantity(&dish, request.quantity);
                        self.save(cart).await?
                    }
                    None => {
                        let mut cart = Cart::new(user_id.to_string());
                        cart.update_quantity(&dish, request.quantity);
                        match self.cart_repository.create_draft_cart(cart).await {
                            Ok(cart) => cart,
                            Err(RepositoryError::DuplicateKey { .. }) => {
                                let mut cart = self.existing_draft(user_id).await?;
                                cart.update_quantity(&dish, request.quantity);
                                self.save(cart).await?
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                };

                info!("Cart item quantity updated");
                Ok::<_, ServiceError>(cart.to_response(1, self.page_size))
            })
            .await
    }

    /// Take portions of a dish off the cart, one when `quantity` is `None`.
    /// Removing a dish that is not in the cart leaves the cart unchanged.
    #[instrument(skip(self), fields(user_id = %user_id, dish_id = %dish_id))]
    pub async fn remove_item(
        &self,
        user_id: &str,
        dish_id: &str,
        quantity: Option<u32>,
    ) -> ServiceResult<CartResponse> {
        self.tracer
            .trace_cart_operation("remove_item", user_id, async {
                if quantity == Some(0) {
                    return Err(ServiceError::InvalidQuantity { quantity: 0 });
                }
                validate_entity_id("dish_id", dish_id, 'D')?;
                self.ensure_user(user_id).await?;

                self.remove(user_id, dish_id, quantity.unwrap_or(1)).await
            })
            .await
    }

    /// Admin listing of carts, newest first
    #[instrument(skip(self), fields(filters = ?filters))]
    pub async fn list_carts(&self, filters: CartFilters) -> ServiceResult<Vec<CartSummary>> {
        let carts = self.cart_repository.find_all(filters.status).await?;

        let usernames: HashMap<String, String> = self
            .user_repository
            .find_all(None)
            .await?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect();

        let search = normalize_search(filters.username_search).map(|term| term.to_lowercase());
        let summaries: Vec<CartSummary> = carts
            .iter()
            .map(|cart| cart.to_summary(usernames.get(&cart.user_id).cloned()))
            .filter(|summary| match &search {
                Some(term) => summary
                    .username
                    .as_deref()
                    .is_some_and(|username| username.to_lowercase().contains(term)),
                None => true,
            })
            .collect();

        info!("Found {} carts", summaries.len());
        Ok(summaries)
    }

    async fn remove(&self, user_id: &str, dish_id: &str, quantity: u32) -> ServiceResult<CartResponse> {
        let Some(mut cart) = self.cart_repository.find_draft_cart(user_id).await? else {
            info!("No draft cart, nothing to remove");
            return Ok(CartResponse::empty(user_id, self.page_size));
        };

        if cart.remove_product(dish_id, quantity) {
            cart = self.save(cart).await?;
            info!("Item removed from cart");
        } else {
            info!("Dish not in cart, nothing to remove");
        }

        Ok(cart.to_response(1, self.page_size))
    }

    /// Users must exist before they can own a cart
    async fn ensure_user(&self, user_id: &str) -> ServiceResult<()> {
        validate_user_id(user_id)?;
        match self.user_repository.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::UserNotFound {
                id: user_id.to_string(),
            }),
        }
    }

    async fn existing_draft(&self, user_id: &str) -> ServiceResult<Cart> {
        self.cart_repository
            .find_draft_cart(user_id)
            .await?
            .ok_or_else(|| {
                RepositoryError::ConstraintViolation {
                    message: format!("Draft cart of user {} changed concurrently", user_id),
                }
                .into()
            })
    }

    async fn save(&self, cart: Cart) -> ServiceResult<Cart> {
        let cart_id = cart.id.clone();
        self.cart_repository
            .save_cart(cart)
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation { .. } => ServiceError::CartModified { cart_id },
                other => other.into(),
            })
    }

    /// Reprice from the catalog, persisting the cart when deleted dishes had to be dropped
    async fn refresh_prices(&self, mut cart: Cart) -> ServiceResult<Cart> {
        let ids: Vec<String> = cart.items.iter().map(|item| item.dish_id.clone()).collect();
        let dishes = self.dish_repository.find_many(&ids).await?;

        let dropped = cart.reprice(&dishes);
        if dropped.is_empty() {
            return Ok(cart);
        }

        warn!(dropped = ?dropped, "Dropping cart lines of deleted dishes");
        self.save(cart).await
    }
}

/// Merge portions into a line, refusing to grow it past the per-line limit
fn add_within_limit(cart: &mut Cart, dish: &Dish, quantity: u32) -> ServiceResult<()> {
    let current = cart.get_item(&dish.id).map_or(0, |item| item.quantity);
    let merged = current.saturating_add(quantity);
    if merged > MAX_CART_QUANTITY {
        warn!(current, requested = quantity, "Line would exceed the quantity limit");
        return Err(ServiceError::InvalidQuantity { quantity: merged });
    }
    cart.add_product(dish, quantity);
    Ok(())
}
