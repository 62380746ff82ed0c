use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{long_id, CartStatus, Dish, Order, OrderLine, Restaurant, ServiceError, ServiceResult};

/// Shopping cart owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Storage revision this copy was read at. Writes are conditioned on it
    /// and bump it, so a write made from a stale read is rejected.
    #[serde(default)]
    pub version: u64,
}

/// Line item: a dish and how many portions of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub dish_id: String,
    pub dish_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// Request model for adding an item to cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCartItemRequest {
    pub dish_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Request model for setting the quantity of a cart item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

/// Request model for checkout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub restaurant_id: Option<String>,
}

/// Draft cart as presented to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart_id: Option<String>,
    pub user_id: String,
    pub items: Vec<CartItemResponse>,
    pub quantities: BTreeMap<String, u32>,
    pub line_count: usize,
    pub total_items: u32,
    pub total_price: Decimal,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemResponse {
    pub dish_id: String,
    pub dish_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// Admin listing row for a cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSummary {
    pub cart_id: String,
    pub user_id: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: CartStatus,
    pub display_items: String,
}

/// Filters for the admin cart listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartFilters {
    pub status: Option<CartStatus>,
    pub username_search: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Cart {
    /// Create a new empty draft cart for a user
    pub fn new(user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: long_id('C'),
            user_id,
            status: CartStatus::Draft,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status == CartStatus::Draft
    }

    /// Add `quantity` portions of a dish, merging with an existing line
    pub fn add_product(&mut self, dish: &Dish, quantity: u32) {
        if let Some(existing) = self.items.iter_mut().find(|item| item.dish_id == dish.id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            existing.unit_price = dish.price;
            existing.dish_name = dish.name.clone();
        } else {
            self.items.push(CartItem::new(dish, quantity));
        }
        self.updated_at = Utc::now();
    }

    /// Take `quantity` portions off a line; the line goes away once it hits zero.
    /// Returns false when the dish is not in the cart.
    pub fn remove_product(&mut self, dish_id: &str, quantity: u32) -> bool {
        let Some(position) = self.items.iter().position(|item| item.dish_id == dish_id) else {
            return false;
        };

        let item = &mut self.items[position];
        if quantity >= item.quantity {
            self.items.remove(position);
        } else {
            item.quantity -= quantity;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Set an absolute quantity, creating the line if needed. Zero removes the line.
    pub fn update_quantity(&mut self, dish: &Dish, quantity: u32) {
        if quantity == 0 {
            self.items.retain(|item| item.dish_id != dish.id);
        } else if let Some(existing) = self.items.iter_mut().find(|item| item.dish_id == dish.id) {
            existing.quantity = quantity;
            existing.unit_price = dish.price;
            existing.dish_name = dish.name.clone();
        } else {
            self.items.push(CartItem::new(dish, quantity));
        }
        self.updated_at = Utc::now();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Sum of unit price times quantity over all lines
    pub fn cart_total(&self) -> Decimal {
        self.items.iter().map(CartItem::total_price).sum()
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_item(&self, dish_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.dish_id == dish_id)
    }

    pub fn contains_item(&self, dish_id: &str) -> bool {
        self.get_item(dish_id).is_some()
    }

    /// Refresh prices and names from the catalog. Lines whose dish no longer
    /// exists are dropped and their ids returned.
    pub fn reprice(&mut self, dishes: &HashMap<String, Dish>) -> Vec<String> {
        let mut dropped = Vec::new();
        self.items.retain_mut(|item| match dishes.get(&item.dish_id) {
            Some(dish) => {
                item.unit_price = dish.price;
                item.dish_name = dish.name.clone();
                true
            }
            None => {
                dropped.push(item.dish_id.clone());
                false
            }
        });
        dropped
    }

    /// Comma separated dish names, as shown in admin listings
    pub fn display_items(&self) -> String {
        self.items
            .iter()
            .map(|item| item.dish_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Snapshot the cart into an order and mark the cart completed
    pub fn create_order(&mut self, restaurant: Option<&Restaurant>) -> ServiceResult<Order> {
        if !self.is_draft() {
            return Err(ServiceError::CartNotDraft {
                cart_id: self.id.clone(),
            });
        }

        let lines = self
            .items
            .iter()
            .map(|item| OrderLine {
                dish_id: item.dish_id.clone(),
                dish_name: item.dish_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let order = Order::new(
            self.user_id.clone(),
            restaurant.map(|restaurant| restaurant.id.clone()),
            self.id.clone(),
            lines,
            self.cart_total(),
        );

        self.status = CartStatus::Completed;
        self.updated_at = Utc::now();

        Ok(order)
    }

    /// Build the owner's view of this cart, showing one page of lines
    pub fn to_response(&self, page: u32, page_size: u32) -> CartResponse {
        let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let items = self
            .items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .map(CartItem::to_response)
            .collect();

        CartResponse {
            cart_id: Some(self.id.clone()),
            user_id: self.user_id.clone(),
            items,
            quantities: self
                .items
                .iter()
                .map(|item| (item.dish_id.clone(), item.quantity))
                .collect(),
            line_count: self.items.len(),
            total_items: self.total_items(),
            total_price: self.cart_total(),
            page,
            page_size,
        }
    }

    pub fn to_summary(&self, username: Option<String>) -> CartSummary {
        CartSummary {
            cart_id: self.id.clone(),
            user_id: self.user_id.clone(),
            username,
            created_at: self.created_at,
            status: self.status,
            display_items: self.display_items(),
        }
    }
}

impl fmt::Display for Cart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product cart: {}", self.id)
    }
}

impl CartResponse {
    /// View of a user who has no draft cart yet
    pub fn empty(user_id: &str, page_size: u32) -> Self {
        Self {
            cart_id: None,
            user_id: user_id.to_string(),
            items: Vec::new(),
            quantities: BTreeMap::new(),
            line_count: 0,
            total_items: 0,
            total_price: Decimal::ZERO,
            page: 1,
            page_size,
        }
    }
}

impl CartItem {
    pub fn new(dish: &Dish, quantity: u32) -> Self {
        Self {
            dish_id: dish.id.clone(),
            dish_name: dish.name.clone(),
            quantity,
            unit_price: dish.price,
            added_at: Utc::now(),
        }
    }

    /// Unit price times quantity
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn to_response(&self) -> CartItemResponse {
        CartItemResponse {
            dish_id: self.dish_id.clone(),
            dish_name: self.dish_name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price(),
            added_at: self.added_at,
        }
    }
}
