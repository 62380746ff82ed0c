use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{long_id, Restaurant};

/// Placed order, an immutable snapshot of a completed cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Cleared when the restaurant is deleted
    pub restaurant_id: Option<String>,
    pub cart_id: String,
    pub lines: Vec<OrderLine>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub dish_id: String,
    pub dish_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Order with its restaurant resolved, for presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub user_id: String,
    pub cart_id: String,
    pub restaurant: Option<Restaurant>,
    pub lines: Vec<OrderLine>,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Filters for the admin order listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilters {
    pub user_id: Option<String>,
    pub restaurant_id: Option<String>,
    /// Substring of the order, cart or restaurant id
    pub search_term: Option<String>,
}

impl Order {
    pub fn new(
        user_id: String,
        restaurant_id: Option<String>,
        cart_id: String,
        lines: Vec<OrderLine>,
        total_price: Decimal,
    ) -> Self {
        Self {
            id: long_id('O'),
            user_id,
            restaurant_id,
            cart_id,
            lines,
            total_price,
            created_at: Utc::now(),
        }
    }

    pub fn matches_filters(&self, filters: &OrderFilters) -> bool {
        if let Some(user_id) = &filters.user_id {
            if &self.user_id != user_id {
                return false;
            }
        }

        if let Some(restaurant_id) = &filters.restaurant_id {
            if self.restaurant_id.as_ref() != Some(restaurant_id) {
                return false;
            }
        }

        if let Some(term) = &filters.search_term {
            if !self.matches_search(term) {
                return false;
            }
        }

        true
    }

    /// Case-insensitive substring match on the order, cart and restaurant ids
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        self.id.to_lowercase().contains(&term)
            || self.cart_id.to_lowercase().contains(&term)
            || self
                .restaurant_id
                .as_deref()
                .is_some_and(|id| id.to_lowercase().contains(&term))
    }

    pub fn to_response(&self, restaurant: Option<Restaurant>) -> OrderResponse {
        OrderResponse {
            order_id: self.id.clone(),
            user_id: self.user_id.clone(),
            cart_id: self.cart_id.clone(),
            restaurant,
            lines: self.lines.clone(),
            total_price: self.total_price,
            created_at: self.created_at,
        }
    }
}

impl OrderLine {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}, product cart: {}, user: {}, total price: {}",
            self.id, self.cart_id, self.user_id, self.total_price
        )
    }
}
