use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::short_id;

/// Menu entry served by the cafeteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub name: String,
    pub ingredients: String,
    pub price: Decimal,
    /// Portion weight in grams
    pub weight: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request model for creating a new dish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDishRequest {
    pub name: String,
    pub ingredients: String,
    pub price: Decimal,
    pub weight: Decimal,
}

/// Request model for updating an existing dish
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDishRequest {
    pub name: Option<String>,
    pub ingredients: Option<String>,
    pub price: Option<Decimal>,
    pub weight: Option<Decimal>,
}

/// Filters for querying the menu
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DishFilters {
    pub search_term: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl Dish {
    pub fn new(request: CreateDishRequest) -> Self {
        let now = Utc::now();
        Self {
            id: short_id('D'),
            name: request.name.trim().to_string(),
            ingredients: request.ingredients.trim().to_string(),
            price: request.price,
            weight: request.weight,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(&mut self, request: UpdateDishRequest) {
        if let Some(name) = request.name {
            self.name = name.trim().to_string();
        }
        if let Some(ingredients) = request.ingredients {
            self.ingredients = ingredients.trim().to_string();
        }
        if let Some(price) = request.price {
            self.price = price;
        }
        if let Some(weight) = request.weight {
            self.weight = weight;
        }
        self.updated_at = Utc::now();
    }

    /// Check if the dish matches the given filters
    pub fn matches_filters(&self, filters: &DishFilters) -> bool {
        if let Some(min_price) = &filters.min_price {
            if &self.price < min_price {
                return false;
            }
        }

        if let Some(max_price) = &filters.max_price {
            if &self.price > max_price {
                return false;
            }
        }

        if let Some(search_term) = &filters.search_term {
            if !self
                .name
                .to_lowercase()
                .contains(&search_term.trim().to_lowercase())
            {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} uah ({} g)", self.name, self.price, self.weight)
    }
}
