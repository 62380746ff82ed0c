use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::short_id;

/// Cafeteria location where orders are picked up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRestaurantRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRestaurantRequest {
    pub address: Option<String>,
}

impl Restaurant {
    pub fn new(request: CreateRestaurantRequest) -> Self {
        let now = Utc::now();
        Self {
            id: short_id('R'),
            address: request.address.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(&mut self, request: UpdateRestaurantRequest) {
        if let Some(address) = request.address {
            self.address = address.trim().to_string();
        }
        self.updated_at = Utc::now();
    }

    /// Case-insensitive substring match on the address
    pub fn matches_search(&self, search_term: Option<&str>) -> bool {
        match search_term {
            Some(term) => self
                .address
                .to_lowercase()
                .contains(&term.trim().to_lowercase()),
            None => true,
        }
    }
}

impl fmt::Display for Restaurant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Restaurant: {}", self.address)
    }
}
