use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::short_id;

/// Cafeteria customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl User {
    pub fn new(request: CreateUserRequest) -> Self {
        Self {
            id: short_id('U'),
            username: request.username.trim().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request
                .email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
            phone_number: request.phone_number.trim().to_string(),
            date_joined: Utc::now(),
        }
    }

    pub fn update(&mut self, request: UpdateUserRequest) {
        if let Some(username) = request.username {
            self.username = username.trim().to_string();
        }
        if let Some(first_name) = request.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(email) = request.email {
            let email = email.trim().to_string();
            self.email = if email.is_empty() { None } else { Some(email) };
        }
        if let Some(phone_number) = request.phone_number {
            self.phone_number = phone_number.trim().to_string();
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {})",
            self.username, self.first_name, self.last_name
        )
    }
}
