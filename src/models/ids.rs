use uuid::Uuid;

/// Short catalog identifier: a one-letter prefix and 8 hex characters
pub fn short_id(prefix: char) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, simple.get(0..8).unwrap_or("00000000"))
}

/// Full identifier for transactional records (carts, orders)
pub fn long_id(prefix: char) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}
