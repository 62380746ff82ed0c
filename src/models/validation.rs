use rust_decimal::Decimal;

use super::{
    AddCartItemRequest, CheckoutRequest, CreateDishRequest, CreateRestaurantRequest,
    CreateUserRequest, UpdateCartItemRequest, UpdateDishRequest, UpdateRestaurantRequest,
    UpdateUserRequest, ValidationError, ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_PERSON_NAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PHONE_LENGTH: usize = 9;
pub const MAX_PHONE_LENGTH: usize = 13;
pub const MAX_DISH_NAME_LENGTH: usize = 150;
pub const MAX_INGREDIENTS_LENGTH: usize = 255;
pub const MAX_ADDRESS_LENGTH: usize = 1000;
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
pub const MAX_PRICE: Decimal = Decimal::from_parts(1410065407, 2, 0, false, 2); // 99999999.99
pub const MIN_WEIGHT: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
pub const MAX_WEIGHT: Decimal = Decimal::from_parts(99999, 0, 0, false, 2); // 999.99
pub const MAX_CART_QUANTITY: u32 = 1000;
pub const MIN_CART_QUANTITY: u32 = 1;

impl Validate for CreateUserRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_username(&self.username)?;
        validate_person_name("first_name", &self.first_name)?;
        validate_person_name("last_name", &self.last_name)?;
        validate_email(self.email.as_deref())?;
        validate_phone_number(&self.phone_number)?;
        Ok(())
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(first_name) = &self.first_name {
            validate_person_name("first_name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_person_name("last_name", last_name)?;
        }
        validate_email(self.email.as_deref())?;
        if let Some(phone_number) = &self.phone_number {
            validate_phone_number(phone_number)?;
        }
        Ok(())
    }
}

impl Validate for CreateDishRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_dish_name(&self.name)?;
        validate_ingredients(&self.ingredients)?;
        validate_price(&self.price)?;
        validate_weight(&self.weight)?;
        Ok(())
    }
}

impl Validate for UpdateDishRequest {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name {
            validate_dish_name(name)?;
        }
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        if let Some(price) = &self.price {
            validate_price(price)?;
        }
        if let Some(weight) = &self.weight {
            validate_weight(weight)?;
        }
        Ok(())
    }
}

impl Validate for CreateRestaurantRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_address(&self.address)
    }
}

impl Validate for UpdateRestaurantRequest {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(address) = &self.address {
            validate_address(address)?;
        }
        Ok(())
    }
}

impl Validate for AddCartItemRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id("dish_id", &self.dish_id, 'D')?;
        validate_cart_quantity(self.quantity)?;
        Ok(())
    }
}

impl Validate for UpdateCartItemRequest {
    fn validate(&self) -> ValidationResult<()> {
        // zero is accepted here and removes the line
        if self.quantity > MAX_CART_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: "0".to_string(),
                max: MAX_CART_QUANTITY.to_string(),
                value: self.quantity.to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> ValidationResult<()> {
        match self.restaurant_id.as_deref().map(str::trim) {
            Some(restaurant_id) if !restaurant_id.is_empty() => {
                validate_entity_id("restaurant_id", restaurant_id, 'R')
            }
            _ => Err(ValidationError::RequiredField {
                field: "restaurant_id".to_string(),
            }),
        }
    }
}

fn check_length(field: &str, value: &str, max_length: usize) -> ValidationResult<()> {
    let length = value.chars().count();
    if length > max_length {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length,
            actual_length: length,
        });
    }
    Ok(())
}

fn check_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn check_decimal_range(
    field: &str,
    value: &Decimal,
    min: Decimal,
    max: Decimal,
) -> ValidationResult<()> {
    if *value < min || *value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            value: value.to_string(),
        });
    }

    if value.normalize().scale() > 2 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Cannot have more than 2 decimal places".to_string(),
        });
    }

    Ok(())
}

/// Letters, digits and `@.+-_`, at most 150 characters
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let trimmed = username.trim();
    check_required("username", trimmed)?;
    check_length("username", trimmed, MAX_USERNAME_LENGTH)?;

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            expected: "Letters, digits and @/./+/-/_ only".to_string(),
        });
    }

    Ok(())
}

pub fn validate_person_name(field: &str, name: &str) -> ValidationResult<()> {
    check_length(field, name.trim(), MAX_PERSON_NAME_LENGTH)
}

/// Optional; when present it must look like an address
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|email| !email.is_empty()) else {
        return Ok(());
    };

    check_length("email", email, MAX_EMAIL_LENGTH)?;

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            expected: "local@domain".to_string(),
        }),
    }
}

/// Optional leading `+`, then digits; 9 to 13 characters overall
pub fn validate_phone_number(phone_number: &str) -> ValidationResult<()> {
    let trimmed = phone_number.trim();
    check_required("phone_number", trimmed)?;

    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let well_formed = (MIN_PHONE_LENGTH..=MAX_PHONE_LENGTH).contains(&trimmed.len())
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit());

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            expected: "9 to 13 characters: optional '+' followed by digits".to_string(),
        });
    }

    Ok(())
}

pub fn validate_dish_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();
    check_required("dish_name", trimmed)?;
    check_length("dish_name", trimmed, MAX_DISH_NAME_LENGTH)?;

    if trimmed
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(ValidationError::InvalidValue {
            field: "dish_name".to_string(),
            value: name.to_string(),
            reason: "Contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

pub fn validate_ingredients(ingredients: &str) -> ValidationResult<()> {
    let trimmed = ingredients.trim();
    check_required("ingredients", trimmed)?;
    check_length("ingredients", trimmed, MAX_INGREDIENTS_LENGTH)
}

pub fn validate_price(price: &Decimal) -> ValidationResult<()> {
    check_decimal_range("price", price, MIN_PRICE, MAX_PRICE)
}

/// Portion weight in grams
pub fn validate_weight(weight: &Decimal) -> ValidationResult<()> {
    check_decimal_range("weight", weight, MIN_WEIGHT, MAX_WEIGHT)
}

pub fn validate_address(address: &str) -> ValidationResult<()> {
    let trimmed = address.trim();
    check_required("address", trimmed)?;
    check_length("address", trimmed, MAX_ADDRESS_LENGTH)
}

/// Validate cart item quantity
pub fn validate_cart_quantity(quantity: u32) -> ValidationResult<()> {
    if !(MIN_CART_QUANTITY..=MAX_CART_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: MIN_CART_QUANTITY.to_string(),
            max: MAX_CART_QUANTITY.to_string(),
            value: quantity.to_string(),
        });
    }

    Ok(())
}

/// Identifier of the form `<prefix><alphanumerics>`
pub fn validate_entity_id(field: &str, id: &str, prefix: char) -> ValidationResult<()> {
    let trimmed = id.trim();
    check_required(field, trimmed)?;

    let well_formed = trimmed.starts_with(prefix)
        && trimmed.len() > 1
        && trimmed[prefix.len_utf8()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric());

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            expected: format!("{} followed by alphanumeric characters", prefix),
        });
    }

    check_length(field, trimmed, 64)
}

/// Validate user ID format
pub fn validate_user_id(user_id: &str) -> ValidationResult<()> {
    validate_entity_id("user_id", user_id, 'U')
}
