use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Dish not found: {id}")]
    DishNotFound { id: String },

    #[error("Restaurant not found: {id}")]
    RestaurantNotFound { id: String },

    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    #[error("Cart {cart_id} is not a draft")]
    CartNotDraft { cart_id: String },

    #[error("Cart {cart_id} was changed by another request, reload it and try again")]
    CartModified { cart_id: String },

    #[error("Your cart is empty")]
    EmptyCart { user_id: String },

    #[error("Order could not be created, please try again: {message}")]
    OrderCreationFailed { message: String },

    #[error("A user with this {field} already exists")]
    DuplicateUser { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid page: {page}")]
    InvalidPage { page: u32 },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Duplicate value for unique field: {field}")]
    DuplicateKey { field: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid stored item: {message}")]
    InvalidItem { message: String },

    #[error("Transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Invalid field value: {field}={value}, reason={reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Invalid format: {field}, expected={expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("Value out of range: {field}, min={min}, max={max}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
