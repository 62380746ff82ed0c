pub mod admin;
pub mod api;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use admin::{create_admin_router, AdminState};
pub use api::{create_api_router, ApiState};
pub use errors::{service_error_to_response, ApiError};
pub use health::*;
pub use metrics::*;
pub use middleware::*;
