pub mod cart_service;
pub mod dish_service;
pub mod order_service;
pub mod restaurant_service;
pub mod user_service;

#[cfg(test)]
pub(crate) mod mocks;

pub use cart_service::CartService;
pub use dish_service::DishService;
pub use order_service::{OrderRepositories, OrderService};
pub use restaurant_service::RestaurantService;
pub use user_service::UserService;
