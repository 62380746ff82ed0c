// Repositories module - data access layer

pub mod cart_repository;
pub mod dish_repository;
pub mod dynamo;
pub mod order_repository;
pub mod restaurant_repository;
pub mod table_manager;
pub mod user_repository;


pub use cart_repository::{CartRepository, DynamoDbCartRepository};
pub use dish_repository::{DishRepository, DynamoDbDishRepository};
pub use order_repository::{DynamoDbOrderRepository, OrderRepository};
pub use restaurant_repository::{DynamoDbRestaurantRepository, RestaurantRepository};
pub use table_manager::TableManager;
pub use user_repository::{DynamoDbUserRepository, UserRepository};
