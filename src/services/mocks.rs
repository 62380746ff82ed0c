//! mockall doubles of the repository traits, shared by the service tests

use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;

use crate::models::{
    Cart, CartStatus, Dish, DishFilters, Order, OrderFilters, RepositoryResult, Restaurant, User,
};
use crate::repositories::{
    CartRepository, DishRepository, OrderRepository, RestaurantRepository, UserRepository,
};

mock! {
    pub TestDishRepository {}

    #[async_trait]
    impl DishRepository for TestDishRepository {
        async fn find_all(&self, filters: DishFilters) -> RepositoryResult<Vec<Dish>>;
        async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Dish>>;
        async fn find_many(&self, ids: &[String]) -> RepositoryResult<HashMap<String, Dish>>;
        async fn create(&self, dish: Dish) -> RepositoryResult<Dish>;
        async fn update(&self, dish: Dish) -> RepositoryResult<Dish>;
        async fn delete(&self, id: &str) -> RepositoryResult<()>;
        async fn count(&self) -> RepositoryResult<usize>;
    }
}

mock! {
    pub TestRestaurantRepository {}

    #[async_trait]
    impl RestaurantRepository for TestRestaurantRepository {
        async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<Restaurant>>;
        async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>>;
        async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;
        async fn update(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;
        async fn delete(&self, id: &str) -> RepositoryResult<()>;
        async fn count(&self) -> RepositoryResult<usize>;
    }
}

mock! {
    pub TestUserRepository {}

    #[async_trait]
    impl UserRepository for TestUserRepository {
        async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<User>>;
        async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;
        async fn create(&self, user: User) -> RepositoryResult<User>;
        async fn update(&self, previous: &User, user: User) -> RepositoryResult<User>;
        async fn delete(&self, user: &User) -> RepositoryResult<()>;
        async fn count(&self) -> RepositoryResult<usize>;
    }
}

mock! {
    pub TestCartRepository {}

    #[async_trait]
    impl CartRepository for TestCartRepository {
        async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Cart>>;
        async fn find_draft_cart(&self, user_id: &str) -> RepositoryResult<Option<Cart>>;
        async fn create_draft_cart(&self, cart: Cart) -> RepositoryResult<Cart>;
        async fn save_cart(&self, cart: Cart) -> RepositoryResult<Cart>;
        async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Cart>>;
        async fn find_all(&self, status: Option<CartStatus>) -> RepositoryResult<Vec<Cart>>;
        async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize>;
        async fn count(&self, status: Option<CartStatus>) -> RepositoryResult<usize>;
    }
}

mock! {
    pub TestOrderRepository {}

    #[async_trait]
    impl OrderRepository for TestOrderRepository {
        async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>>;
        async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>>;
        async fn find_all(&self, filters: OrderFilters) -> RepositoryResult<Vec<Order>>;
        async fn place_order(&self, order: &Order, cart: &Cart) -> RepositoryResult<()>;
        async fn detach_restaurant(&self, restaurant_id: &str) -> RepositoryResult<usize>;
        async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize>;
        async fn count(&self) -> RepositoryResult<usize>;
    }
}
