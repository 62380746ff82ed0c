#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use cafeteria_rs::config::{DatabaseConfig, PaginationConfig, ServerConfig};
use cafeteria_rs::models::{
    Cart, CartStatus, Dish, DishFilters, Order, OrderFilters, RepositoryError, RepositoryResult,
    Restaurant, User,
};
use cafeteria_rs::repositories::{
    CartRepository, DishRepository, OrderRepository, RestaurantRepository, TableManager,
    UserRepository,
};
use cafeteria_rs::{create_app, AppSettings, Metrics, Repositories};

/// All five tables in memory, with the same conditional-write rules as DynamoDB
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, User>>,
    dishes: Mutex<HashMap<String, Dish>>,
    restaurants: Mutex<HashMap<String, Restaurant>>,
    carts: Mutex<HashMap<String, Cart>>,
    orders: Mutex<HashMap<String, Order>>,
    /// Makes the next checkout transaction fail
    pub fail_checkout: AtomicBool,
}

impl InMemoryStore {
    pub fn carts_of(&self, user_id: &str) -> Vec<Cart> {
        self.carts
            .lock()
            .unwrap()
            .values()
            .filter(|cart| cart.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn orders_of(&self, user_id: &str) -> Vec<Order> {
        self.orders
            .lock()
            .unwrap()
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn all_orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<User>> {
        let search = search.map(|term| term.to_lowercase());
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| match &search {
                Some(term) => user.username.to_lowercase().contains(term),
                None => true,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn create(&self, user: User) -> RepositoryResult<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(field) = taken_field(&users, &user) {
            return Err(RepositoryError::DuplicateKey { field });
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update(&self, _previous: &User, user: User) -> RepositoryResult<User> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(field) = taken_field(&users, &user) {
            return Err(RepositoryError::DuplicateKey { field });
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn delete(&self, user: &User) -> RepositoryResult<()> {
        self.users.lock().unwrap().remove(&user.id);
        Ok(())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.users.lock().unwrap().len())
    }
}

fn taken_field(users: &HashMap<String, User>, user: &User) -> Option<String> {
    let others = users.values().filter(|other| other.id != user.id);
    for other in others {
        if other.phone_number == user.phone_number {
            return Some("phone_number".to_string());
        }
        if other.username == user.username {
            return Some("username".to_string());
        }
    }
    None
}

#[async_trait]
impl DishRepository for InMemoryStore {
    async fn find_all(&self, filters: DishFilters) -> RepositoryResult<Vec<Dish>> {
        let mut dishes: Vec<Dish> = self
            .dishes
            .lock()
            .unwrap()
            .values()
            .filter(|dish| dish.matches_filters(&filters))
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(dishes)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Dish>> {
        Ok(self.dishes.lock().unwrap().get(id).cloned())
    }

    async fn find_many(&self, ids: &[String]) -> RepositoryResult<HashMap<String, Dish>> {
        let dishes = self.dishes.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| dishes.get(id).map(|dish| (id.clone(), dish.clone())))
            .collect())
    }

    async fn create(&self, dish: Dish) -> RepositoryResult<Dish> {
        self.dishes
            .lock()
            .unwrap()
            .insert(dish.id.clone(), dish.clone());
        Ok(dish)
    }

    async fn update(&self, dish: Dish) -> RepositoryResult<Dish> {
        let mut dishes = self.dishes.lock().unwrap();
        if !dishes.contains_key(&dish.id) {
            return Err(RepositoryError::NotFound);
        }
        dishes.insert(dish.id.clone(), dish.clone());
        Ok(dish)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.dishes.lock().unwrap().remove(id);
        Ok(())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.dishes.lock().unwrap().len())
    }
}

#[async_trait]
impl RestaurantRepository for InMemoryStore {
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<Restaurant>> {
        let mut restaurants: Vec<Restaurant> = self
            .restaurants
            .lock()
            .unwrap()
            .values()
            .filter(|restaurant| restaurant.matches_search(search.as_deref()))
            .cloned()
            .collect();
        restaurants.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.id.cmp(&b.id)));
        Ok(restaurants)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>> {
        Ok(self.restaurants.lock().unwrap().get(id).cloned())
    }

    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        self.restaurants
            .lock()
            .unwrap()
            .insert(restaurant.id.clone(), restaurant.clone());
        Ok(restaurant)
    }

    async fn update(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        let mut restaurants = self.restaurants.lock().unwrap();
        if !restaurants.contains_key(&restaurant.id) {
            return Err(RepositoryError::NotFound);
        }
        restaurants.insert(restaurant.id.clone(), restaurant.clone());
        Ok(restaurant)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.restaurants.lock().unwrap().remove(id);
        Ok(())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.restaurants.lock().unwrap().len())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Cart>> {
        Ok(self.carts.lock().unwrap().get(id).cloned())
    }

    async fn find_draft_cart(&self, user_id: &str) -> RepositoryResult<Option<Cart>> {
        Ok(self
            .carts
            .lock()
            .unwrap()
            .values()
            .find(|cart| cart.user_id == user_id && cart.is_draft())
            .cloned())
    }

    async fn create_draft_cart(&self, cart: Cart) -> RepositoryResult<Cart> {
        let mut carts = self.carts.lock().unwrap();
        if carts
            .values()
            .any(|other| other.user_id == cart.user_id && other.is_draft())
        {
            return Err(RepositoryError::DuplicateKey {
                field: "draft_cart".to_string(),
            });
        }
        carts.insert(cart.id.clone(), cart.clone());
        Ok(cart)
    }

    async fn save_cart(&self, mut cart: Cart) -> RepositoryResult<Cart> {
        let mut carts = self.carts.lock().unwrap();
        match carts.get(&cart.id) {
            Some(stored) if stored.is_draft() && stored.version == cart.version => {
                cart.version += 1;
                carts.insert(cart.id.clone(), cart.clone());
                Ok(cart)
            }
            _ => Err(RepositoryError::ConstraintViolation {
                message: format!("Cart {} is not a draft or changed since it was read", cart.id),
            }),
        }
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Cart>> {
        let mut carts = self.carts_of(user_id);
        carts.sort_by_key(|cart| cart.created_at);
        Ok(carts)
    }

    async fn find_all(&self, status: Option<CartStatus>) -> RepositoryResult<Vec<Cart>> {
        let mut carts: Vec<Cart> = self
            .carts
            .lock()
            .unwrap()
            .values()
            .filter(|cart| status.map_or(true, |status| cart.status == status))
            .cloned()
            .collect();
        carts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(carts)
    }

    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize> {
        let mut carts = self.carts.lock().unwrap();
        let before = carts.len();
        carts.retain(|_, cart| cart.user_id != user_id);
        Ok(before - carts.len())
    }

    async fn count(&self, status: Option<CartStatus>) -> RepositoryResult<usize> {
        Ok(CartRepository::find_all(self, status).await?.len())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>> {
        let mut orders = self.orders_of(user_id);
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn find_all(&self, filters: OrderFilters) -> RepositoryResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .all_orders()
            .into_iter()
            .filter(|order| order.matches_filters(&filters))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn place_order(&self, order: &Order, cart: &Cart) -> RepositoryResult<()> {
        if self.fail_checkout.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::TransactionFailed {
                message: "TransactionCanceledException".to_string(),
            });
        }

        // Lock both tables so the two writes land together or not at all
        let mut carts = self.carts.lock().unwrap();
        let mut orders = self.orders.lock().unwrap();

        let unchanged_draft = carts
            .get(&cart.id)
            .map_or(false, |stored| stored.is_draft() && stored.version == cart.version);
        if !unchanged_draft || orders.contains_key(&order.id) {
            return Err(RepositoryError::TransactionFailed {
                message: "ConditionalCheckFailed".to_string(),
            });
        }

        let mut completed = cart.clone();
        completed.version += 1;
        orders.insert(order.id.clone(), order.clone());
        carts.insert(cart.id.clone(), completed);
        Ok(())
    }

    async fn detach_restaurant(&self, restaurant_id: &str) -> RepositoryResult<usize> {
        let mut orders = self.orders.lock().unwrap();
        let mut detached = 0;
        for order in orders.values_mut() {
            if order.restaurant_id.as_deref() == Some(restaurant_id) {
                order.restaurant_id = None;
                detached += 1;
            }
        }
        Ok(detached)
    }

    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize> {
        let mut orders = self.orders.lock().unwrap();
        let before = orders.len();
        orders.retain(|_, order| order.user_id != user_id);
        Ok(before - orders.len())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.orders.lock().unwrap().len())
    }
}

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
}

impl TestEnvironment {
    /// Serve the real router over in-memory storage on a random local port
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::default());
        let repositories = Repositories {
            users: store.clone(),
            dishes: store.clone(),
            restaurants: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
        };

        // Never contacted: setup-tables is not exercised against the in-memory store
        let dynamodb_config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let table_manager = Arc::new(TableManager::new(Arc::new(
            aws_sdk_dynamodb::Client::from_conf(dynamodb_config),
        )));

        let app = create_app(
            repositories,
            table_manager,
            Arc::new(Metrics::new().expect("Failed to create metrics")),
            AppSettings {
                server: ServerConfig::default(),
                pagination: PaginationConfig::default(),
                database: DatabaseConfig::default(),
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_user(&self, username: &str, phone_number: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/admin/users"))
            .json(&json!({
                "username": username,
                "first_name": "Test",
                "last_name": "User",
                "phone_number": phone_number,
            }))
            .send()
            .await
            .expect("Failed to create user");
        assert_eq!(response.status().as_u16(), 201);
        id_of(response).await
    }

    pub async fn create_dish(&self, name: &str, price: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/admin/dishes"))
            .json(&json!({
                "name": name,
                "ingredients": "test ingredients",
                "price": price,
                "weight": "250",
            }))
            .send()
            .await
            .expect("Failed to create dish");
        assert_eq!(response.status().as_u16(), 201);
        id_of(response).await
    }

    pub async fn create_restaurant(&self, address: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/admin/restaurants"))
            .json(&json!({ "address": address }))
            .send()
            .await
            .expect("Failed to create restaurant");
        assert_eq!(response.status().as_u16(), 201);
        id_of(response).await
    }

    pub async fn add_to_cart(&self, user_id: &str, dish_id: &str, quantity: u32) -> Value {
        let response = self
            .client
            .post(self.url(&format!("/api/cart/{}/items", user_id)))
            .json(&json!({ "dish_id": dish_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to add item");
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse cart")
    }

    pub async fn checkout(&self, user_id: &str, restaurant_id: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/cart/{}/checkout", user_id)))
            .json(&json!({ "restaurant_id": restaurant_id }))
            .send()
            .await
            .expect("Failed to checkout")
    }
}

async fn id_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"]
        .as_str()
        .expect("Response has no id")
        .to_string()
}
