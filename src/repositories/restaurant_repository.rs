use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamo::{self, DynamoTable, Item};
use crate::models::{Restaurant, RepositoryResult};

const KEY: &str = "restaurant_id";

/// Trait defining the interface for restaurant data access operations
#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    /// Find all restaurants whose address contains the search term, ordered by address
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<Restaurant>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>>;

    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;

    async fn update(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant>;

    async fn delete(&self, id: &str) -> RepositoryResult<()>;

    async fn count(&self) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the RestaurantRepository trait
pub struct DynamoDbRestaurantRepository {
    table: DynamoTable,
}

impl DynamoDbRestaurantRepository {
    pub fn new(
        client: Arc<aws_sdk_dynamodb::Client>,
        table_name: String,
        region: String,
    ) -> Self {
        Self {
            table: DynamoTable::new(client, table_name, region),
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.table_name()
    }

    pub fn restaurant_to_item(&self, restaurant: &Restaurant) -> Item {
        HashMap::from([
            (KEY.to_string(), dynamo::s(&restaurant.id)),
            ("address".to_string(), dynamo::s(&restaurant.address)),
            (
                "created_at".to_string(),
                dynamo::s(restaurant.created_at.to_rfc3339()),
            ),
            (
                "updated_at".to_string(),
                dynamo::s(restaurant.updated_at.to_rfc3339()),
            ),
        ])
    }

    pub fn item_to_restaurant(&self, item: Item) -> RepositoryResult<Restaurant> {
        let created_at = dynamo::get_datetime(&item, "created_at")?;

        Ok(Restaurant {
            id: dynamo::get_s(&item, KEY)?,
            address: dynamo::get_s(&item, "address")?,
            created_at,
            updated_at: dynamo::get_opt_datetime(&item, "updated_at").unwrap_or(created_at),
        })
    }
}

#[async_trait]
impl RestaurantRepository for DynamoDbRestaurantRepository {
    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<Restaurant>> {
        info!("Finding restaurants");

        let items = self.table.scan_items(None).await?;

        let mut restaurants: Vec<Restaurant> =
            dynamo::parse_items(items, "restaurant", |item| self.item_to_restaurant(item))
                .into_iter()
                .filter(|restaurant| restaurant.matches_search(search.as_deref()))
                .collect();
        restaurants.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.id.cmp(&b.id)));

        info!("Found {} restaurants", restaurants.len());
        Ok(restaurants)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Restaurant>> {
        match self.table.get_item(KEY, id).await? {
            Some(item) => Ok(Some(self.item_to_restaurant(item)?)),
            None => {
                info!("Restaurant not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, restaurant), fields(table = %self.table.table_name(), id = %restaurant.id))]
    async fn create(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        info!("Creating restaurant");
        self.table
            .put_new_item(KEY, self.restaurant_to_item(&restaurant))
            .await?;
        Ok(restaurant)
    }

    #[instrument(skip(self, restaurant), fields(table = %self.table.table_name(), id = %restaurant.id))]
    async fn update(&self, restaurant: Restaurant) -> RepositoryResult<Restaurant> {
        info!("Updating restaurant");
        self.table
            .replace_item(KEY, self.restaurant_to_item(&restaurant))
            .await?;
        Ok(restaurant)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), id = %id))]
    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        info!("Deleting restaurant");
        self.table.delete_item(KEY, id).await
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn count(&self) -> RepositoryResult<usize> {
        self.table.count_items(None).await
    }
}
