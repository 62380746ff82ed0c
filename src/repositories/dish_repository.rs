use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use super::dynamo::{self, DynamoTable, Item, ScanFilter};
use crate::models::{Dish, DishFilters, RepositoryResult};

const KEY: &str = "dish_id";

/// Trait defining the interface for menu data access operations
#[async_trait]
pub trait DishRepository: Send + Sync {
    /// Find all dishes matching the filters, ordered by name
    async fn find_all(&self, filters: DishFilters) -> RepositoryResult<Vec<Dish>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Dish>>;

    /// Fetch several dishes at once, keyed by id; unknown ids are absent
    async fn find_many(&self, ids: &[String]) -> RepositoryResult<HashMap<String, Dish>>;

    async fn create(&self, dish: Dish) -> RepositoryResult<Dish>;

    async fn update(&self, dish: Dish) -> RepositoryResult<Dish>;

    async fn delete(&self, id: &str) -> RepositoryResult<()>;

    async fn count(&self) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the DishRepository trait
pub struct DynamoDbDishRepository {
    table: DynamoTable,
}

impl DynamoDbDishRepository {
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

    /// Convert a Dish struct to DynamoDB attribute values
    pub fn dish_to_item(&self, dish: &Dish) -> Item {
        HashMap::from([
            (KEY.to_string(), dynamo::s(&dish.id)),
            ("name".to_string(), dynamo::s(&dish.name)),
            ("ingredients".to_string(), dynamo::s(&dish.ingredients)),
            ("price".to_string(), dynamo::n(dish.price)),
            ("weight".to_string(), dynamo::n(dish.weight)),
            ("created_at".to_string(), dynamo::s(dish.created_at.to_rfc3339())),
            ("updated_at".to_string(), dynamo::s(dish.updated_at.to_rfc3339())),
        ])
    }

    /// Convert DynamoDB item to Dish struct
    pub fn item_to_dish(&self, item: Item) -> RepositoryResult<Dish> {
        let created_at = dynamo::get_datetime(&item, "created_at")?;

        Ok(Dish {
            id: dynamo::get_s(&item, KEY)?,
            name: dynamo::get_s(&item, "name")?,
            ingredients: dynamo::get_s(&item, "ingredients")?,
            price: dynamo::get_decimal(&item, "price")?,
            weight: dynamo::get_decimal(&item, "weight")?,
            created_at,
            updated_at: dynamo::get_opt_datetime(&item, "updated_at").unwrap_or(created_at),
        })
    }

    fn price_filter(filters: &DishFilters) -> Option<ScanFilter> {
        let mut expressions = Vec::new();
        let mut values = Vec::new();

        if let Some(min_price) = filters.min_price {
            expressions.push("price >= :min_price");
            values.push((":min_price", dynamo::n(min_price)));
        }

        if let Some(max_price) = filters.max_price {
            expressions.push("price <= :max_price");
            values.push((":max_price", dynamo::n(max_price)));
        }

        if expressions.is_empty() {
            return None;
        }

        Some(
            values
                .into_iter()
                .fold(ScanFilter::new(expressions.join(" AND ")), |filter, (k, v)| {
                    filter.value(k, v)
                }),
        )
    }
}

#[async_trait]
impl DishRepository for DynamoDbDishRepository {
    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn find_all(&self, filters: DishFilters) -> RepositoryResult<Vec<Dish>> {
        info!("Finding dishes with filters");

        let items = self.table.scan_items(Self::price_filter(&filters)).await?;

        // name search is case-insensitive, which DynamoDB `contains` is not
        let mut dishes: Vec<Dish> = dynamo::parse_items(items, "dish", |item| self.item_to_dish(item))
            .into_iter()
            .filter(|dish| dish.matches_filters(&filters))
            .collect();
        dishes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        info!("Found {} dishes", dishes.len());
        Ok(dishes)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Dish>> {
        info!("Finding dish by ID");

        match self.table.get_item(KEY, id).await? {
            Some(item) => Ok(Some(self.item_to_dish(item)?)),
            None => {
                info!("Dish not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, ids), fields(table = %self.table.table_name(), count = ids.len()))]
    async fn find_many(&self, ids: &[String]) -> RepositoryResult<HashMap<String, Dish>> {
        let mut dishes = HashMap::with_capacity(ids.len());

        for id in ids {
            if dishes.contains_key(id) {
                continue;
            }
            if let Some(dish) = self.find_by_id(id).await? {
                dishes.insert(id.clone(), dish);
            }
        }

        Ok(dishes)
    }

    #[instrument(skip(self, dish), fields(table = %self.table.table_name(), id = %dish.id))]
    async fn create(&self, dish: Dish) -> RepositoryResult<Dish> {
        info!("Creating dish");

        self.table
            .put_new_item(KEY, self.dish_to_item(&dish))
            .await?;

        info!("Dish created successfully");
        Ok(dish)
    }

    #[instrument(skip(self, dish), fields(table = %self.table.table_name(), id = %dish.id))]
    async fn update(&self, dish: Dish) -> RepositoryResult<Dish> {
        info!("Updating dish");

        self.table
            .replace_item(KEY, self.dish_to_item(&dish))
            .await?;

        info!("Dish updated successfully");
        Ok(dish)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), id = %id))]
    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        info!("Deleting dish");
        self.table.delete_item(KEY, id).await
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn count(&self) -> RepositoryResult<usize> {
        let count = self.table.count_items(None).await?;
        info!("Dish count: {}", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;
    use crate::models::CreateDishRequest;
    use rust_decimal_macros::dec;

    fn create_repo() -> DynamoDbDishRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        DynamoDbDishRepository::new(client, "test-dishes".to_string(), "us-east-1".to_string())
    }

    fn create_test_dish() -> Dish {
        Dish::new(CreateDishRequest {
            name: "Varenyky".to_string(),
            ingredients: "flour, potato, onion".to_string(),
            price: dec!(65.00),
            weight: dec!(300.00),
        })
    }

    #[test]
    fn test_dish_item_conversion() {
        let repo = create_repo();
        let dish = create_test_dish();

        let item = repo.dish_to_item(&dish);
        assert_eq!(item.get(KEY), Some(&AttributeValue::S(dish.id.clone())));
        assert_eq!(item.get("price"), Some(&AttributeValue::N("65.00".to_string())));

        let converted = repo.item_to_dish(item).unwrap();
        assert_eq!(converted.id, dish.id);
        assert_eq!(converted.name, dish.name);
        assert_eq!(converted.price, dish.price);
        assert_eq!(converted.weight, dish.weight);
    }

    #[test]
    fn test_missing_updated_at_falls_back_to_created_at() {
        let repo = create_repo();
        let mut item = repo.dish_to_item(&create_test_dish());
        item.remove("updated_at");

        let converted = repo.item_to_dish(item).unwrap();
        assert_eq!(converted.updated_at, converted.created_at);
    }

    #[test]
    fn test_price_filter_expression() {
        assert!(DynamoDbDishRepository::price_filter(&DishFilters::default()).is_none());

        let filter = DynamoDbDishRepository::price_filter(&DishFilters {
            min_price: Some(dec!(10)),
            max_price: Some(dec!(20)),
            ..Default::default()
        });
        assert!(filter.is_some());
    }

    #[test]
    fn test_repository_creation() {
        assert_eq!(create_repo().table_name(), "test-dishes");
    }
}
