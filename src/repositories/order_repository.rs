use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Error as DynamoDbError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

use super::cart_repository::{self, draft_lock_key};
use super::dynamo::{self, DynamoTable, Item, ScanFilter};
use crate::models::{
    Cart, Order, OrderFilters, OrderLine, RepositoryError, RepositoryResult,
};

const KEY: &str = "order_id";

/// Trait defining the interface for order data access operations
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>>;

    /// Orders of one user, oldest first
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>>;

    /// Orders matching the filters, oldest first
    async fn find_all(&self, filters: OrderFilters) -> RepositoryResult<Vec<Order>>;

    /// Atomically store the order, mark its cart completed and release the
    /// user's draft reservation. Nothing is written if any step fails.
    async fn place_order(&self, order: &Order, cart: &Cart) -> RepositoryResult<()>;

    /// Clear the restaurant reference of every order placed at it
    async fn detach_restaurant(&self, restaurant_id: &str) -> RepositoryResult<usize>;

    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize>;

    async fn count(&self) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the OrderRepository trait
pub struct DynamoDbOrderRepository {
    table: DynamoTable,
    carts: DynamoTable,
}

impl DynamoDbOrderRepository {
    pub fn new(
        client: Arc<aws_sdk_dynamodb::Client>,
        table_name: String,
        carts_table_name: String,
        region: String,
    ) -> Self {
        Self {
            table: DynamoTable::new(client.clone(), table_name, region.clone()),
            carts: DynamoTable::new(client, carts_table_name, region),
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.table_name()
    }

    pub fn order_to_item(&self, order: &Order) -> Item {
        let lines = order
            .lines
            .iter()
            .map(|line| {
                AttributeValue::M(HashMap::from([
                    ("dish_id".to_string(), dynamo::s(&line.dish_id)),
                    ("dish_name".to_string(), dynamo::s(&line.dish_name)),
                    ("quantity".to_string(), dynamo::n(line.quantity)),
                    ("unit_price".to_string(), dynamo::n(line.unit_price)),
                ]))
            })
            .collect();

        let mut item = HashMap::from([
            (KEY.to_string(), dynamo::s(&order.id)),
            ("user_id".to_string(), dynamo::s(&order.user_id)),
            ("cart_id".to_string(), dynamo::s(&order.cart_id)),
            ("lines".to_string(), AttributeValue::L(lines)),
            ("total_price".to_string(), dynamo::n(order.total_price)),
            ("created_at".to_string(), dynamo::s(order.created_at.to_rfc3339())),
        ]);

        if let Some(restaurant_id) = &order.restaurant_id {
            item.insert("restaurant_id".to_string(), dynamo::s(restaurant_id));
        }

        item
    }

    pub fn item_to_order(&self, item: Item) -> RepositoryResult<Order> {
        let lines = dynamo::get_list(&item, "lines")
            .iter()
            .map(|value| {
                let map = value.as_m().map_err(|_| RepositoryError::InvalidItem {
                    message: "Order line is not a map".to_string(),
                })?;
                Ok(OrderLine {
                    dish_id: dynamo::get_s(map, "dish_id")?,
                    dish_name: dynamo::get_opt_s(map, "dish_name").unwrap_or_default(),
                    quantity: dynamo::get_u32(map, "quantity")?,
                    unit_price: dynamo::get_decimal(map, "unit_price")?,
                })
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Order {
            id: dynamo::get_s(&item, KEY)?,
            user_id: dynamo::get_s(&item, "user_id")?,
            restaurant_id: dynamo::get_opt_s(&item, "restaurant_id"),
            cart_id: dynamo::get_s(&item, "cart_id")?,
            lines,
            total_price: dynamo::get_decimal(&item, "total_price")?,
            created_at: dynamo::get_datetime(&item, "created_at")?,
        })
    }

    fn checkout_items(&self, order: &Order, cart: &Cart) -> RepositoryResult<Vec<TransactWriteItem>> {
        let put_order = Put::builder()
            .table_name(self.table.table_name())
            .set_item(Some(self.order_to_item(order)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", KEY)
            .build()
            .map_err(dynamo::build_error)?;

        // Fails if the cart changed after checkout read it, so the order
        // never drops lines added in between
        let complete_cart = cart_repository::put_if_unchanged(self.carts.table_name(), cart)?;

        let release_draft = Delete::builder()
            .table_name(self.carts.table_name())
            .set_key(Some(dynamo::key(
                cart_repository::KEY,
                &draft_lock_key(&cart.user_id),
            )))
            .condition_expression("draft_cart_id = :cart_id")
            .expression_attribute_values(":cart_id", dynamo::s(&cart.id))
            .build()
            .map_err(dynamo::build_error)?;

        Ok(vec![
            TransactWriteItem::builder().put(put_order).build(),
            TransactWriteItem::builder().put(complete_cart).build(),
            TransactWriteItem::builder().delete(release_draft).build(),
        ])
    }

    fn sort_oldest_first(orders: &mut [Order]) {
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    }
}

#[async_trait]
impl OrderRepository for DynamoDbOrderRepository {
    #[instrument(skip(self), fields(table = %self.table.table_name(), order_id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Order>> {
        match self.table.get_item(KEY, id).await? {
            Some(item) => Ok(Some(self.item_to_order(item)?)),
            None => {
                info!("Order not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Order>> {
        let filter = ScanFilter::new("user_id = :user_id").value(":user_id", dynamo::s(user_id));

        let items = self.table.scan_items(Some(filter)).await?;
        let mut orders = dynamo::parse_items(items, "order", |item| self.item_to_order(item));
        Self::sort_oldest_first(&mut orders);

        info!("Found {} orders", orders.len());
        Ok(orders)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn find_all(&self, filters: OrderFilters) -> RepositoryResult<Vec<Order>> {
        let items = self.table.scan_items(None).await?;

        let mut orders: Vec<Order> =
            dynamo::parse_items(items, "order", |item| self.item_to_order(item))
                .into_iter()
                .filter(|order| order.matches_filters(&filters))
                .collect();
        Self::sort_oldest_first(&mut orders);

        info!("Found {} orders", orders.len());
        Ok(orders)
    }

    #[instrument(skip(self, order, cart), fields(table = %self.table.table_name(), order_id = %order.id, cart_id = %cart.id))]
    async fn place_order(&self, order: &Order, cart: &Cart) -> RepositoryResult<()> {
        info!("Placing order");

        let items = self.checkout_items(order, cart)?;

        let span = self.table.span("TransactWriteItems");
        let result = async {
            self.table
                .client()
                .transact_write_items()
                .set_transact_items(Some(items))
                .send()
                .await
        }
        .instrument(span)
        .await;

        if let Err(e) = result {
            let error: DynamoDbError = e.into();
            error!(
                "Checkout transaction rolled back, cancellation codes: {:?}",
                dynamo::cancellation_codes(&error)
            );
            return Err(self.table.map_error(error));
        }

        info!("Order placed successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), restaurant_id = %restaurant_id))]
    async fn detach_restaurant(&self, restaurant_id: &str) -> RepositoryResult<usize> {
        let filter = ScanFilter::new("restaurant_id = :restaurant_id")
            .value(":restaurant_id", dynamo::s(restaurant_id));
        let items = self.table.scan_items(Some(filter)).await?;

        let mut detached = 0;
        for item in items {
            let order_id = dynamo::get_s(&item, KEY)?;
            let span = self.table.span("UpdateItem");

            async {
                self.table
                    .client()
                    .update_item()
                    .table_name(self.table.table_name())
                    .key(KEY, dynamo::s(&order_id))
                    .update_expression("REMOVE restaurant_id")
                    .condition_expression("attribute_exists(#pk)")
                    .expression_attribute_names("#pk", KEY)
                    .send()
                    .await
                    .map_err(|e| self.table.map_error(e.into()))
            }
            .instrument(span)
            .await?;

            detached += 1;
        }

        info!("Detached restaurant from {} orders", detached);
        Ok(detached)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), user_id = %user_id))]
    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize> {
        let orders = self.find_by_user(user_id).await?;

        for order in &orders {
            self.table.delete_item(KEY, &order.id).await?;
        }

        info!("Deleted {} orders", orders.len());
        Ok(orders.len())
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn count(&self) -> RepositoryResult<usize> {
        self.table.count_items(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_repo() -> DynamoDbOrderRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        DynamoDbOrderRepository::new(
            client,
            "test-orders".to_string(),
            "test-carts".to_string(),
            "us-east-1".to_string(),
        )
    }

    fn create_test_order(restaurant_id: Option<&str>) -> Order {
        Order::new(
            "U1234abcd".to_string(),
            restaurant_id.map(str::to_string),
            "Cabc".to_string(),
            vec![OrderLine {
                dish_id: "D1".to_string(),
                dish_name: "Borscht".to_string(),
                quantity: 2,
                unit_price: dec!(10.99),
            }],
            dec!(21.98),
        )
    }

    #[test]
    fn test_order_item_conversion() {
        let repo = create_repo();
        let order = create_test_order(Some("R1234abcd"));

        let converted = repo.item_to_order(repo.order_to_item(&order)).unwrap();
        assert_eq!(converted, order);
    }

    #[test]
    fn test_order_without_restaurant() {
        let repo = create_repo();
        let order = create_test_order(None);

        let item = repo.order_to_item(&order);
        assert!(!item.contains_key("restaurant_id"));
        assert_eq!(repo.item_to_order(item).unwrap().restaurant_id, None);
    }

    #[test]
    fn test_checkout_transaction_has_three_writes() {
        let repo = create_repo();
        let mut cart = Cart::new("U1234abcd".to_string());
        let order = cart.create_order(None).unwrap();

        let items = repo.checkout_items(&order, &cart).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].put().is_some());
        assert!(items[1].put().is_some());
        assert!(items[2].delete().is_some());
    }
}
