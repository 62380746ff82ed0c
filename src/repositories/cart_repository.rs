use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::Error as DynamoDbError;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamo::{self, DynamoTable, Item, ScanFilter};
use crate::models::{Cart, CartItem, CartStatus, RepositoryError, RepositoryResult};

pub(crate) const KEY: &str = "cart_id";

/// Trait defining the interface for cart data access operations
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Cart>>;

    /// The user's current draft cart, if any
    async fn find_draft_cart(&self, user_id: &str) -> RepositoryResult<Option<Cart>>;

    /// Store a new draft cart, reserving the user's single draft slot.
    /// Fails with `DuplicateKey` when the user already has a draft.
    async fn create_draft_cart(&self, cart: Cart) -> RepositoryResult<Cart>;

    /// Persist changes to a cart that is still a draft in storage
    async fn save_cart(&self, cart: Cart) -> RepositoryResult<Cart>;

    /// All carts of a user, oldest first
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Cart>>;

    /// All carts, optionally restricted to one status, newest first
    async fn find_all(&self, status: Option<CartStatus>) -> RepositoryResult<Vec<Cart>>;

    /// Remove every cart of a user along with the draft reservation
    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize>;

    async fn count(&self, status: Option<CartStatus>) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the CartRepository trait.
///
/// The draft slot of each user is an item keyed `DRAFT#{user_id}` pointing at
/// the draft cart; it is written with the cart and released by checkout.
pub struct DynamoDbCartRepository {
    table: DynamoTable,
}

pub fn draft_lock_key(user_id: &str) -> String {
    format!("DRAFT#{}", user_id)
}

/// Convert a Cart struct to DynamoDB attribute values
pub fn cart_to_item(cart: &Cart) -> Item {
    HashMap::from([
        (KEY.to_string(), dynamo::s(&cart.id)),
        ("user_id".to_string(), dynamo::s(&cart.user_id)),
        ("status".to_string(), dynamo::s(cart.status.as_str())),
        ("items".to_string(), cart_items_attribute(&cart.items)),
        ("created_at".to_string(), dynamo::s(cart.created_at.to_rfc3339())),
        ("updated_at".to_string(), dynamo::s(cart.updated_at.to_rfc3339())),
        ("version".to_string(), dynamo::n(cart.version)),
    ])
}

const UNCHANGED_DRAFT_CONDITION: &str = "#status = :draft AND #version = :read_version";

fn next_revision_item(cart: &Cart) -> Item {
    let mut item = cart_to_item(cart);
    item.insert("version".to_string(), dynamo::n(cart.version + 1));
    item
}

/// Conditional put that replaces a draft cart only if storage still holds the
/// revision it was read at. The stored copy gets the next revision.
pub fn put_if_unchanged(table_name: &str, cart: &Cart) -> RepositoryResult<Put> {
    Put::builder()
        .table_name(table_name)
        .set_item(Some(next_revision_item(cart)))
        .condition_expression(UNCHANGED_DRAFT_CONDITION)
        .expression_attribute_names("#status", "status")
        .expression_attribute_names("#version", "version")
        .expression_attribute_values(":draft", dynamo::s(CartStatus::Draft.as_str()))
        .expression_attribute_values(":read_version", dynamo::n(cart.version))
        .build()
        .map_err(dynamo::build_error)
}

pub fn cart_items_attribute(items: &[CartItem]) -> AttributeValue {
    AttributeValue::L(
        items
            .iter()
            .map(|cart_item| {
                AttributeValue::M(HashMap::from([
                    ("dish_id".to_string(), dynamo::s(&cart_item.dish_id)),
                    ("dish_name".to_string(), dynamo::s(&cart_item.dish_name)),
                    ("quantity".to_string(), dynamo::n(cart_item.quantity)),
                    ("unit_price".to_string(), dynamo::n(cart_item.unit_price)),
                    ("added_at".to_string(), dynamo::s(cart_item.added_at.to_rfc3339())),
                ]))
            })
            .collect(),
    )
}

/// Convert DynamoDB item to Cart struct
pub fn item_to_cart(item: Item) -> RepositoryResult<Cart> {
    let status = dynamo::get_s(&item, "status")?;
    let status = CartStatus::from_str(&status).map_err(|_| RepositoryError::InvalidItem {
        message: format!("Unknown cart status: {}", status),
    })?;

    let items = dynamo::get_list(&item, "items")
        .iter()
        .filter_map(|value| match value.as_m() {
            Ok(map) => map_to_cart_item(map)
                .map_err(|e| warn!("Skipping malformed cart item: {}", e))
                .ok(),
            Err(_) => None,
        })
        .collect();

    let created_at = dynamo::get_datetime(&item, "created_at")?;

    Ok(Cart {
        id: dynamo::get_s(&item, KEY)?,
        user_id: dynamo::get_s(&item, "user_id")?,
        status,
        items,
        created_at,
        updated_at: dynamo::get_opt_datetime(&item, "updated_at").unwrap_or(created_at),
        version: dynamo::get_opt_u64(&item, "version").unwrap_or_default(),
    })
}

/// Convert DynamoDB map to CartItem
pub fn map_to_cart_item(item_map: &Item) -> RepositoryResult<CartItem> {
    Ok(CartItem {
        dish_id: dynamo::get_s(item_map, "dish_id")?,
        dish_name: dynamo::get_opt_s(item_map, "dish_name").unwrap_or_default(),
        quantity: dynamo::get_u32(item_map, "quantity")?,
        unit_price: dynamo::get_decimal(item_map, "unit_price")?,
        added_at: dynamo::get_datetime(item_map, "added_at")?,
    })
}

impl DynamoDbCartRepository {
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

    fn cart_rows_filter(status: Option<CartStatus>) -> ScanFilter {
        match status {
            Some(status) => ScanFilter::new("#status = :status")
                .name("#status", "status")
                .value(":status", dynamo::s(status.as_str())),
            None => ScanFilter::new("attribute_exists(#status)").name("#status", "status"),
        }
    }
}

#[async_trait]
impl CartRepository for DynamoDbCartRepository {
    #[instrument(skip(self), fields(table = %self.table.table_name(), cart_id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Cart>> {
        match self.table.get_item(KEY, id).await? {
            Some(item) if item.contains_key("status") => Ok(Some(item_to_cart(item)?)),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), user_id = %user_id))]
    async fn find_draft_cart(&self, user_id: &str) -> RepositoryResult<Option<Cart>> {
        info!("Finding draft cart for user");

        let Some(lock) = self.table.get_item(KEY, &draft_lock_key(user_id)).await? else {
            info!("User has no draft cart");
            return Ok(None);
        };

        let cart_id = dynamo::get_s(&lock, "draft_cart_id")?;
        match self.find_by_id(&cart_id).await? {
            Some(cart) if cart.is_draft() => {
                info!("Draft cart found with {} items", cart.items.len());
                Ok(Some(cart))
            }
            _ => {
                warn!("Draft reservation points at missing or completed cart {}", cart_id);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, cart), fields(table = %self.table.table_name(), cart_id = %cart.id, user_id = %cart.user_id))]
    async fn create_draft_cart(&self, cart: Cart) -> RepositoryResult<Cart> {
        info!("Creating draft cart");

        let lock = Put::builder()
            .table_name(self.table.table_name())
            .item(KEY, dynamo::s(draft_lock_key(&cart.user_id)))
            .item("draft_cart_id", dynamo::s(&cart.id))
            .item("user_id", dynamo::s(&cart.user_id))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", KEY)
            .build()
            .map_err(dynamo::build_error)?;

        let put_cart = Put::builder()
            .table_name(self.table.table_name())
            .set_item(Some(cart_to_item(&cart)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", KEY)
            .build()
            .map_err(dynamo::build_error)?;

        let span = self.table.span("TransactWriteItems");
        let result = async {
            self.table
                .client()
                .transact_write_items()
                .transact_items(TransactWriteItem::builder().put(lock).build())
                .transact_items(TransactWriteItem::builder().put(put_cart).build())
                .send()
                .await
        }
        .instrument(span)
        .await;

        if let Err(e) = result {
            let error: DynamoDbError = e.into();
            let codes = dynamo::cancellation_codes(&error);
            if codes.first().and_then(|code| code.as_deref()) == Some("ConditionalCheckFailed") {
                warn!("User already holds a draft cart");
                return Err(RepositoryError::DuplicateKey {
                    field: "draft_cart".to_string(),
                });
            }
            return Err(self.table.map_error(error));
        }

        info!("Draft cart created");
        Ok(cart)
    }

    #[instrument(skip(self, cart), fields(table = %self.table.table_name(), cart_id = %cart.id, item_count = cart.items.len(), version = cart.version))]
    async fn save_cart(&self, mut cart: Cart) -> RepositoryResult<Cart> {
        info!("Saving cart");

        let span = self.table.span("PutItem");
        async {
            self.table
                .client()
                .put_item()
                .table_name(self.table.table_name())
                .set_item(Some(next_revision_item(&cart)))
                .condition_expression(UNCHANGED_DRAFT_CONDITION)
                .expression_attribute_names("#status", "status")
                .expression_attribute_names("#version", "version")
                .expression_attribute_values(":draft", dynamo::s(CartStatus::Draft.as_str()))
                .expression_attribute_values(":read_version", dynamo::n(cart.version))
                .send()
                .await
                .map_err(|e| self.table.map_error(e.into()))
        }
        .instrument(span)
        .await?;

        cart.version += 1;
        info!("Cart saved successfully");
        Ok(cart)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Cart>> {
        let filter = ScanFilter::new("user_id = :user_id AND attribute_exists(#status)")
            .name("#status", "status")
            .value(":user_id", dynamo::s(user_id));

        let items = self.table.scan_items(Some(filter)).await?;
        let mut carts = dynamo::parse_items(items, "cart", item_to_cart);
        carts.sort_by_key(|cart| cart.created_at);

        Ok(carts)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn find_all(&self, status: Option<CartStatus>) -> RepositoryResult<Vec<Cart>> {
        info!("Finding all carts");

        let items = self
            .table
            .scan_items(Some(Self::cart_rows_filter(status)))
            .await?;
        let mut carts = dynamo::parse_items(items, "cart", item_to_cart);
        carts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        info!("Found {} carts", carts.len());
        Ok(carts)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), user_id = %user_id))]
    async fn delete_by_user(&self, user_id: &str) -> RepositoryResult<usize> {
        let carts = self.find_by_user(user_id).await?;

        for cart in &carts {
            self.table.delete_item(KEY, &cart.id).await?;
        }
        self.table.delete_item(KEY, &draft_lock_key(user_id)).await?;

        info!("Deleted {} carts", carts.len());
        Ok(carts.len())
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn count(&self, status: Option<CartStatus>) -> RepositoryResult<usize> {
        self.table
            .count_items(Some(Self::cart_rows_filter(status)))
            .await
    }
}
