use async_trait::async_trait;
use aws_sdk_dynamodb::types::{Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Error as DynamoDbError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamo::{self, DynamoTable, Item, ScanFilter};
use crate::models::{RepositoryError, RepositoryResult, User};

const KEY: &str = "user_id";

/// Trait defining the interface for user data access operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find all users whose username contains the search term, ordered by username
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<User>>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;

    /// Create a user; a taken username or phone number fails with `DuplicateKey`
    async fn create(&self, user: User) -> RepositoryResult<User>;

    /// Replace `previous` with `user`, moving uniqueness reservations as needed
    async fn update(&self, previous: &User, user: User) -> RepositoryResult<User>;

    async fn delete(&self, user: &User) -> RepositoryResult<()>;

    async fn count(&self) -> RepositoryResult<usize>;
}

/// DynamoDB implementation of the UserRepository trait.
///
/// Username and phone number uniqueness is held by reservation items
/// (`USERNAME#…`, `PHONE#…`) in the same table, written in one transaction
/// with the user row.
pub struct DynamoDbUserRepository {
    table: DynamoTable,
}

/// Transaction under construction, remembering which unique field each item guards
struct UserTransaction {
    items: Vec<TransactWriteItem>,
    guards: Vec<Option<&'static str>>,
}

impl UserTransaction {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            guards: Vec::new(),
        }
    }

    fn push(&mut self, item: TransactWriteItem, guard: Option<&'static str>) {
        self.items.push(item);
        self.guards.push(guard);
    }

    /// Unique field whose reservation caused the cancellation, if any
    fn violated_field(&self, error: &DynamoDbError) -> Option<&'static str> {
        dynamo::cancellation_codes(error)
            .iter()
            .zip(&self.guards)
            .find_map(|(code, guard)| match code.as_deref() {
                Some("ConditionalCheckFailed") => *guard,
                _ => None,
            })
    }
}

impl DynamoDbUserRepository {
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

    pub fn phone_lock_key(phone_number: &str) -> String {
        format!("PHONE#{}", phone_number)
    }

    pub fn username_lock_key(username: &str) -> String {
        format!("USERNAME#{}", username)
    }

    pub fn user_to_item(&self, user: &User) -> Item {
        let mut item = HashMap::from([
            (KEY.to_string(), dynamo::s(&user.id)),
            ("username".to_string(), dynamo::s(&user.username)),
            ("first_name".to_string(), dynamo::s(&user.first_name)),
            ("last_name".to_string(), dynamo::s(&user.last_name)),
            ("phone_number".to_string(), dynamo::s(&user.phone_number)),
            (
                "date_joined".to_string(),
                dynamo::s(user.date_joined.to_rfc3339()),
            ),
        ]);

        if let Some(email) = &user.email {
            item.insert("email".to_string(), dynamo::s(email));
        }

        item
    }

    pub fn item_to_user(&self, item: Item) -> RepositoryResult<User> {
        Ok(User {
            id: dynamo::get_s(&item, KEY)?,
            username: dynamo::get_s(&item, "username")?,
            first_name: dynamo::get_opt_s(&item, "first_name").unwrap_or_default(),
            last_name: dynamo::get_opt_s(&item, "last_name").unwrap_or_default(),
            email: dynamo::get_opt_s(&item, "email"),
            phone_number: dynamo::get_s(&item, "phone_number")?,
            date_joined: dynamo::get_datetime(&item, "date_joined")?,
        })
    }

    fn user_put(&self, user: &User, condition: &str) -> RepositoryResult<TransactWriteItem> {
        let put = Put::builder()
            .table_name(self.table.table_name())
            .set_item(Some(self.user_to_item(user)))
            .condition_expression(condition)
            .expression_attribute_names("#pk", KEY)
            .build()
            .map_err(dynamo::build_error)?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn lock_put(&self, lock_key: String, owner_id: &str) -> RepositoryResult<TransactWriteItem> {
        let put = Put::builder()
            .table_name(self.table.table_name())
            .item(KEY, dynamo::s(lock_key))
            .item("owner_id", dynamo::s(owner_id))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", KEY)
            .build()
            .map_err(dynamo::build_error)?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn key_delete(&self, key: String) -> RepositoryResult<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(self.table.table_name())
            .set_key(Some(dynamo::key(KEY, &key)))
            .build()
            .map_err(dynamo::build_error)?;

        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    async fn execute(&self, transaction: UserTransaction) -> RepositoryResult<()> {
        let span = self.table.span("TransactWriteItems");

        let result = async {
            self.table
                .client()
                .transact_write_items()
                .set_transact_items(Some(transaction.items.clone()))
                .send()
                .await
        }
        .instrument(span)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let error: DynamoDbError = e.into();
                if let Some(field) = transaction.violated_field(&error) {
                    warn!("Unique field already taken: {}", field);
                    return Err(RepositoryError::DuplicateKey {
                        field: field.to_string(),
                    });
                }
                Err(self.table.map_error(error))
            }
        }
    }

    fn user_rows_filter() -> ScanFilter {
        ScanFilter::new("attribute_exists(username)")
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn find_all(&self, search: Option<String>) -> RepositoryResult<Vec<User>> {
        info!("Finding users");

        let items = self.table.scan_items(Some(Self::user_rows_filter())).await?;
        let search = search.map(|term| term.to_lowercase());

        let mut users: Vec<User> = dynamo::parse_items(items, "user", |item| self.item_to_user(item))
            .into_iter()
            .filter(|user| match &search {
                Some(term) => user.username.to_lowercase().contains(term),
                None => true,
            })
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));

        info!("Found {} users", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(table = %self.table.table_name(), id = %id))]
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        match self.table.get_item(KEY, id).await? {
            // reservation items share the key space but never carry a username
            Some(item) if item.contains_key("username") => Ok(Some(self.item_to_user(item)?)),
            _ => {
                info!("User not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, user), fields(table = %self.table.table_name(), id = %user.id))]
    async fn create(&self, user: User) -> RepositoryResult<User> {
        info!("Creating user");

        let mut transaction = UserTransaction::new();
        transaction.push(self.user_put(&user, "attribute_not_exists(#pk)")?, None);
        transaction.push(
            self.lock_put(Self::phone_lock_key(&user.phone_number), &user.id)?,
            Some("phone_number"),
        );
        transaction.push(
            self.lock_put(Self::username_lock_key(&user.username), &user.id)?,
            Some("username"),
        );

        self.execute(transaction).await?;

        info!("User created successfully");
        Ok(user)
    }

    #[instrument(skip(self, previous, user), fields(table = %self.table.table_name(), id = %user.id))]
    async fn update(&self, previous: &User, user: User) -> RepositoryResult<User> {
        info!("Updating user");

        let mut transaction = UserTransaction::new();
        transaction.push(self.user_put(&user, "attribute_exists(#pk)")?, None);

        if previous.phone_number != user.phone_number {
            transaction.push(
                self.key_delete(Self::phone_lock_key(&previous.phone_number))?,
                None,
            );
            transaction.push(
                self.lock_put(Self::phone_lock_key(&user.phone_number), &user.id)?,
                Some("phone_number"),
            );
        }

        if previous.username != user.username {
            transaction.push(
                self.key_delete(Self::username_lock_key(&previous.username))?,
                None,
            );
            transaction.push(
                self.lock_put(Self::username_lock_key(&user.username), &user.id)?,
                Some("username"),
            );
        }

        self.execute(transaction).await?;

        info!("User updated successfully");
        Ok(user)
    }

    #[instrument(skip(self, user), fields(table = %self.table.table_name(), id = %user.id))]
    async fn delete(&self, user: &User) -> RepositoryResult<()> {
        info!("Deleting user");

        let mut transaction = UserTransaction::new();
        transaction.push(self.key_delete(user.id.clone())?, None);
        transaction.push(self.key_delete(Self::phone_lock_key(&user.phone_number))?, None);
        transaction.push(self.key_delete(Self::username_lock_key(&user.username))?, None);

        self.execute(transaction).await
    }

    #[instrument(skip(self), fields(table = %self.table.table_name()))]
    async fn count(&self) -> RepositoryResult<usize> {
        self.table.count_items(Some(Self::user_rows_filter())).await
    }
}
