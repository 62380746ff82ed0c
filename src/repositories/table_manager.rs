use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::models::{RepositoryError, RepositoryResult};

/// Manages DynamoDB table creation and configuration
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TableManager {
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(10),
            max_attempts: 30,
        }
    }

    /// Create a table keyed by a single string partition key
    #[instrument(skip(self), fields(table_name = %table_name, key = %key))]
    pub async fn create_table(&self, table_name: &str, key: &str) -> RepositoryResult<bool> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(false);
        }

        let attribute_definition = AttributeDefinition::builder()
            .attribute_name(key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build attribute definition: {}", e),
            })?;

        let key_schema = KeySchemaElement::builder()
            .attribute_name(key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build key schema: {}", e),
            })?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(attribute_definition)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| self.map_dynamodb_error(table_name, e.into()))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(true)
    }

    /// Create every table of the service. Returns the names of the tables created.
    #[instrument(skip(self, database))]
    pub async fn create_all_tables(&self, database: &DatabaseConfig) -> RepositoryResult<Vec<String>> {
        info!("Creating all tables");

        let mut created = Vec::new();
        for (table_name, key) in database.tables() {
            if self.create_table(table_name, key).await? {
                created.push(table_name.to_string());
            }
        }

        info!("All tables ready, {} created", created.len());
        Ok(created)
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => Ok(true),
            Err(e) => match DynamoDbError::from(e) {
                DynamoDbError::ResourceNotFoundException(_) => {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                }
                other => {
                    error!("Error checking table existence: {}", other);
                    Err(RepositoryError::ConnectionFailed)
                }
            },
        }
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for _ in 0..self.max_attempts {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(table_name, e.into()))?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }

    fn map_dynamodb_error(&self, table_name: &str, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);
        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: table_name.to_string(),
            },
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_manager_creation() {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        let manager = TableManager::new(client);

        assert_eq!(manager.max_attempts, 30);
        assert_eq!(manager.poll_interval, Duration::from_secs(10));
    }
}
