use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::models::{RepositoryError, RepositoryResult};

/// Raw DynamoDB item
pub type Item = HashMap<String, AttributeValue>;

/// Handle on one DynamoDB table shared by the repositories
#[derive(Clone)]
pub struct DynamoTable {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

/// Filter expression applied to a scan
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    expression: String,
    names: HashMap<String, String>,
    values: Item,
}

impl ScanFilter {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, placeholder: &str, attribute: &str) -> Self {
        self.names
            .insert(placeholder.to_string(), attribute.to_string());
        self
    }

    pub fn value(mut self, placeholder: &str, value: AttributeValue) -> Self {
        self.values.insert(placeholder.to_string(), value);
        self
    }
}

impl DynamoTable {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create a DynamoDB subsegment span with X-Ray attributes
    pub fn span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            // AWS X-Ray specific attributes
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.request_id" = tracing::field::Empty,
            "aws.agent" = "rust-aws-sdk",

            // Resource identification for X-Ray
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,

            "table.name" = %self.table_name,
            "endpoint" = format!("https://dynamodb.{}.amazonaws.com", self.region),

            // OpenTelemetry semantic conventions
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),

            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,

            // Database semantic conventions
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,

            "component" = "aws-sdk-dynamodb",
        )
    }

    /// Convert DynamoDB error to RepositoryError
    pub fn map_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error on {}: {:?}", self.table_name, error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            },
            DynamoDbError::ConditionalCheckFailedException(e) => {
                RepositoryError::ConstraintViolation {
                    message: e.to_string(),
                }
            }
            DynamoDbError::TransactionCanceledException(e) => RepositoryError::TransactionFailed {
                message: e.to_string(),
            },
            DynamoDbError::ProvisionedThroughputExceededException(_)
            | DynamoDbError::RequestLimitExceeded(_) => RepositoryError::RateLimitExceeded,
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }

    #[tracing::instrument(skip(self, key), fields(table = %self.table_name))]
    pub async fn get_item(&self, key_name: &str, key: &str) -> RepositoryResult<Option<Item>> {
        let span = self.span("GetItem");

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key(key_name, AttributeValue::S(key.to_string()))
                .send()
                .await
                .map_err(|e| self.map_error(e.into()))
        }
        .instrument(span)
        .await?;

        Ok(response.item)
    }

    /// Put an item that must not exist yet
    pub async fn put_new_item(&self, key_name: &str, item: Item) -> RepositoryResult<()> {
        let span = self.span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(#pk)")
                .expression_attribute_names("#pk", key_name)
                .send()
                .await
                .map_err(|e| self.map_error(e.into()))
        }
        .instrument(span)
        .await?;

        Ok(())
    }

    /// Replace an item that must already exist; a missing item maps to NotFound
    pub async fn replace_item(&self, key_name: &str, item: Item) -> RepositoryResult<()> {
        let span = self.span("PutItem");

        let result = async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_exists(#pk)")
                .expression_attribute_names("#pk", key_name)
                .send()
                .await
                .map_err(|e| self.map_error(e.into()))
        }
        .instrument(span)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(RepositoryError::ConstraintViolation { .. }) => Err(RepositoryError::NotFound),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_item(&self, key_name: &str, key: &str) -> RepositoryResult<()> {
        let span = self.span("DeleteItem");

        async {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(key_name, AttributeValue::S(key.to_string()))
                .send()
                .await
                .map_err(|e| self.map_error(e.into()))
        }
        .instrument(span)
        .await?;

        Ok(())
    }

    /// Scan the whole table, following pagination
    pub async fn scan_items(&self, filter: Option<ScanFilter>) -> RepositoryResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let span = self.span("Scan");
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .select(Select::AllAttributes)
                .set_exclusive_start_key(exclusive_start_key.take());

            if let Some(filter) = &filter {
                request = request.filter_expression(&filter.expression);
                if !filter.names.is_empty() {
                    request = request.set_expression_attribute_names(Some(filter.names.clone()));
                }
                if !filter.values.is_empty() {
                    request = request.set_expression_attribute_values(Some(filter.values.clone()));
                }
            }

            let response = async { request.send().await.map_err(|e| self.map_error(e.into())) }
                .instrument(span)
                .await?;

            items.extend(response.items.unwrap_or_default());

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        info!("Scanned {} items from {}", items.len(), self.table_name);
        Ok(items)
    }

    /// Count matching items without transferring them
    pub async fn count_items(&self, filter: Option<ScanFilter>) -> RepositoryResult<usize> {
        let mut count = 0usize;
        let mut exclusive_start_key = None;

        loop {
            let span = self.span("Scan");
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .select(Select::Count)
                .set_exclusive_start_key(exclusive_start_key.take());

            if let Some(filter) = &filter {
                request = request.filter_expression(&filter.expression);
                if !filter.names.is_empty() {
                    request = request.set_expression_attribute_names(Some(filter.names.clone()));
                }
                if !filter.values.is_empty() {
                    request = request.set_expression_attribute_values(Some(filter.values.clone()));
                }
            }

            let response = async { request.send().await.map_err(|e| self.map_error(e.into())) }
                .instrument(span)
                .await?;

            count += response.count().max(0) as usize;

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(count)
    }
}

/// Parse a list of raw items, skipping ones that fail to parse
pub fn parse_items<T>(
    items: Vec<Item>,
    kind: &str,
    parse: impl Fn(Item) -> RepositoryResult<T>,
) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match parse(item) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse {} item: {}", kind, e);
                None
            }
        })
        .collect()
}

/// Condition codes reported per item when a transaction is cancelled
pub fn cancellation_codes(error: &DynamoDbError) -> Vec<Option<String>> {
    match error {
        DynamoDbError::TransactionCanceledException(e) => e
            .cancellation_reasons()
            .iter()
            .map(|reason| reason.code().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Builders of transaction items fail only on missing required fields
pub fn build_error(error: aws_sdk_dynamodb::error::BuildError) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build request: {}", error),
    }
}

pub fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub fn key(name: &str, value: &str) -> Item {
    HashMap::from([(name.to_string(), s(value))])
}

fn missing(field: &str) -> RepositoryError {
    RepositoryError::InvalidItem {
        message: format!("Missing or invalid {}", field),
    }
}

pub fn get_s(item: &Item, field: &str) -> RepositoryResult<String> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| missing(field))
}

pub fn get_opt_s(item: &Item, field: &str) -> Option<String> {
    item.get(field).and_then(|v| v.as_s().ok()).cloned()
}

pub fn get_decimal(item: &Item, field: &str) -> RepositoryResult<Decimal> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|v| Decimal::from_str(v).ok())
        .ok_or_else(|| missing(field))
}

pub fn get_u32(item: &Item, field: &str) -> RepositoryResult<u32> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| missing(field))
}

pub fn get_opt_u64(item: &Item, field: &str) -> Option<u64> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|v| v.parse().ok())
}

pub fn get_datetime(item: &Item, field: &str) -> RepositoryResult<DateTime<Utc>> {
    get_opt_datetime(item, field).ok_or_else(|| missing(field))
}

pub fn get_opt_datetime(item: &Item, field: &str) -> Option<DateTime<Utc>> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn get_list<'a>(item: &'a Item, field: &str) -> &'a [AttributeValue] {
    item.get(field)
        .and_then(|v| v.as_l().ok())
        .map(Vec::as_slice)
        .unwrap_or_default()
}
