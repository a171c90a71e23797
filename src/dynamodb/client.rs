use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::{ProvideErrorMetadata, SdkError},
    types::{
        AttributeDefinition, BillingMode, KeySchemaElement, ProvisionedThroughput, TableStatus,
    },
    Client,
};
use tracing::{debug, error, info};

use crate::dynamodb::{Attributes, Billing, StorageClient, TableDefinition};
use crate::error::StorageError;
use crate::expression::CompiledUpdate;

/// DynamoDB client wrapper implementing [`StorageClient`].
///
/// This is a thin translation layer between the store's storage primitives
/// and the AWS SDK. Errors the store needs to react to are mapped to the
/// matching [`StorageError`] variant:
///
/// - `ConditionalCheckFailedException` on update -> `ConditionFailed`
/// - `ValidationException` about a document path on update -> `InvalidPath`
/// - `ResourceNotFoundException` on describe -> `TableNotFound`
/// - `ResourceInUseException` on create -> `TableInUse`
///
/// Everything else is passed through as `StorageError::Unavailable`. Retries
/// and timeouts are whatever the SDK client was configured with.
///
/// # Example
///
/// ```no_run
/// use aws_config::load_from_env;
/// use context_store::dynamodb::DynamoDb;
///
/// # async fn run() {
/// let config = load_from_env().await;
/// let client = DynamoDb::new(&config);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DynamoDb {
    client: Client,
}

impl DynamoDb {
    /// Creates a new `DynamoDb` instance.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Wraps a pre-built client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Verifies authentication by attempting to list tables.
    pub async fn check_auth(&self) -> Result<(), StorageError> {
        self.client.list_tables().limit(1).send().await.map_err(|e| {
            error!("Authentication failed: {}", e);
            unavailable(e)
        })?;
        info!("Authentication successful");
        Ok(())
    }
}

#[async_trait]
impl StorageClient for DynamoDb {
    async fn get_item(
        &self,
        table_name: &str,
        key: Attributes,
        consistent_read: bool,
    ) -> Result<Option<Attributes>, StorageError> {
        let response = self
            .client
            .get_item()
            .table_name(table_name)
            .set_key(Some(key))
            .consistent_read(consistent_read)
            .send()
            .await
            .map_err(unavailable)?;

        Ok(response.item)
    }

    async fn put_item(&self, table_name: &str, item: Attributes) -> Result<(), StorageError> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(unavailable)?;

        debug!("Item put into '{table_name}'");
        Ok(())
    }

    async fn update_item(
        &self,
        table_name: &str,
        key: Attributes,
        update: &CompiledUpdate,
    ) -> Result<(), StorageError> {
        // DynamoDB rejects an empty value map, e.g. for REMOVE-only updates
        let values = (!update.expression_attribute_values.is_empty())
            .then(|| update.expression_attribute_values.clone());

        let result = self
            .client
            .update_item()
            .table_name(table_name)
            .set_key(Some(key))
            .update_expression(&update.update_expression)
            .set_condition_expression(update.condition_expression.clone())
            .set_expression_attribute_names(Some(update.expression_attribute_names.clone()))
            .set_expression_attribute_values(values)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!("Item updated in '{table_name}'");
                Ok(())
            }
            Err(err) => {
                if let SdkError::ServiceError(service_err) = &err {
                    let service_err = service_err.err();
                    if service_err.is_conditional_check_failed_exception() {
                        return Err(StorageError::ConditionFailed);
                    }
                    if is_invalid_document_path(service_err.code(), service_err.message()) {
                        return Err(StorageError::InvalidPath(
                            service_err.message().unwrap_or_default().to_string(),
                        ));
                    }
                }
                Err(unavailable(err))
            }
        }
    }

    async fn delete_item(&self, table_name: &str, key: Attributes) -> Result<(), StorageError> {
        self.client
            .delete_item()
            .table_name(table_name)
            .set_key(Some(key))
            .send()
            .await
            .map_err(unavailable)?;

        debug!("Item deleted from '{table_name}'");
        Ok(())
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, StorageError> {
        match self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .table()
                .and_then(|table| table.table_status())
                .cloned()
                .unwrap_or(TableStatus::Active)),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception());
                if not_found {
                    Err(StorageError::TableNotFound(table_name.to_string()))
                } else {
                    Err(unavailable(err))
                }
            }
        }
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StorageError> {
        let mut attribute_definitions = Vec::with_capacity(definition.key_schema.len());
        let mut key_schema = Vec::with_capacity(definition.key_schema.len());

        for key in &definition.key_schema {
            attribute_definitions.push(
                AttributeDefinition::builder()
                    .attribute_name(&key.name)
                    .attribute_type(key.attribute_type.clone())
                    .build()
                    .map_err(StorageError::unavailable)?,
            );
            key_schema.push(
                KeySchemaElement::builder()
                    .attribute_name(&key.name)
                    .key_type(key.key_type.clone())
                    .build()
                    .map_err(StorageError::unavailable)?,
            );
        }

        let mut request = self
            .client
            .create_table()
            .table_name(&definition.name)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema));

        request = match definition.billing {
            Billing::PayPerRequest => request.billing_mode(BillingMode::PayPerRequest),
            Billing::Provisioned {
                read_capacity_units,
                write_capacity_units,
            } => request.billing_mode(BillingMode::Provisioned).provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(read_capacity_units)
                    .write_capacity_units(write_capacity_units)
                    .build()
                    .map_err(StorageError::unavailable)?,
            ),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_resource_in_use_exception() {
                    Err(StorageError::TableInUse(definition.name.clone()))
                } else {
                    Err(unavailable(service_err))
                }
            }
        }
    }
}

fn unavailable(err: impl Into<aws_sdk_dynamodb::Error>) -> StorageError {
    StorageError::unavailable(err.into())
}

fn is_invalid_document_path(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationException")
        && message.is_some_and(|m| m.contains("document path"))
}
