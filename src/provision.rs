//! Create-if-absent provisioning of the context table

use aws_sdk_dynamodb::types::TableStatus;
use tracing::{error, info, warn};

use crate::dynamodb::{StorageClient, Table};
use crate::error::{ContextStoreError, StorageError};
use crate::utils::{retry_with_backoff, Backoff};

/// Creates the context table unless it already exists.
///
/// A table that is concurrently being created by someone else counts as
/// created. With `wait` set, returns only once the table is `ACTIVE`.
pub async fn create_table_if_necessary(
    client: &dyn StorageClient,
    table: &Table,
    wait: Option<Backoff>,
) -> Result<(), ContextStoreError> {
    match client.describe_table(table.name()).await {
        Ok(status) => {
            info!(table = table.name(), ?status, "Context table exists");
            return Ok(());
        }
        Err(StorageError::TableNotFound(_)) => {}
        Err(err) => {
            error!(table = table.name(), error = %err, "Could not describe context table");
            return Err(ContextStoreError::Provisioning(err));
        }
    }

    info!(table = table.name(), "Creating context table");
    match client.create_table(&table.definition()).await {
        Ok(()) => {}
        Err(StorageError::TableInUse(_)) => {
            info!(table = table.name(), "Context table is already being created");
        }
        Err(err) => {
            error!(table = table.name(), error = %err, "Could not create context table");
            return Err(ContextStoreError::Provisioning(err));
        }
    }

    if let Some(backoff) = wait {
        wait_until_active(client, table.name(), backoff).await?;
    }
    Ok(())
}

async fn wait_until_active(
    client: &dyn StorageClient,
    table_name: &str,
    backoff: Backoff,
) -> Result<(), ContextStoreError> {
    let result = retry_with_backoff(
        || async move {
            match client.describe_table(table_name).await? {
                TableStatus::Active => Ok(()),
                status => Err(StorageError::unavailable(format!(
                    "table {table_name} is {status:?}"
                ))),
            }
        },
        backoff,
    )
    .await;

    match result {
        Ok(()) => {
            info!(table = table_name, "Context table is active");
            Ok(())
        }
        Err(err) => {
            warn!(table = table_name, error = %err, "Context table did not become active");
            Err(ContextStoreError::Provisioning(err))
        }
    }
}
