use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::ContextStoreOptions;
use crate::dynamodb::{DynamoDb, Item, StorageClient, Table};
use crate::error::{ContextStoreError, Result, StorageError};
use crate::expression::Update;
use crate::provision;
use crate::record::{ConfigEncoding, ContextRecord};
use crate::utils::Backoff;

/// DynamoDB-backed store of per-installation context.
///
/// Holds exactly one [`ContextRecord`] per installed app. The store is cheap
/// to clone and safe to share between tasks; the table configuration and
/// client handle never change after construction.
///
/// # Example
///
/// ```no_run
/// use context_store::{ContextRecord, ContextStore, ContextStoreOptions, Update};
///
/// # async fn run() -> context_store::Result<()> {
/// let sdk_config = aws_config::load_from_env().await;
/// let store = ContextStore::from_sdk_config(&sdk_config, ContextStoreOptions::default()).await?;
///
/// let mut record = ContextRecord::new("5f6e4d3c");
/// record.auth_token = Some("token".into());
/// store.put(record).await?;
///
/// store.update("5f6e4d3c", Update::new().set("authToken", "refreshed")).await?;
/// store.set_item("5f6e4d3c", "count", 1).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ContextStore {
    client: Arc<dyn StorageClient>,
    table: Table,
    config_encoding: ConfigEncoding,
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("table", &self.table)
            .field("config_encoding", &self.config_encoding)
            .finish()
    }
}

impl ContextStore {
    /// Creates a store over an existing client, provisioning the table first
    /// when `options.auto_create` is set.
    pub async fn new(client: Arc<dyn StorageClient>, options: ContextStoreOptions) -> Result<Self> {
        let store = Self {
            client,
            table: options.table.to_table()?,
            config_encoding: options.config_encoding,
        };

        if options.auto_create {
            let wait = options.wait_for_active.then(Backoff::default);
            provision::create_table_if_necessary(store.client.as_ref(), &store.table, wait)
                .await?;
        }

        Ok(store)
    }

    /// Creates a store backed by DynamoDB, configured from `sdk_config`.
    pub async fn from_sdk_config(
        sdk_config: &aws_config::SdkConfig,
        options: ContextStoreOptions,
    ) -> Result<Self> {
        Self::new(Arc::new(DynamoDb::new(sdk_config)), options).await
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    /// Creates the table unless it exists, without waiting for it to become active.
    pub async fn create_table_if_necessary(&self) -> Result<()> {
        provision::create_table_if_necessary(self.client.as_ref(), &self.table, None).await
    }

    /// Reads the record for `installed_app_id`, or `None` if there is none.
    #[instrument(skip(self))]
    pub async fn get(&self, installed_app_id: &str) -> Result<Option<ContextRecord>> {
        let item = self
            .client
            .get_item(self.table.name(), self.table.key(installed_app_id), true)
            .await?;

        match item {
            Some(attributes) => {
                debug!("Context record found");
                Ok(Some(ContextRecord::from_item(&self.table, Item::from(attributes))?))
            }
            None => {
                debug!("No context record");
                Ok(None)
            }
        }
    }

    /// Replaces the whole record, named items included, and returns it as it
    /// will be read back.
    #[instrument(skip_all, fields(installed_app_id = %record.installed_app_id))]
    pub async fn put(&self, record: ContextRecord) -> Result<ContextRecord> {
        let item = record.to_item(&self.table, self.config_encoding)?;
        let stored = ContextRecord::from_item(&self.table, item.clone())?;

        self.client
            .put_item(self.table.name(), item.into_attributes())
            .await?;
        info!("Context record stored");
        Ok(stored)
    }

    /// Writes only the paths named in `update`.
    ///
    /// Never creates a record: updating a missing one fails with
    /// [`ContextStoreError::RecordNotFound`]. An empty update does nothing.
    #[instrument(skip(self, update))]
    pub async fn update(&self, installed_app_id: &str, update: Update) -> Result<()> {
        if update.is_empty() {
            debug!("Empty update, nothing to write");
            return Ok(());
        }

        let update = update.require_exists(self.table.hash_key());
        record_required(installed_app_id, self.send_update(installed_app_id, &update).await)?;
        info!("Context record updated");
        Ok(())
    }

    /// Deletes the record. Deleting a missing record succeeds.
    #[instrument(skip(self))]
    pub async fn delete(&self, installed_app_id: &str) -> Result<()> {
        self.client
            .delete_item(self.table.name(), self.table.key(installed_app_id))
            .await?;
        info!("Context record deleted");
        Ok(())
    }

    pub(crate) async fn send_update(&self, installed_app_id: &str, update: &Update) -> Result<()> {
        let compiled = update.compile()?;
        debug!(expression = %compiled.update_expression, "Sending update");
        self.client
            .update_item(self.table.name(), self.table.key(installed_app_id), &compiled)
            .await?;
        Ok(())
    }
}

/// Turns a failed `attribute_exists` guard into `RecordNotFound`.
pub(crate) fn record_required(installed_app_id: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(ContextStoreError::StorageUnavailable(StorageError::ConditionFailed)) => {
            Err(ContextStoreError::RecordNotFound(installed_app_id.to_string()))
        }
        other => other,
    }
}
