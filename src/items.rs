//! Named items kept in a record's `state` map
//!
//! Each operation touches a single key of `state`, so concurrent writers of
//! different names never overwrite each other.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::dynamodb::schema::ATTR_STATE;
use crate::error::{ContextStoreError, Result, StorageError};
use crate::expression::Update;
use crate::store::{record_required, ContextStore};

impl ContextStore {
    /// Stores `value` under `name`, leaving other named items untouched.
    ///
    /// Records written before `state` existed get the map created on the fly.
    /// Fails with [`ContextStoreError::RecordNotFound`] if there is no record.
    #[instrument(skip(self, value))]
    pub async fn set_item(
        &self,
        installed_app_id: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let hash_key = self.table().hash_key();
        let nested = Update::new()
            .set_at([ATTR_STATE, name], value.clone())
            .require_exists(hash_key);

        match self.send_update(installed_app_id, &nested).await {
            Err(err) if is_invalid_path(&err) => {}
            other => return record_required(installed_app_id, other),
        }

        debug!("Record has no state map, creating it");
        let mut state = Map::new();
        state.insert(name.to_string(), value);
        let initial = Update::new()
            .set(ATTR_STATE, Value::Object(state))
            .require_exists(hash_key)
            .require_absent(ATTR_STATE);

        match self.send_update(installed_app_id, &initial).await {
            // the map appeared in the meantime, or the record is gone
            Err(err) if is_condition_failed(&err) => {}
            other => return other,
        }

        record_required(installed_app_id, self.send_update(installed_app_id, &nested).await)
    }

    /// The value stored under `name`.
    ///
    /// `None` means the item was never set (or there is no record);
    /// `Some(Value::Null)` means it was set to null.
    #[instrument(skip(self))]
    pub async fn get_item(&self, installed_app_id: &str, name: &str) -> Result<Option<Value>> {
        Ok(self
            .get(installed_app_id)
            .await?
            .and_then(|mut record| record.state.remove(name)))
    }

    /// Removes the item stored under `name`. Removing an item that was never
    /// set succeeds.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, installed_app_id: &str, name: &str) -> Result<()> {
        let update = Update::new()
            .remove_at([ATTR_STATE, name])
            .require_exists(self.table().hash_key());

        match self.send_update(installed_app_id, &update).await {
            Err(err) if is_invalid_path(&err) => {
                debug!("Record has no state map, nothing to remove");
                Ok(())
            }
            other => record_required(installed_app_id, other),
        }
    }

    /// Removes every named item, keeping the record itself.
    #[instrument(skip(self))]
    pub async fn remove_all_items(&self, installed_app_id: &str) -> Result<()> {
        let update = Update::new()
            .set(ATTR_STATE, Value::Object(Map::new()))
            .require_exists(self.table().hash_key());

        record_required(installed_app_id, self.send_update(installed_app_id, &update).await)
    }
}

fn is_invalid_path(err: &ContextStoreError) -> bool {
    matches!(
        err,
        ContextStoreError::StorageUnavailable(StorageError::InvalidPath(_))
    )
}

fn is_condition_failed(err: &ContextStoreError) -> bool {
    matches!(
        err,
        ContextStoreError::StorageUnavailable(StorageError::ConditionFailed)
    )
}
