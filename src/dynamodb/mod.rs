//! # DynamoDB Module
//!
//! Storage plumbing for the context store.
//!
//! ## Components
//!
//! - `StorageClient`: the minimal set of DynamoDB primitives the store relies on.
//! - `DynamoDb`: a `StorageClient` backed by `aws_sdk_dynamodb::Client`.
//! - `MemoryStorage`: an in-process `StorageClient` for tests and local runs.
//! - `Table`: table configuration and the physical key builder.
//! - `Item`: a thin wrapper over a native DynamoDB item.
//!
//! ## Usage
//!
//! The AWS-backed client reads its configuration from an explicit
//! `aws_config::SdkConfig`, usually obtained from the environment:
//!
//! - `AWS_ACCESS_KEY_ID`: Your AWS access key ID.
//! - `AWS_SECRET_ACCESS_KEY`: Your AWS secret access key.
//! - `AWS_REGION`: The AWS region where your DynamoDB tables are located.
//!
//! Optionally, you can also set:
//! - `AWS_SESSION_TOKEN`: If you're using temporary credentials.
//! - `AWS_ENDPOINT_URL`: For using a custom endpoint (e.g., DynamoDB Local).

mod client;
mod item;
mod memory;
pub mod schema;
mod table;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, KeyType, ScalarAttributeType, TableStatus};
use std::collections::HashMap;

use crate::error::StorageError;
use crate::expression::CompiledUpdate;

pub use client::DynamoDb;
pub use item::Item;
pub use memory::MemoryStorage;
pub use table::{
    Billing, SortKey, Table, DEFAULT_HASH_KEY, DEFAULT_PREFIX, DEFAULT_SORT_KEY_VALUE,
    DEFAULT_TABLE_NAME,
};

/// A native DynamoDB item, or the key part of one.
pub type Attributes = HashMap<String, AttributeValue>;

/// Everything `create_table` needs to know about the context table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub key_schema: Vec<KeyAttribute>,
    pub billing: Billing,
}

/// One element of a table's primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttribute {
    pub name: String,
    pub attribute_type: ScalarAttributeType,
    pub key_type: KeyType,
}

/// The storage primitives the context store is written against.
///
/// Kept as close as possible to the DynamoDB API so that the AWS
/// implementation stays a thin translation layer. Implementations report the
/// conditions the store reacts to through the dedicated [`StorageError`]
/// variants and everything else as [`StorageError::Unavailable`].
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn get_item(
        &self,
        table_name: &str,
        key: Attributes,
        consistent_read: bool,
    ) -> Result<Option<Attributes>, StorageError>;

    async fn put_item(&self, table_name: &str, item: Attributes) -> Result<(), StorageError>;

    async fn update_item(
        &self,
        table_name: &str,
        key: Attributes,
        update: &CompiledUpdate,
    ) -> Result<(), StorageError>;

    /// Deleting a key that does not exist is not an error.
    async fn delete_item(&self, table_name: &str, key: Attributes) -> Result<(), StorageError>;

    /// Returns [`StorageError::TableNotFound`] when the table does not exist.
    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, StorageError>;

    /// Returns [`StorageError::TableInUse`] when the table already exists.
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StorageError>;
}
