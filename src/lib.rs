//! # SmartApp Context Store
//!
//! Persists the per-installation context of a SmartApp in DynamoDB: tokens,
//! location, locale, installation config and a map of named items that can
//! be changed one at a time.
//!
//! - [`ContextStore`]: record-level `get` / `put` / `update` / `delete` and
//!   item-level `set_item` / `get_item` / `remove_item` / `remove_all_items`.
//! - [`Update`]: a partial write, compiled into a safe DynamoDB update expression.
//! - [`dynamodb`]: the storage seam, the AWS-backed client and an in-memory one.
//! - [`config`]: table and store options, from code or the environment.

pub mod config;
pub mod dynamodb;
mod error;
mod expression;
mod items;
mod provision;
mod record;
mod store;
mod utils;


pub use config::{BillingMode, ContextStoreOptions, SortKeyDescriptor, SortKeyOption, TableOptions};
pub use error::{CodecError, ContextStoreError, ExpressionError, Result, StorageError};
pub use expression::{CompiledUpdate, Update};
pub use provision::create_table_if_necessary;
pub use record::{ConfigEncoding, ContextRecord};
pub use store::ContextStore;
pub use utils::{retry_with_backoff, Backoff};
