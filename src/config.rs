//! Context store options
//!
//! Options deserialize from the same camelCase shape older deployments used,
//! for example:
//!
//! ```json
//! {
//!   "table": {
//!     "name": "app-data",
//!     "hashKey": "pk",
//!     "sortKey": "sk",
//!     "prefix": "context$",
//!     "billingMode": "PROVISIONED",
//!     "readCapacityUnits": 5,
//!     "writeCapacityUnits": 5
//!   },
//!   "autoCreate": false
//! }
//! ```
//!
//! `sortKey` is either the attribute name (a string `RANGE` key holding
//! `"context"`) or a full descriptor such as
//! `{"AttributeName": "order", "AttributeType": "N", "AttributeValue": 0, "KeyType": "RANGE"}`.

use aws_sdk_dynamodb::types::{KeyType, ScalarAttributeType};
use serde::Deserialize;
use serde_json::Value;

use crate::dynamodb::schema::RECORD_ATTRIBUTES;
use crate::dynamodb::{
    Billing, SortKey, Table, DEFAULT_HASH_KEY, DEFAULT_PREFIX, DEFAULT_TABLE_NAME,
};
use crate::error::ContextStoreError;
use crate::record::ConfigEncoding;

const DEFAULT_CAPACITY_UNITS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextStoreOptions {
    pub table: TableOptions,
    /// Create the table at construction when it does not exist
    pub auto_create: bool,
    /// After creating the table, wait until it is `ACTIVE`
    pub wait_for_active: bool,
    pub config_encoding: ConfigEncoding,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
    pub name: String,
    pub hash_key: String,
    pub prefix: String,
    pub sort_key: Option<SortKeyOption>,
    pub billing_mode: BillingMode,
    /// Only used when creating a `PROVISIONED` table
    pub read_capacity_units: Option<i64>,
    /// Only used when creating a `PROVISIONED` table
    pub write_capacity_units: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SortKeyOption {
    Name(String),
    Descriptor(SortKeyDescriptor),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKeyDescriptor {
    #[serde(alias = "AttributeName")]
    pub attribute_name: String,
    #[serde(alias = "AttributeType", default = "default_attribute_type")]
    pub attribute_type: String,
    #[serde(alias = "AttributeValue")]
    pub attribute_value: Value,
    #[serde(alias = "KeyType", default = "default_key_type")]
    pub key_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    #[default]
    PayPerRequest,
    Provisioned,
}

fn default_attribute_type() -> String {
    "S".to_string()
}

fn default_key_type() -> String {
    "RANGE".to_string()
}

impl Default for ContextStoreOptions {
    fn default() -> Self {
        Self {
            table: TableOptions::default(),
            auto_create: true,
            wait_for_active: true,
            config_encoding: ConfigEncoding::default(),
        }
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            hash_key: DEFAULT_HASH_KEY.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            sort_key: None,
            billing_mode: BillingMode::default(),
            read_capacity_units: None,
            write_capacity_units: None,
        }
    }
}

impl ContextStoreOptions {
    /// Reads options from `CONTEXT_STORE_*` environment variables.
    pub fn from_env() -> Result<Self, ContextStoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads options through `lookup`; unset or empty variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ContextStoreError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut options = Self::default();

        if let Some(name) = var("CONTEXT_STORE_TABLE") {
            options.table.name = name;
        }
        if let Some(hash_key) = var("CONTEXT_STORE_HASH_KEY") {
            options.table.hash_key = hash_key;
        }
        if let Some(prefix) = var("CONTEXT_STORE_PREFIX") {
            options.table.prefix = prefix;
        }
        options.table.sort_key = var("CONTEXT_STORE_SORT_KEY").map(SortKeyOption::Name);
        if let Some(mode) = var("CONTEXT_STORE_BILLING_MODE") {
            options.table.billing_mode = match mode.to_ascii_uppercase().as_str() {
                "PAY_PER_REQUEST" => BillingMode::PayPerRequest,
                "PROVISIONED" => BillingMode::Provisioned,
                other => {
                    return Err(ContextStoreError::InvalidConfig(format!(
                        "unknown billing mode '{other}'"
                    )))
                }
            };
        }
        if let Some(auto_create) = var("CONTEXT_STORE_AUTO_CREATE") {
            options.auto_create = parse_flag(&auto_create)?;
        }

        Ok(options)
    }
}

impl TableOptions {
    /// Resolves the options into a [`Table`]. Empty names fall back to the
    /// defaults.
    pub fn to_table(&self) -> Result<Table, ContextStoreError> {
        let name = non_empty(&self.name, DEFAULT_TABLE_NAME);
        let mut table = Table::new(name)
            .with_hash_key(non_empty(&self.hash_key, DEFAULT_HASH_KEY))
            .with_prefix(non_empty(&self.prefix, DEFAULT_PREFIX));

        if let Some(sort_key) = &self.sort_key {
            table = table.with_sort_key(sort_key.to_sort_key()?);
        }
        check_key_names(&table)?;

        let billing = match self.billing_mode {
            BillingMode::PayPerRequest => Billing::PayPerRequest,
            BillingMode::Provisioned => Billing::Provisioned {
                read_capacity_units: self.read_capacity_units.unwrap_or(DEFAULT_CAPACITY_UNITS),
                write_capacity_units: self.write_capacity_units.unwrap_or(DEFAULT_CAPACITY_UNITS),
            },
        };
        Ok(table.with_billing(billing))
    }
}

impl SortKeyOption {
    fn to_sort_key(&self) -> Result<SortKey, ContextStoreError> {
        let descriptor = match self {
            SortKeyOption::Name(name) => return Ok(SortKey::new(name.as_str())),
            SortKeyOption::Descriptor(descriptor) => descriptor,
        };

        let attribute_type = match descriptor.attribute_type.as_str() {
            "S" => ScalarAttributeType::S,
            "N" => ScalarAttributeType::N,
            "B" => ScalarAttributeType::B,
            other => {
                return Err(ContextStoreError::InvalidConfig(format!(
                    "unsupported sort key attribute type '{other}'"
                )))
            }
        };
        let key_type = match descriptor.key_type.to_ascii_uppercase().as_str() {
            "RANGE" => KeyType::Range,
            "HASH" => KeyType::Hash,
            other => {
                return Err(ContextStoreError::InvalidConfig(format!(
                    "unsupported sort key type '{other}'"
                )))
            }
        };
        let value = match &descriptor.attribute_value {
            Value::String(value) => value.clone(),
            Value::Number(value) => value.to_string(),
            other => {
                return Err(ContextStoreError::InvalidConfig(format!(
                    "sort key value must be a string or number, got {other}"
                )))
            }
        };

        Ok(
            SortKey::with_value(descriptor.attribute_name.as_str(), attribute_type, value)
                .with_key_type(key_type),
        )
    }
}

/// Key attributes must not share a name with a record field or with each other.
fn check_key_names(table: &Table) -> Result<(), ContextStoreError> {
    let sort_key = table.sort_key().map(SortKey::attribute_name);
    for name in std::iter::once(table.hash_key()).chain(sort_key) {
        if RECORD_ATTRIBUTES.iter().any(|attribute| *attribute == name) {
            return Err(ContextStoreError::InvalidConfig(format!(
                "key attribute '{name}' clashes with a record attribute"
            )));
        }
    }
    if sort_key == Some(table.hash_key()) {
        return Err(ContextStoreError::InvalidConfig(format!(
            "hash key and sort key are both named '{}'",
            table.hash_key()
        )));
    }
    Ok(())
}

fn non_empty<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

fn parse_flag(value: &str) -> Result<bool, ContextStoreError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ContextStoreError::InvalidConfig(format!(
            "expected a boolean, got '{other}'"
        ))),
    }
}
