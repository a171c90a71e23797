use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, KeyType, ScalarAttributeType};

use crate::dynamodb::{Attributes, KeyAttribute, TableDefinition};

pub const DEFAULT_TABLE_NAME: &str = "smartapp";
pub const DEFAULT_HASH_KEY: &str = "id";
pub const DEFAULT_PREFIX: &str = "ctx:";
pub const DEFAULT_SORT_KEY_VALUE: &str = "context";

/// Context table configuration.
///
/// A `Table` describes where context records live and how their primary key is
/// formed. It is also the single place physical keys are built, so every
/// operation on a given installed app addresses the same item.
///
/// # Primary Key
///
/// - **Hash Key**: the configured prefix followed by the installed app ID,
///   stored as a string attribute (`id = "ctx:<installedAppId>"` by default).
/// - **Sort Key**: optional. Some deployments share a table whose schema
///   mandates a composite key. Every context record then carries the same
///   constant sort-key value, so there is still exactly one record per
///   installed app.
///
/// # Capacity Modes
///
/// Billing settings only matter when the table is created:
/// - **On-Demand** (`PAY_PER_REQUEST`): the default.
/// - **Provisioned**: fixed read and write capacity units.
///
/// # Example
///
/// ```
/// use context_store::dynamodb::{SortKey, Table};
///
/// let table = Table::new("app-data")
///     .with_hash_key("pk")
///     .with_sort_key(SortKey::new("sk"))
///     .with_prefix("context$");
///
/// let key = table.key("a1b2");
/// assert_eq!(key["pk"].as_s().unwrap(), "context$a1b2");
/// assert_eq!(key["sk"].as_s().unwrap(), "context");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    hash_key: String,
    sort_key: Option<SortKey>,
    prefix: String,
    billing: Billing,
}

/// The constant sort key carried by every context record.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    attribute_name: String,
    attribute_type: ScalarAttributeType,
    value: String,
    key_type: KeyType,
}

/// Capacity mode used when the table is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Billing {
    #[default]
    PayPerRequest,
    Provisioned {
        read_capacity_units: i64,
        write_capacity_units: i64,
    },
}

impl Default for Table {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_NAME)
    }
}

impl Table {
    /// Creates a table configuration with the default hash key and prefix and
    /// no sort key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash_key: DEFAULT_HASH_KEY.to_string(),
            sort_key: None,
            prefix: DEFAULT_PREFIX.to_string(),
            billing: Billing::default(),
        }
    }

    pub fn with_hash_key(mut self, hash_key: impl Into<String>) -> Self {
        self.hash_key = hash_key.into();
        self
    }

    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_billing(mut self, billing: Billing) -> Self {
        self.billing = billing;
        self
    }

    /// Returns the name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the hash key attribute name.
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Returns the sort key of the table, if any.
    pub fn sort_key(&self) -> Option<&SortKey> {
        self.sort_key.as_ref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn billing(&self) -> Billing {
        self.billing
    }

    /// The hash key value stored for `installed_app_id`.
    pub fn partition_value(&self, installed_app_id: &str) -> String {
        format!("{}{}", self.prefix, installed_app_id)
    }

    /// Builds the physical primary key for `installed_app_id`.
    ///
    /// Empty IDs are accepted and produce the bare prefix.
    pub fn key(&self, installed_app_id: &str) -> Attributes {
        let mut key = Attributes::with_capacity(2);
        key.insert(
            self.hash_key.clone(),
            AttributeValue::S(self.partition_value(installed_app_id)),
        );
        if let Some(sort_key) = &self.sort_key {
            key.insert(sort_key.attribute_name.clone(), sort_key.attribute_value());
        }
        key
    }

    /// Recovers the installed app ID from a stored hash key value.
    pub fn installed_app_id_from<'a>(&self, partition_value: &'a str) -> Option<&'a str> {
        partition_value.strip_prefix(self.prefix.as_str())
    }

    /// The key schema and billing settings used to create the table.
    pub fn definition(&self) -> TableDefinition {
        let mut key_schema = vec![KeyAttribute {
            name: self.hash_key.clone(),
            attribute_type: ScalarAttributeType::S,
            key_type: KeyType::Hash,
        }];
        if let Some(sort_key) = &self.sort_key {
            key_schema.push(KeyAttribute {
                name: sort_key.attribute_name.clone(),
                attribute_type: sort_key.attribute_type.clone(),
                key_type: sort_key.key_type.clone(),
            });
        }

        TableDefinition {
            name: self.name.clone(),
            key_schema,
            billing: self.billing,
        }
    }
}

impl SortKey {
    /// A string `RANGE` key holding the constant `"context"`.
    pub fn new(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            attribute_type: ScalarAttributeType::S,
            value: DEFAULT_SORT_KEY_VALUE.to_string(),
            key_type: KeyType::Range,
        }
    }

    /// A sort key with an explicit type and constant value. Numbers are given
    /// in their DynamoDB string form, binary constants as UTF-8 text.
    pub fn with_value(
        attribute_name: impl Into<String>,
        attribute_type: ScalarAttributeType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            attribute_type,
            value: value.into(),
            key_type: KeyType::Range,
        }
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn attribute_type(&self) -> &ScalarAttributeType {
        &self.attribute_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn key_type(&self) -> &KeyType {
        &self.key_type
    }

    /// The constant, typed according to the attribute type.
    pub fn attribute_value(&self) -> AttributeValue {
        match self.attribute_type {
            ScalarAttributeType::N => AttributeValue::N(self.value.clone()),
            ScalarAttributeType::B => AttributeValue::B(Blob::new(self.value.as_bytes())),
            _ => AttributeValue::S(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_constant_follows_attribute_type() {
        assert_eq!(
            SortKey::new("sk").attribute_value(),
            AttributeValue::S("context".into())
        );
        assert_eq!(
            SortKey::with_value("sk", ScalarAttributeType::N, "0").attribute_value(),
            AttributeValue::N("0".into())
        );
        assert_eq!(
            SortKey::with_value("sk", ScalarAttributeType::B, "ctx").attribute_value(),
            AttributeValue::B(Blob::new(b"ctx".to_vec()))
        );
    }

    #[test]
    fn binary_sort_key_in_physical_key() {
        let table = Table::default()
            .with_sort_key(SortKey::with_value("sk", ScalarAttributeType::B, "context"));
        let key = table.key("A1");

        assert!(matches!(&key["sk"], AttributeValue::B(blob) if blob.as_ref() == b"context".as_slice()));
        assert_eq!(
            table.definition().key_schema[1].attribute_type,
            ScalarAttributeType::B
        );
    }
}
