//! Context records and their stored representation

use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dynamodb::schema::*;
use crate::dynamodb::{Item, Table};
use crate::error::CodecError;

/// Everything persisted for one installed app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub installed_app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Named items, see [`ContextStore::set_item`](crate::ContextStore::set_item).
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// How `config` is written.
///
/// Both encodings are always readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigEncoding {
    /// Native DynamoDB values (maps, lists, numbers, ...)
    #[default]
    Native,
    /// A JSON-encoded string, as written by older deployments
    JsonString,
}

/// A `config` or `state` attribute as found on disk.
enum EncodedValue {
    Native(AttributeValue),
    Json(String),
}

impl ContextRecord {
    pub fn new(installed_app_id: impl Into<String>) -> Self {
        Self {
            installed_app_id: installed_app_id.into(),
            ..Self::default()
        }
    }

    /// Builds the full stored item, primary key included.
    pub fn to_item(&self, table: &Table, encoding: ConfigEncoding) -> Result<Item, CodecError> {
        let mut item = Item::from_key(table.key(&self.installed_app_id))
            .set_string(ATTR_INSTALLED_APP_ID, self.installed_app_id.as_str())
            .set_optional_string(ATTR_LOCATION_ID, self.location_id.as_deref())
            .set_optional_string(ATTR_LOCALE, self.locale.as_deref())
            .set_optional_string(ATTR_AUTH_TOKEN, self.auth_token.as_deref())
            .set_optional_string(ATTR_REFRESH_TOKEN, self.refresh_token.as_deref());

        if let Some(config) = &self.config {
            item = item.set(ATTR_CONFIG, encode_config(config, encoding)?);
        }

        let state = serde_dynamo::to_attribute_value(&self.state)?;
        Ok(item.set(ATTR_STATE, state))
    }

    /// Reads a stored item in either the current or the legacy format.
    pub fn from_item(table: &Table, mut item: Item) -> Result<Self, CodecError> {
        let installed_app_id = match take_string(&mut item, ATTR_INSTALLED_APP_ID)? {
            Some(id) => id,
            None => item
                .get_string(table.hash_key())
                .and_then(|partition| table.installed_app_id_from(partition))
                .map(str::to_string)
                .ok_or_else(|| CodecError::MissingField(ATTR_INSTALLED_APP_ID.to_string()))?,
        };

        let config = match item.take(ATTR_CONFIG).and_then(EncodedValue::classify) {
            Some(encoded) => Some(encoded.decode(ATTR_CONFIG)?),
            None => None,
        };

        let state = match item.take(ATTR_STATE).and_then(EncodedValue::classify) {
            Some(encoded) => match encoded.decode(ATTR_STATE)? {
                Value::Object(state) => state,
                Value::Null => Map::new(),
                other => return Err(CodecError::StateNotObject(json_type(&other))),
            },
            None => Map::new(),
        };

        Ok(Self {
            installed_app_id,
            location_id: take_string(&mut item, ATTR_LOCATION_ID)?,
            locale: take_string(&mut item, ATTR_LOCALE)?,
            auth_token: take_string(&mut item, ATTR_AUTH_TOKEN)?,
            refresh_token: take_string(&mut item, ATTR_REFRESH_TOKEN)?,
            config,
            state,
        })
    }
}

impl EncodedValue {
    /// `NULL` counts as absent. Strings are always legacy JSON encodings.
    fn classify(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Null(_) => None,
            AttributeValue::S(json) => Some(Self::Json(json)),
            other => Some(Self::Native(other)),
        }
    }

    fn decode(self, attribute: &'static str) -> Result<Value, CodecError> {
        match self {
            Self::Native(value) => Ok(serde_dynamo::from_attribute_value(value)?),
            Self::Json(json) => serde_json::from_str(&json)
                .map_err(|source| CodecError::MalformedJson { attribute, source }),
        }
    }
}

fn encode_config(config: &Value, encoding: ConfigEncoding) -> Result<AttributeValue, CodecError> {
    match (encoding, config) {
        // a bare string would read back as a legacy encoding
        (ConfigEncoding::JsonString, _) | (ConfigEncoding::Native, Value::String(_)) => {
            Ok(AttributeValue::S(config.to_string()))
        }
        (ConfigEncoding::Native, _) => Ok(serde_dynamo::to_attribute_value(config)?),
    }
}

fn take_string(item: &mut Item, attribute: &'static str) -> Result<Option<String>, CodecError> {
    match item.take(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(value)) => Ok(Some(value)),
        Some(_) => Err(CodecError::IncorrectType(attribute)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamodb::SortKey;
    use serde_json::json;

    fn record() -> ContextRecord {
        ContextRecord {
            installed_app_id: "A1".into(),
            location_id: Some("L1".into()),
            auth_token: Some("t1".into()),
            refresh_token: Some("r1".into()),
            config: Some(json!({"k": "v"})),
            ..ContextRecord::default()
        }
    }

    #[test]
    fn item_carries_key_and_fields() {
        let table = Table::default().with_sort_key(SortKey::new("sk"));
        let item = record().to_item(&table, ConfigEncoding::Native).unwrap();

        assert_eq!(item.get_string("id"), Some("ctx:A1"));
        assert_eq!(item.get_string("sk"), Some("context"));
        assert_eq!(item.get_string(ATTR_INSTALLED_APP_ID), Some("A1"));
        assert_eq!(item.get_string(ATTR_AUTH_TOKEN), Some("t1"));
        assert!(!item.contains(ATTR_LOCALE));
        assert!(matches!(item.attributes()[ATTR_CONFIG], AttributeValue::M(_)));
        assert!(matches!(&item.attributes()[ATTR_STATE], AttributeValue::M(m) if m.is_empty()));
    }

    #[test]
    fn round_trip_defaults_state() {
        let table = Table::default();
        let item = record().to_item(&table, ConfigEncoding::Native).unwrap();
        let decoded = ContextRecord::from_item(&table, item).unwrap();

        assert_eq!(decoded, record());
        assert!(decoded.state.is_empty());
    }

    #[test]
    fn legacy_json_config_matches_native() {
        let table = Table::default();
        let legacy = record()
            .to_item(&table, ConfigEncoding::JsonString)
            .unwrap();
        assert_eq!(legacy.get_string(ATTR_CONFIG), Some(r#"{"k":"v"}"#));

        let native = record().to_item(&table, ConfigEncoding::Native).unwrap();
        assert_eq!(
            ContextRecord::from_item(&table, legacy).unwrap().config,
            ContextRecord::from_item(&table, native).unwrap().config
        );
    }

    #[test]
    fn string_config_survives_native_encoding() {
        let table = Table::default();
        let mut record = record();
        record.config = Some(json!("plain"));

        let item = record.to_item(&table, ConfigEncoding::Native).unwrap();
        let decoded = ContextRecord::from_item(&table, item).unwrap();
        assert_eq!(decoded.config, Some(json!("plain")));
    }

    #[test]
    fn malformed_legacy_config_is_an_error() {
        let table = Table::default();
        let item = Item::from_key(table.key("A1"))
            .set_string(ATTR_INSTALLED_APP_ID, "A1")
            .set_string(ATTR_CONFIG, "{not json");

        let err = ContextRecord::from_item(&table, item).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MalformedJson {
                attribute: ATTR_CONFIG,
                ..
            }
        ));
    }

    #[test]
    fn records_without_state_read_as_empty() {
        let table = Table::default();
        let item = Item::from_key(table.key("A1")).set_string(ATTR_INSTALLED_APP_ID, "A1");

        let decoded = ContextRecord::from_item(&table, item).unwrap();
        assert_eq!(decoded, ContextRecord::new("A1"));
    }

    #[test]
    fn null_state_reads_as_empty() {
        let table = Table::default();
        let item = Item::from_key(table.key("A1"))
            .set_string(ATTR_INSTALLED_APP_ID, "A1")
            .set(ATTR_STATE, AttributeValue::Null(true))
            .set(ATTR_CONFIG, AttributeValue::Null(true));

        let decoded = ContextRecord::from_item(&table, item).unwrap();
        assert!(decoded.state.is_empty());
        assert_eq!(decoded.config, None);
    }

    #[test]
    fn non_map_state_is_rejected() {
        let table = Table::default();
        let item = Item::from_key(table.key("A1"))
            .set_string(ATTR_INSTALLED_APP_ID, "A1")
            .set(ATTR_STATE, AttributeValue::N("3".into()));

        assert!(matches!(
            ContextRecord::from_item(&table, item),
            Err(CodecError::StateNotObject("a number"))
        ));
    }

    #[test]
    fn installed_app_id_recovered_from_hash_key() {
        let table = Table::default().with_prefix("context$");
        let item = Item::from_key(table.key("A1"));

        let decoded = ContextRecord::from_item(&table, item).unwrap();
        assert_eq!(decoded.installed_app_id, "A1");
    }

    #[test]
    fn mistyped_token_is_rejected() {
        let table = Table::default();
        let item = Item::from_key(table.key("A1"))
            .set_string(ATTR_INSTALLED_APP_ID, "A1")
            .set(ATTR_AUTH_TOKEN, AttributeValue::N("1".into()));

        assert!(matches!(
            ContextRecord::from_item(&table, item),
            Err(CodecError::IncorrectType(ATTR_AUTH_TOKEN))
        ));
    }

    #[test]
    fn nested_state_values_round_trip() {
        let table = Table::default();
        let mut record = record();
        record.state.insert("count".into(), json!(5));
        record
            .state
            .insert("profile".into(), json!({"name": "Fred", "tags": ["a", "b"], "admin": false}));

        let item = record.to_item(&table, ConfigEncoding::Native).unwrap();
        assert_eq!(ContextRecord::from_item(&table, item).unwrap(), record);
    }
}
