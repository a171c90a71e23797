use aws_sdk_dynamodb::types::AttributeValue;

use crate::dynamodb::Attributes;

/// A native DynamoDB item.
///
/// Items are collections of named attributes. Each attribute value carries
/// its own type (String, Number, Binary, Boolean, Null, List, Map, ...), and
/// the maximum item size is 400 KB including attribute names.
///
/// # Example
///
/// ```
/// use context_store::dynamodb::Item;
///
/// let item = Item::new()
///     .set_string("installedAppId", "a1b2")
///     .set_optional_string("locale", None::<String>);
///
/// assert_eq!(item.get_string("installedAppId"), Some("a1b2"));
/// assert!(!item.contains("locale"));
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) attributes: Attributes,
}

impl Item {
    /// Creates a new empty `Item`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an item from a primary key.
    pub fn from_key(key: Attributes) -> Self {
        Self { attributes: key }
    }

    /// Sets a string attribute.
    pub fn set_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a string attribute when `value` is present; absent values are not
    /// written at all.
    pub fn set_optional_string(
        self,
        key: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        match value {
            Some(value) => self.set_string(key, value),
            None => self,
        }
    }

    /// Sets an attribute of any type.
    pub fn set(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Gets the value of an attribute as a string.
    ///
    /// Returns `None` if the attribute doesn't exist or is not a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|av| av.as_s().ok())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Removes an attribute and returns its value.
    pub fn take(&mut self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }
}

impl From<Attributes> for Item {
    fn from(attributes: Attributes) -> Self {
        Self { attributes }
    }
}
