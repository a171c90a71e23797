//! Error types for the context store

use thiserror::Error;

/// Errors reported by a [`StorageClient`](crate::dynamodb::StorageClient).
///
/// The first four variants are the conditions the store reacts to. Everything
/// else the backend reports ends up in [`StorageError::Unavailable`] untouched.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `describe_table` found no such table
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// `create_table` raced with another creation of the same table
    #[error("table already exists or is being created: {0}")]
    TableInUse(String),

    /// The condition expression attached to a write evaluated to false
    #[error("conditional check failed")]
    ConditionFailed,

    /// An update addressed a nested path whose parent does not exist
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// Transport, throttling, permission or any other backend failure
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn unavailable(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unavailable(err.into())
    }
}

/// Errors from converting between [`ContextRecord`](crate::ContextRecord) and stored items.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("attribute '{attribute}' holds malformed JSON: {source}")]
    MalformedJson {
        attribute: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("attribute '{0}' has an unexpected type")]
    IncorrectType(&'static str),

    #[error("'state' must be a map, found {0}")]
    StateNotObject(&'static str),

    #[error("item has no '{0}' attribute")]
    MissingField(String),

    #[error("could not convert attribute value: {0}")]
    Conversion(#[from] serde_dynamo::Error),
}

/// Errors raised while compiling an [`Update`](crate::Update).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("update has no actions")]
    Empty,

    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("value for '{path}' cannot be stored: {message}")]
    Value { path: String, message: String },

    #[error("placeholder '{placeholder}' would name both '{first}' and '{second}'")]
    PlaceholderCollision {
        placeholder: String,
        first: String,
        second: String,
    },
}

/// Errors returned by [`ContextStore`](crate::ContextStore) operations.
#[derive(Debug, Error)]
pub enum ContextStoreError {
    #[error(transparent)]
    StorageUnavailable(StorageError),

    #[error("no context record for installed app '{0}'")]
    RecordNotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not provision table: {0}")]
    Provisioning(#[source] StorageError),
}

impl From<StorageError> for ContextStoreError {
    fn from(err: StorageError) -> Self {
        Self::StorageUnavailable(err)
    }
}

/// Result type for context store operations
pub type Result<T> = std::result::Result<T, ContextStoreError>;
