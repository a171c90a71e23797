use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, TableStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dynamodb::{Attributes, StorageClient, TableDefinition};
use crate::error::StorageError;
use crate::expression::CompiledUpdate;

const INVALID_PATH: &str = "The document path provided in the update expression is invalid for update";

/// In-process [`StorageClient`].
///
/// Behaves like a single DynamoDB endpoint: tables have to be created before
/// use, keys must match the table's key schema, and `update_item` evaluates
/// the `SET` / `REMOVE` clauses and `attribute_exists` / `attribute_not_exists`
/// conditions that [`Update`](crate::Update) compiles to. Updates apply
/// atomically and, like DynamoDB, create the item when no condition prevents
/// it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<HashMap<String, MemoryTable>>,
    unavailable: AtomicBool,
    requests: AtomicUsize,
}

#[derive(Debug)]
struct MemoryTable {
    definition: TableDefinition,
    items: HashMap<String, Attributes>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every request fails with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Raw access to a stored item, bypassing the store.
    pub fn item(&self, table_name: &str, key: &Attributes) -> Option<Attributes> {
        let tables = self.tables();
        let table = tables.get(table_name)?;
        let key = table.key_id(key).ok()?;
        table.items.get(&key).cloned()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<(), StorageError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("service unavailable"));
        }
        Ok(())
    }

    fn with_table<T>(
        &self,
        table_name: &str,
        f: impl FnOnce(&mut MemoryTable) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.begin()?;
        let mut tables = self.tables();
        let table = tables.get_mut(table_name).ok_or_else(|| {
            StorageError::unavailable(format!(
                "ResourceNotFoundException: Requested resource not found: {table_name}"
            ))
        })?;
        f(table)
    }
}

impl MemoryTable {
    /// Canonical identity of a key, checked against the key schema.
    fn key_id(&self, key: &Attributes) -> Result<String, StorageError> {
        let mut parts = Vec::with_capacity(self.definition.key_schema.len());
        for element in &self.definition.key_schema {
            let value = key.get(&element.name).ok_or_else(|| {
                StorageError::unavailable(format!(
                    "ValidationException: missing key attribute '{}'",
                    element.name
                ))
            })?;
            parts.push(format!("{}={:?}", element.name, value));
        }
        if key.len() != parts.len() {
            return Err(StorageError::unavailable(
                "ValidationException: key has attributes outside the key schema",
            ));
        }
        Ok(parts.join("|"))
    }

    fn key_of(&self, item: &Attributes) -> Attributes {
        self.definition
            .key_schema
            .iter()
            .filter_map(|element| {
                item.get(&element.name)
                    .map(|value| (element.name.clone(), value.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn get_item(
        &self,
        table_name: &str,
        key: Attributes,
        _consistent_read: bool,
    ) -> Result<Option<Attributes>, StorageError> {
        self.with_table(table_name, |table| {
            let id = table.key_id(&key)?;
            Ok(table.items.get(&id).cloned())
        })
    }

    async fn put_item(&self, table_name: &str, item: Attributes) -> Result<(), StorageError> {
        self.with_table(table_name, |table| {
            let id = table.key_id(&table.key_of(&item))?;
            table.items.insert(id, item);
            Ok(())
        })
    }

    async fn update_item(
        &self,
        table_name: &str,
        key: Attributes,
        update: &CompiledUpdate,
    ) -> Result<(), StorageError> {
        self.with_table(table_name, |table| {
            let id = table.key_id(&key)?;
            let current = table.items.get(&id);

            if let Some(condition) = &update.condition_expression {
                if !evaluate_condition(condition, update, current)? {
                    return Err(StorageError::ConditionFailed);
                }
            }

            let mut item = current.cloned().unwrap_or_else(|| key.clone());
            apply_update(&mut item, update)?;
            table.items.insert(id, item);
            Ok(())
        })
    }

    async fn delete_item(&self, table_name: &str, key: Attributes) -> Result<(), StorageError> {
        self.with_table(table_name, |table| {
            let id = table.key_id(&key)?;
            table.items.remove(&id);
            Ok(())
        })
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, StorageError> {
        self.begin()?;
        if self.tables().contains_key(table_name) {
            Ok(TableStatus::Active)
        } else {
            Err(StorageError::TableNotFound(table_name.to_string()))
        }
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StorageError> {
        self.begin()?;
        let mut tables = self.tables();
        if tables.contains_key(&definition.name) {
            return Err(StorageError::TableInUse(definition.name.clone()));
        }
        tables.insert(
            definition.name.clone(),
            MemoryTable {
                definition: definition.clone(),
                items: HashMap::new(),
            },
        );
        Ok(())
    }
}

fn malformed(expression: &str) -> StorageError {
    StorageError::unavailable(format!(
        "ValidationException: unsupported expression '{expression}'"
    ))
}

/// Resolves `#a.#a_b` to `["a", "b"]`.
fn resolve_path(path: &str, update: &CompiledUpdate) -> Result<Vec<String>, StorageError> {
    path.trim()
        .split('.')
        .map(|token| {
            if token.starts_with('#') {
                update
                    .expression_attribute_names
                    .get(token)
                    .cloned()
                    .ok_or_else(|| malformed(token))
            } else if token.is_empty() {
                Err(malformed(path))
            } else {
                Ok(token.to_string())
            }
        })
        .collect()
}

fn lookup<'a>(item: &'a Attributes, path: &[String]) -> Option<&'a AttributeValue> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(item.get(first)?, |value, segment| match value {
        AttributeValue::M(map) => map.get(segment),
        _ => None,
    })
}

fn evaluate_condition(
    condition: &str,
    update: &CompiledUpdate,
    item: Option<&Attributes>,
) -> Result<bool, StorageError> {
    for term in condition.split(" AND ") {
        let term = term.trim();
        let (exists, inner) = if let Some(inner) = term.strip_prefix("attribute_exists(") {
            (true, inner)
        } else if let Some(inner) = term.strip_prefix("attribute_not_exists(") {
            (false, inner)
        } else {
            return Err(malformed(term));
        };
        let path = resolve_path(inner.strip_suffix(')').ok_or_else(|| malformed(term))?, update)?;
        let present = item.and_then(|item| lookup(item, &path)).is_some();
        if present != exists {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply_update(item: &mut Attributes, update: &CompiledUpdate) -> Result<(), StorageError> {
    let expression = update.update_expression.trim();
    let (set_part, remove_part) = if let Some(rest) = expression.strip_prefix("SET ") {
        match rest.split_once(" REMOVE ") {
            Some((set, remove)) => (Some(set), Some(remove)),
            None => (Some(rest), None),
        }
    } else if let Some(rest) = expression.strip_prefix("REMOVE ") {
        (None, Some(rest))
    } else {
        return Err(malformed(expression));
    };

    for clause in set_part.into_iter().flat_map(|part| part.split(", ")) {
        let (path, placeholder) = clause.split_once(" = ").ok_or_else(|| malformed(clause))?;
        let value = update
            .expression_attribute_values
            .get(placeholder.trim())
            .cloned()
            .ok_or_else(|| malformed(clause))?;
        set_path(item, &resolve_path(path, update)?, value)?;
    }

    for path in remove_part.into_iter().flat_map(|part| part.split(", ")) {
        remove_path(item, &resolve_path(path, update)?)?;
    }

    Ok(())
}

/// The map holding the last segment of `path`; nested parents must exist.
fn parent_map<'a>(
    item: &'a mut Attributes,
    path: &[String],
) -> Result<&'a mut HashMap<String, AttributeValue>, StorageError> {
    let invalid = || StorageError::InvalidPath(INVALID_PATH.to_string());
    let (first, rest) = path.split_first().ok_or_else(invalid)?;
    let mut map = match item.get_mut(first) {
        Some(AttributeValue::M(map)) => map,
        _ => return Err(invalid()),
    };
    for segment in &rest[..rest.len().saturating_sub(1)] {
        map = match map.get_mut(segment) {
            Some(AttributeValue::M(inner)) => inner,
            _ => return Err(invalid()),
        };
    }
    Ok(map)
}

fn set_path(item: &mut Attributes, path: &[String], value: AttributeValue) -> Result<(), StorageError> {
    match path {
        [] => Err(StorageError::InvalidPath(INVALID_PATH.to_string())),
        [name] => {
            item.insert(name.clone(), value);
            Ok(())
        }
        [.., last] => {
            parent_map(item, path)?.insert(last.clone(), value);
            Ok(())
        }
    }
}

fn remove_path(item: &mut Attributes, path: &[String]) -> Result<(), StorageError> {
    match path {
        [] => Err(StorageError::InvalidPath(INVALID_PATH.to_string())),
        [name] => {
            item.remove(name);
            Ok(())
        }
        [.., last] => {
            parent_map(item, path)?.remove(last);
            Ok(())
        }
    }
}
