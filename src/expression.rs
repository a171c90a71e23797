//! Partial-write compilation
//!
//! An [`Update`] lists the document paths to set or remove on one item. It
//! compiles to a DynamoDB update expression in which every path segment is
//! referenced through a `#name` placeholder and every value through a
//! `:value` placeholder, so neither reserved words nor caller data ever reach
//! the expression grammar.
//!
//! Placeholders are derived from the path alone:
//!
//! ```text
//! state.count  ->  #state.#state_count = :state_count
//!                  #state       => "state"
//!                  #state_count => "count"
//! ```
//!
//! Characters outside `[A-Za-z0-9_]` are written as `_` followed by their
//! lowercase hex code point (`my-key` becomes `my_2dkey`).

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ExpressionError;

/// A partial write against a single item.
///
/// # Example
///
/// ```
/// use context_store::Update;
///
/// let compiled = Update::new()
///     .set("authToken", "t2")
///     .set("state.count", 5)
///     .compile()
///     .unwrap();
///
/// assert_eq!(
///     compiled.update_expression,
///     "SET #authToken = :authToken, #state.#state_count = :state_count"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    actions: Vec<Action>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Set { path: Path, value: Value },
    Remove { path: Path },
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Exists(String),
    NotExists(String),
}

/// A document path, one entry per map key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Path(Vec<String>);

impl Path {
    fn parse(dotted: &str) -> Self {
        Path(dotted.split('.').map(str::to_string).collect())
    }

    fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(segments.into_iter().map(Into::into).collect())
    }

    fn segments(&self) -> Result<&[String], ExpressionError> {
        if self.0.is_empty() || self.0.iter().any(|segment| segment.is_empty()) {
            return Err(ExpressionError::EmptySegment(self.to_string()));
        }
        Ok(&self.0)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// The parameters of an `UpdateItem` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUpdate {
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

impl Action {
    fn path(&self) -> &Path {
        match self {
            Action::Set { path, .. } | Action::Remove { path } => path,
        }
    }
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attribute at the dotted `path`. Setting a path again replaces
    /// the earlier action for it.
    pub fn set(self, path: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.push_set(Path::parse(path.as_ref()), value.into())
    }

    /// Like [`Update::set`], but takes the path one map key at a time, so keys
    /// may themselves contain dots.
    pub fn set_at<I, S>(self, segments: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_set(Path::from_segments(segments), value.into())
    }

    /// Removes the attribute at the dotted `path`.
    pub fn remove(self, path: impl AsRef<str>) -> Self {
        self.push_remove(Path::parse(path.as_ref()))
    }

    /// Removes the attribute at a path given one map key at a time.
    pub fn remove_at<I, S>(self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_remove(Path::from_segments(segments))
    }

    /// Only apply the update if the top-level attribute `name` exists on the
    /// item. The name is taken literally, dots included.
    pub fn require_exists(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(Condition::Exists(name.into()));
        self
    }

    /// Only apply the update if the top-level attribute `name` does not exist
    /// on the item.
    pub fn require_absent(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(Condition::NotExists(name.into()));
        self
    }

    /// True when the update has nothing to write. Conditions alone don't count.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn push_set(mut self, path: Path, value: Value) -> Self {
        self.actions.retain(|action| *action.path() != path);
        self.actions.push(Action::Set { path, value });
        self
    }

    fn push_remove(mut self, path: Path) -> Self {
        self.actions.retain(|action| *action.path() != path);
        self.actions.push(Action::Remove { path });
        self
    }

    pub fn compile(&self) -> Result<CompiledUpdate, ExpressionError> {
        if self.actions.is_empty() {
            return Err(ExpressionError::Empty);
        }

        let mut placeholders = Placeholders::default();
        let mut set_clauses = Vec::new();
        let mut remove_clauses = Vec::new();

        for action in &self.actions {
            match action {
                Action::Set { path, value } => {
                    let target = placeholders.name_path(path)?;
                    let value_key = placeholders.value(path, value)?;
                    set_clauses.push(format!("{target} = {value_key}"));
                }
                Action::Remove { path } => remove_clauses.push(placeholders.name_path(path)?),
            }
        }

        let mut update_expression = String::new();
        if !set_clauses.is_empty() {
            update_expression.push_str("SET ");
            update_expression.push_str(&set_clauses.join(", "));
        }
        if !remove_clauses.is_empty() {
            if !update_expression.is_empty() {
                update_expression.push(' ');
            }
            update_expression.push_str("REMOVE ");
            update_expression.push_str(&remove_clauses.join(", "));
        }

        let mut conditions = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            conditions.push(match condition {
                Condition::Exists(name) => {
                    format!("attribute_exists({})", placeholders.attribute(name)?)
                }
                Condition::NotExists(name) => {
                    format!("attribute_not_exists({})", placeholders.attribute(name)?)
                }
            });
        }
        let condition_expression = (!conditions.is_empty()).then(|| conditions.join(" AND "));

        Ok(CompiledUpdate {
            update_expression,
            condition_expression,
            expression_attribute_names: placeholders.names,
            expression_attribute_values: placeholders.values,
        })
    }
}

impl From<serde_json::Map<String, Value>> for Update {
    fn from(fields: serde_json::Map<String, Value>) -> Self {
        fields.into_iter().collect()
    }
}

impl<P: AsRef<str>> FromIterator<(P, Value)> for Update {
    fn from_iter<I: IntoIterator<Item = (P, Value)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Update::new(), |update, (path, value)| update.set(path, value))
    }
}

#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    value_paths: HashMap<String, Path>,
}

impl Placeholders {
    /// `#a.#a_b.#a_b_c` for `a.b.c`, registering each name placeholder.
    fn name_path(&mut self, path: &Path) -> Result<String, ExpressionError> {
        let mut chain = String::new();
        let mut parts = Vec::new();
        for (i, segment) in path.segments()?.iter().enumerate() {
            if i > 0 {
                chain.push('_');
            }
            push_token(&mut chain, segment);
            let placeholder = format!("#{chain}");
            self.bind_name(&placeholder, segment)?;
            parts.push(placeholder);
        }
        Ok(parts.join("."))
    }

    /// A placeholder for the top-level attribute `name`. Reuses an existing
    /// binding for the same literal, otherwise picks a free `#<token>_<n>`.
    fn attribute(&mut self, name: &str) -> Result<String, ExpressionError> {
        if name.is_empty() {
            return Err(ExpressionError::EmptySegment(String::new()));
        }
        let mut token = String::new();
        push_token(&mut token, name);

        let mut placeholder = format!("#{token}");
        let mut n = 0;
        loop {
            match self.names.get(&placeholder) {
                Some(existing) if existing == name => return Ok(placeholder),
                Some(_) => {
                    n += 1;
                    placeholder = format!("#{token}_{n}");
                }
                None => {
                    self.names.insert(placeholder.clone(), name.to_string());
                    return Ok(placeholder);
                }
            }
        }
    }

    fn value(&mut self, path: &Path, value: &Value) -> Result<String, ExpressionError> {
        let tokens: Vec<String> = path
            .segments()?
            .iter()
            .map(|segment| {
                let mut token = String::new();
                push_token(&mut token, segment);
                token
            })
            .collect();
        let placeholder = format!(":{}", tokens.join("_"));

        if let Some(owner) = self.value_paths.get(&placeholder) {
            if owner != path {
                return Err(ExpressionError::PlaceholderCollision {
                    placeholder,
                    first: owner.to_string(),
                    second: path.to_string(),
                });
            }
        }

        let attribute =
            serde_dynamo::to_attribute_value(value).map_err(|err| ExpressionError::Value {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        self.value_paths.insert(placeholder.clone(), path.clone());
        self.values.insert(placeholder.clone(), attribute);
        Ok(placeholder)
    }

    fn bind_name(&mut self, placeholder: &str, literal: &str) -> Result<(), ExpressionError> {
        match self.names.get(placeholder) {
            Some(existing) if existing != literal => Err(ExpressionError::PlaceholderCollision {
                placeholder: placeholder.to_string(),
                first: existing.clone(),
                second: literal.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.names
                    .insert(placeholder.to_string(), literal.to_string());
                Ok(())
            }
        }
    }
}

fn push_token(out: &mut String, segment: &str) {
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push_str(&format!("_{:x}", c as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn flat_field() {
        let compiled = Update::new().set("authToken", "t2").compile().unwrap();

        assert_eq!(compiled.update_expression, "SET #authToken = :authToken");
        assert_eq!(compiled.condition_expression, None);
        assert_eq!(
            compiled.expression_attribute_names,
            names(&[("#authToken", "authToken")])
        );
        assert_eq!(
            compiled.expression_attribute_values[":authToken"],
            AttributeValue::S("t2".into())
        );
    }

    #[test]
    fn nested_path_builds_placeholder_chain() {
        let compiled = Update::new().set("state.count", 1).compile().unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #state.#state_count = :state_count"
        );
        assert_eq!(
            compiled.expression_attribute_names,
            names(&[("#state", "state"), ("#state_count", "count")])
        );
        assert_eq!(
            compiled.expression_attribute_values[":state_count"],
            AttributeValue::N("1".into())
        );
    }

    #[test]
    fn clauses_keep_insertion_order() {
        let compiled = Update::new()
            .set("refreshToken", "r2")
            .set("authToken", "t2")
            .set("config", json!({"k": "v"}))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #refreshToken = :refreshToken, #authToken = :authToken, #config = :config"
        );
        assert!(matches!(
            compiled.expression_attribute_values[":config"],
            AttributeValue::M(_)
        ));
    }

    #[test]
    fn reserved_words_only_appear_as_names() {
        let compiled = Update::new().set("name", "Fred").compile().unwrap();
        assert_eq!(compiled.update_expression, "SET #name = :name");
        assert_eq!(compiled.expression_attribute_names["#name"], "name");
    }

    #[test]
    fn special_characters_are_escaped() {
        let compiled = Update::new().set("state.my-key", true).compile().unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #state.#state_my_2dkey = :state_my_2dkey"
        );
        assert_eq!(compiled.expression_attribute_names["#state_my_2dkey"], "my-key");
    }

    #[test]
    fn expression_text_cannot_be_injected() {
        let path = "state.x = :v, #other";
        let compiled = Update::new().set(path, 1).compile().unwrap();

        let clause = compiled.update_expression.trim_start_matches("SET ");
        assert_eq!(clause.matches(" = ").count(), 1);
        assert!(!clause.contains(','));
        assert!(!clause.contains(":v"));
        assert!(compiled
            .expression_attribute_names
            .values()
            .any(|literal| literal == "x = :v, #other"));
    }

    #[test]
    fn remove_and_set_together() {
        let compiled = Update::new()
            .set("state.a", 1)
            .remove("state.b")
            .compile()
            .unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #state.#state_a = :state_a REMOVE #state.#state_b"
        );
        assert_eq!(compiled.expression_attribute_values.len(), 1);
    }

    #[test]
    fn remove_only_has_no_values() {
        let compiled = Update::new().remove("state.count").compile().unwrap();
        assert_eq!(compiled.update_expression, "REMOVE #state.#state_count");
        assert!(compiled.expression_attribute_values.is_empty());
    }

    #[test]
    fn conditions_share_placeholders() {
        let compiled = Update::new()
            .set("state", json!({}))
            .require_exists("id")
            .require_absent("state")
            .compile()
            .unwrap();

        assert_eq!(
            compiled.condition_expression.as_deref(),
            Some("attribute_exists(#id) AND attribute_not_exists(#state)")
        );
        assert_eq!(
            compiled.expression_attribute_names,
            names(&[("#state", "state"), ("#id", "id")])
        );
    }

    #[test]
    fn setting_a_path_twice_keeps_the_last_value() {
        let compiled = Update::new()
            .set("authToken", "t1")
            .set("authToken", "t2")
            .compile()
            .unwrap();

        assert_eq!(compiled.update_expression, "SET #authToken = :authToken");
        assert_eq!(
            compiled.expression_attribute_values[":authToken"],
            AttributeValue::S("t2".into())
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let update = Update::new().set("state.count", 1).set("locale", "en-US");
        assert_eq!(update.compile().unwrap(), update.compile().unwrap());
    }

    #[test]
    fn empty_update_is_rejected() {
        assert_eq!(Update::new().compile(), Err(ExpressionError::Empty));
        assert_eq!(
            Update::new().require_exists("id").compile(),
            Err(ExpressionError::Empty)
        );
    }

    #[test]
    fn empty_segments_are_rejected() {
        for path in ["", "state.", ".count", "state..count"] {
            assert_eq!(
                Update::new().set(path, 1).compile(),
                Err(ExpressionError::EmptySegment(path.to_string()))
            );
        }
    }

    #[test]
    fn colliding_placeholders_are_rejected() {
        let result = Update::new().set("a_b", 1).set("a.b", 2).compile();
        assert!(matches!(
            result,
            Err(ExpressionError::PlaceholderCollision { .. })
        ));
    }

    #[test]
    fn from_json_map() {
        let fields = json!({"authToken": "t2", "state.count": 3});
        let update = Update::from(fields.as_object().cloned().unwrap());
        let compiled = update.compile().unwrap();

        assert_eq!(compiled.expression_attribute_values.len(), 2);
        assert_eq!(compiled.expression_attribute_names.len(), 3);
    }

    #[test]
    fn segment_paths_keep_dots_inside_keys() {
        let compiled = Update::new()
            .set_at(["state", "a.b"], 1)
            .compile()
            .unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #state.#state_a_2eb = :state_a_2eb"
        );
        assert_eq!(compiled.expression_attribute_names["#state_a_2eb"], "a.b");
    }

    #[test]
    fn remove_at_replaces_earlier_set() {
        let compiled = Update::new()
            .set_at(["state", "count"], 1)
            .remove_at(["state", "count"])
            .compile()
            .unwrap();

        assert_eq!(compiled.update_expression, "REMOVE #state.#state_count");
    }

    #[test]
    fn condition_names_are_not_split_on_dots() {
        let compiled = Update::new()
            .set("authToken", "t")
            .require_exists("ctx.id")
            .compile()
            .unwrap();

        assert_eq!(
            compiled.condition_expression.as_deref(),
            Some("attribute_exists(#ctx_2eid)")
        );
        assert_eq!(compiled.expression_attribute_names["#ctx_2eid"], "ctx.id");
    }

    #[test]
    fn condition_names_avoid_taken_placeholders() {
        let compiled = Update::new()
            .set_at(["state", "count"], 1)
            .require_exists("state_count")
            .compile()
            .unwrap();

        assert_eq!(
            compiled.update_expression,
            "SET #state.#state_count = :state_count"
        );
        assert_eq!(
            compiled.condition_expression.as_deref(),
            Some("attribute_exists(#state_count_1)")
        );
        assert_eq!(compiled.expression_attribute_names["#state_count"], "count");
        assert_eq!(
            compiled.expression_attribute_names["#state_count_1"],
            "state_count"
        );
    }
}
