use super::{DbError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// A single record: field name to JSON value. No schema is enforced.
pub type Document = Map<String, Value>;

/// The full set of documents held by a store, keyed by unique string keys.
///
/// Every value is guaranteed to be a JSON object; the invariant is checked on
/// load and on every insertion. Keys keep their insertion order so dumps are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Collection {
    docs: Map<String, Value>,
}

impl Collection {
    pub fn new() -> Self {
        Self { docs: Map::new() }
    }

    /// Build a collection from a parsed top-level JSON value.
    ///
    /// Returns a human-readable reason when the value is not an object of
    /// objects.
    pub fn from_json(value: Value) -> std::result::Result<Self, String> {
        let docs = match value {
            Value::Object(docs) => docs,
            other => {
                return Err(format!(
                    "top-level value must be an object, found {}",
                    json_type_name(&other)
                ));
            }
        };

        if let Some((key, doc)) = docs.iter().find(|(_, doc)| !doc.is_object()) {
            return Err(format!(
                "document '{}' must be an object, found {}",
                key,
                json_type_name(doc)
            ));
        }

        Ok(Self { docs })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.docs.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.docs.get(key).and_then(Value::as_object)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.docs.get_mut(key).and_then(Value::as_object_mut)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.docs.keys()
    }

    /// Iterate documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Document)> {
        self.docs
            .iter()
            .filter_map(|(key, doc)| doc.as_object().map(|doc| (key, doc)))
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values().filter_map(Value::as_object)
    }

    /// Borrow the collection as the JSON object it serializes to.
    pub fn as_json(&self) -> &Map<String, Value> {
        &self.docs
    }

    pub(crate) fn insert(&mut self, key: String, doc: Document) -> Option<Document> {
        match self.docs.insert(key, Value::Object(doc)) {
            Some(Value::Object(previous)) => Some(previous),
            _ => None,
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Document> {
        match self.docs.shift_remove(key) {
            Some(Value::Object(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Keep only the documents for which `keep` returns true. Returns the
    /// number of documents removed.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Document) -> bool) -> usize {
        let before = self.docs.len();
        self.docs
            .retain(|_, doc| doc.as_object().map(|doc| keep(doc)).unwrap_or(false));
        before - self.docs.len()
    }

    pub(crate) fn clear(&mut self) {
        self.docs.clear();
    }
}

/// Require `value` to be a JSON object and hand back the document inside it.
pub fn into_document(value: Value, context: &str) -> Result<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(DbError::InvalidValue(format!(
            "{} must be an object, got {}",
            context,
            json_type_name(&other)
        ))),
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
