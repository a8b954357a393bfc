//! Attribute filters over documents.
//!
//! A [`Predicate`] is a flat set of `field == value` conditions joined with
//! AND. Matching is a linear scan; there are no indexes, no dotted paths and
//! no numeric coercion (`30` and `30.0` are different values).

use crate::core::types::into_document;
use crate::core::{Collection, Document, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    fields: Map<String, Value>,
}

impl Predicate {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Add an equality condition on a top-level field.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Build a predicate from a JSON object such as `json!({"age": 30})`.
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(Self {
            fields: into_document(value, "predicate")?,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// True iff every condition's field exists in `doc` with an equal value.
    ///
    /// An empty predicate matches nothing.
    pub fn matches(&self, doc: &Document) -> bool {
        !self.fields.is_empty()
            && self
                .fields
                .iter()
                .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

impl From<Document> for Predicate {
    fn from(fields: Document) -> Self {
        Self { fields }
    }
}

/// Documents matching `predicate`, in collection order.
pub fn scan<'a>(docs: &'a Collection, predicate: &Predicate) -> Vec<&'a Document> {
    docs.documents()
        .filter(|doc| predicate.matches(doc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DbError;
    use serde_json::json;

    fn collection(value: Value) -> Collection {
        Collection::from_json(value).unwrap()
    }

    #[test]
    fn test_all_fields_must_match() {
        let doc = json!({"name": "Ann", "age": 30}).as_object().cloned().unwrap();

        assert!(Predicate::new().equals("age", 30).matches(&doc));
        assert!(Predicate::new().equals("age", 30).equals("name", "Ann").matches(&doc));
        assert!(!Predicate::new().equals("age", 30).equals("name", "Bo").matches(&doc));
    }

    #[test]
    fn test_missing_field_excludes_document() {
        let doc = json!({"name": "Ann"}).as_object().cloned().unwrap();
        assert!(!Predicate::new().equals("name", "Ann").equals("age", 30).matches(&doc));
    }

    #[test]
    fn test_no_numeric_coercion() {
        let doc = json!({"age": 30}).as_object().cloned().unwrap();
        assert!(!Predicate::new().equals("age", 30.0).matches(&doc));
        assert!(!Predicate::new().equals("age", "30").matches(&doc));
    }

    #[test]
    fn test_null_is_a_value_not_absence() {
        let doc = json!({"deleted_at": null}).as_object().cloned().unwrap();
        assert!(Predicate::new().equals("deleted_at", Value::Null).matches(&doc));
        assert!(!Predicate::new().equals("missing", Value::Null).matches(&doc));
    }

    #[test]
    fn test_nested_values_compare_structurally() {
        let doc = json!({"tags": ["a", "b"], "meta": {"v": 1}}).as_object().cloned().unwrap();
        assert!(Predicate::new().equals("tags", json!(["a", "b"])).matches(&doc));
        assert!(!Predicate::new().equals("tags", json!(["b", "a"])).matches(&doc));
        assert!(Predicate::new().equals("meta", json!({"v": 1})).matches(&doc));
    }

    #[test]
    fn test_empty_predicate_matches_nothing() {
        let docs = collection(json!({"a": {"x": 1}, "b": {}}));
        assert!(scan(&docs, &Predicate::new()).is_empty());
    }

    #[test]
    fn test_scan_preserves_collection_order() {
        let docs = collection(json!({
            "z": {"k": 1, "n": "z"},
            "a": {"k": 2, "n": "a"},
            "m": {"k": 1, "n": "m"}
        }));
        let predicate = Predicate::new().equals("k", 1);

        let names: Vec<&Value> = scan(&docs, &predicate).into_iter().map(|d| &d["n"]).collect();
        assert_eq!(names, vec![&json!("z"), &json!("m")]);
    }

    #[test]
    fn test_from_json_requires_object() {
        let predicate = Predicate::from_json(json!({"age": 30})).unwrap();
        assert_eq!(predicate.len(), 1);

        let err = Predicate::from_json(json!(30)).unwrap_err();
        assert!(matches!(err, DbError::InvalidValue(_)));
    }
}
