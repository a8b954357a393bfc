/// Store API tests
///
/// Mutation, lookup and attribute-query behaviour of `Store`.
/// Run with: cargo test --test store_tests
use serde_json::{Value, json};
use std::collections::HashSet;
use tempfile::TempDir;
use touchdb::{DbError, Predicate, Store, StoreConfig};

fn open(dir: &TempDir, auto_dump: bool) -> Store {
    let config = StoreConfig::new(dir.path().join("store.json"))
        .auto_dump(auto_dump)
        .install_signal_handler(false);
    Store::open_with_config(config).unwrap()
}

#[test]
fn test_attribute_scenario() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);

    assert_eq!(store.insert_with_key("u1", json!({"name": "Ann", "age": 30})).unwrap(), "u1");
    assert_eq!(store.insert_with_key("u2", json!({"name": "Bo", "age": 30})).unwrap(), "u2");

    let age_30 = Predicate::new().equals("age", 30);
    let found: Vec<Value> = store
        .get_by_attribute(&age_30)
        .into_iter()
        .map(|doc| Value::Object(doc.clone()))
        .collect();
    assert_eq!(
        found,
        vec![json!({"name": "Ann", "age": 30}), json!({"name": "Bo", "age": 30})]
    );

    assert!(store.remove_by_attribute(&age_30).unwrap());
    assert!(!store.exists("u1"));
    assert!(!store.exists("u2"));
    assert_eq!(store.total_keys(None).unwrap(), 0);
}

#[test]
fn test_get_missing_key_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, false);

    let err = store.get("nobody").unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref key) if key == "nobody"));
}

#[test]
fn test_generated_keys_are_unique() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);

    let keys: Vec<String> = (0..200)
        .map(|i| store.insert(json!({"i": i})).unwrap())
        .collect();

    let distinct: HashSet<&String> = keys.iter().collect();
    assert_eq!(distinct.len(), keys.len());
    assert_eq!(store.len(), 200);
}

#[test]
fn test_get_by_attribute_is_stable() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);
    for (key, team) in [("a", "red"), ("b", "blue"), ("c", "red"), ("d", "red")] {
        store.insert_with_key(key, json!({"team": team, "key": key})).unwrap();
    }

    let red = Predicate::new().equals("team", "red");
    let first = store.get_by_attribute(&red);
    let second = store.get_by_attribute(&red);

    assert_eq!(first, second);
    let keys: Vec<&Value> = first.iter().map(|doc| &doc["key"]).collect();
    assert_eq!(keys, vec![&json!("a"), &json!("c"), &json!("d")]);
}

#[test]
fn test_get_by_attribute_requires_every_field() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);
    store.insert_with_key("full", json!({"name": "Ann", "age": 30})).unwrap();
    store.insert_with_key("partial", json!({"name": "Ann"})).unwrap();

    let predicate = Predicate::from_json(json!({"name": "Ann", "age": 30})).unwrap();
    let found = store.get_by_attribute(&predicate);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["age"], json!(30));
}

#[test]
fn test_remove_reports_presence() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("a", json!({})).unwrap();

    assert!(store.remove("a").unwrap());
    assert!(!store.remove("a").unwrap());
}

#[test]
fn test_remove_by_attribute_without_match() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("a", json!({"x": 1})).unwrap();

    assert!(!store.remove_by_attribute(&Predicate::new().equals("x", 2)).unwrap());
    assert!(!store.remove_by_attribute(&Predicate::new()).unwrap());
    assert!(store.exists("a"));
}

#[test]
fn test_add_merges_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("k", json!({"keep": true})).unwrap();

    store.add("k", json!({"a": 1})).unwrap();
    store.add("k", json!({"b": 2})).unwrap();
    store.add("k", json!({"a": 3})).unwrap();

    assert_eq!(
        Value::Object(store.get("k").unwrap().clone()),
        json!({"keep": true, "a": 3, "b": 2})
    );
}

#[test]
fn test_add_to_missing_key_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("k", json!({"a": 1})).unwrap();
    let before = store.get_all().clone();

    let err = store.add("missing", json!({"a": 2})).unwrap_err();

    assert!(matches!(err, DbError::NotFound(_)));
    assert_eq!(store.get_all(), &before);
    assert!(!store.exists("missing"));
}

#[test]
fn test_add_rejects_non_object_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);
    store.insert_with_key("k", json!({"a": 1})).unwrap();

    let err = store.add("k", json!(["a", 2])).unwrap_err();
    assert!(matches!(err, DbError::InvalidValue(_)));
    assert_eq!(store.total_keys(Some("k")).unwrap(), 1);
}

#[test]
fn test_extend_inserts_batch() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("old", json!({"v": 0})).unwrap();

    store
        .extend(json!({
            "old": {"v": 1},
            "new1": {"v": 2},
            "new2": {"v": 3}
        }))
        .unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.get("old").unwrap()["v"], json!(1));
    assert_eq!(store.get_all_keys(None).unwrap(), vec!["old", "new1", "new2"]);
}

#[test]
fn test_extend_is_all_or_nothing() {
    for auto_dump in [true, false] {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir, auto_dump);
        store.insert_with_key("existing", json!({"v": 0})).unwrap();
        let before = store.get_all().clone();

        let err = store
            .extend(json!({
                "n1": {"v": 1},
                "n2": {"v": 2},
                "bad": "not a document",
                "n3": {"v": 3}
            }))
            .unwrap_err();

        match err {
            DbError::InvalidValue(msg) => assert!(msg.contains("'bad'")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get_all(), &before);
        for key in ["n1", "n2", "n3", "bad"] {
            assert!(!store.exists(key));
        }
    }
}

#[test]
fn test_total_keys_and_get_all_keys() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);
    store.insert_with_key("a", json!({"x": 1, "y": 2, "z": 3})).unwrap();
    store.insert_with_key("b", json!({})).unwrap();

    assert_eq!(store.total_keys(None).unwrap(), 2);
    assert_eq!(store.total_keys(Some("a")).unwrap(), 3);
    assert_eq!(store.total_keys(Some("b")).unwrap(), 0);
    assert!(matches!(store.total_keys(Some("c")), Err(DbError::NotFound(_))));

    assert_eq!(store.get_all_keys(None).unwrap(), vec!["a", "b"]);
    assert_eq!(store.get_all_keys(Some("a")).unwrap(), vec!["x", "y", "z"]);
    assert!(matches!(store.get_all_keys(Some("c")), Err(DbError::NotFound(_))));
}

#[test]
fn test_delete_all() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, true);
    store.insert_with_key("a", json!({})).unwrap();
    store.insert(json!({"b": 1})).unwrap();

    store.delete_all().unwrap();

    assert!(store.is_empty());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
}

#[test]
fn test_get_all_is_a_read_only_view() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir, false);
    store.insert_with_key("a", json!({"n": 1})).unwrap();

    let mut copy = store.get_all().as_json().clone();
    copy.insert("b".to_string(), json!({"n": 2}));

    assert!(!store.exists("b"));
    assert_eq!(store.get_all().len(), 1);
}
