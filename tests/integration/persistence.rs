//! Save, delete and find through the public model API.

use crate::common::{attrs, Fixture};
use eloquent::ChangeKind;
use serde_json::{json, Value as JsonValue};

#[test]
fn test_saved_models_have_a_clean_snapshot() {
    let fixture = Fixture::new();
    let mut user = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(user.save());
    assert!(user.get_changes().is_empty());
    assert_eq!(user.get_persisted_attributes(), Some(user.get_attributes()));

    user.set_attribute("age", 43);
    assert!(user.save());
    assert!(user.get_changes().is_empty());
    assert_eq!(user.get_persisted_attributes(), Some(user.get_attributes()));
}

#[test]
fn test_save_is_not_repeated_without_changes() {
    let fixture = Fixture::new();
    let mut user = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(user.save());
    assert!(!user.save());
    assert_eq!(fixture.count("users"), 1);
    assert_eq!(
        *fixture.changes.borrow(),
        vec![(ChangeKind::Insert, "User".to_string())]
    );
}

#[test]
fn test_failed_saves_keep_their_changes() {
    let fixture = Fixture::new();
    let mut james = fixture.model("User", json!({"name": "James"}));
    assert!(!james.save());
    assert!(james.get_persisted_attributes().is_none());
    assert_eq!(james.get_changes(), &attrs(json!({"name": "James"})));

    let mut john = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(john.save());
    john.set_attribute("age", JsonValue::Null);
    assert!(!john.save());
    assert_eq!(john.get_changes(), &attrs(json!({"age": null})));
    assert_eq!(fixture.changes.borrow().len(), 1);
}

#[test]
fn test_keyless_entities_are_never_found() {
    let fixture = Fixture::new();
    let mut row = fixture.model("NoKey", json!({"field": "abc", "value": "123"}));
    assert!(row.save());
    assert_eq!(fixture.count("no_keys"), 1);
    assert!(row.find("abc").expect("Failed to find").is_none());
    assert!(row.find(1).expect("Failed to find").is_none());
}

#[test]
fn test_keyless_saves_insert_every_time() {
    let fixture = Fixture::new();
    let mut row = fixture.model("NoKey", json!({"field": "abc", "value": "123"}));
    assert!(row.save());
    assert!(row.save());
    assert_eq!(fixture.count("no_keys"), 2);
    assert_eq!(
        *fixture.changes.borrow(),
        vec![
            (ChangeKind::Insert, "NoKey".to_string()),
            (ChangeKind::Insert, "NoKey".to_string())
        ]
    );
}

#[test]
fn test_insert_reads_back_unset_columns() {
    let fixture = Fixture::new();
    let mut user = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(user.save());
    assert_eq!(user.get_attributes().get("town_id"), Some(&JsonValue::Null));

    let found = user
        .find(user.key().cloned().unwrap_or_default())
        .expect("Failed to find")
        .expect("Missing user");
    assert_eq!(found.get_attributes(), user.get_attributes());
}

#[test]
fn test_keyless_delete_only_removes_exact_matches() {
    let fixture = Fixture::new();
    for (field, value) in [("John", "1"), ("John", "2"), ("Jim", "1")] {
        let mut row = fixture.model("NoKey", json!({"field": field, "value": value}));
        assert!(row.save());
    }

    let mut john = fixture.model("NoKey", json!({"field": "John", "value": "1"}));
    assert!(john.delete());

    let remaining: Vec<JsonValue> = john
        .all()
        .expect("Failed to load rows")
        .iter()
        .map(|row| row.to_json())
        .collect();
    assert_eq!(
        remaining,
        vec![
            json!({"field": "John", "value": "2"}),
            json!({"field": "Jim", "value": "1"})
        ]
    );
    assert_eq!(
        fixture.changes.borrow().last(),
        Some(&(ChangeKind::Delete, "NoKey".to_string()))
    );
}

#[test]
fn test_delete_by_key_then_save_inserts_again() {
    let fixture = Fixture::new();
    let mut user = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(user.save());
    let first = user.key().cloned();

    assert!(user.delete());
    assert!(user.key().is_none());
    assert_eq!(fixture.count("users"), 0);

    assert!(user.save());
    assert_ne!(user.key().cloned(), first);
    assert_eq!(fixture.count("users"), 1);
}

#[test]
fn test_find_hydrates_a_clean_model() {
    let fixture = Fixture::new();
    fixture.seed();
    let user = fixture.model("User", json!({}));

    let brad = user.find(4).expect("Failed to find").expect("Missing Brad");
    assert_eq!(brad.get::<String>("name").as_deref(), Some("Brad"));
    assert!(brad.get_changes().is_empty());
    assert_eq!(brad.get_persisted_attributes(), Some(brad.get_attributes()));

    assert!(user.find(404).expect("Failed to find").is_none());
    assert_eq!(user.all().expect("Failed to load users").len(), 9);
}
