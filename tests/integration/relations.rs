//! Lazy and eager relation loading over the seeded counties, towns and users.

use crate::common::Fixture;
use eloquent::query::Name;
use eloquent::{Attribute, Model, ModelQuery, OrmError, Related};
use sea_query::{Expr, ExprTrait, Order};
use serde_json::{json, Value as JsonValue};

fn seeded() -> Fixture {
    let fixture = Fixture::new();
    fixture.seed();
    fixture
}

fn named(models: &[Model]) -> Vec<String> {
    models
        .iter()
        .filter_map(|model| model.get::<String>("name"))
        .collect()
}

/// Resolve `name` on `model`, then `nested` on each related model
fn load_lazily(model: &mut Model, name: &str, nested: Option<&str>) {
    model.load(name).expect("Failed to load relation");
    let (Some(nested), Some(related)) = (nested, model.related_mut(name)) else {
        return;
    };
    for child in related.models_mut() {
        child.load(nested).expect("Failed to load nested relation");
    }
}

#[test]
fn test_lazy_relation_queries_once() {
    let fixture = seeded();
    let mut brad = fixture
        .model("User", json!({}))
        .find(4)
        .expect("Failed to find")
        .expect("Missing Brad");
    let before = fixture.queries();

    let handle = match brad.get_attribute("town") {
        Attribute::Unresolved(deferred) => deferred,
        other => panic!("Expected unresolved town, got {other:?}"),
    };
    let first = handle.resolve().expect("Failed to resolve").to_json();
    let second = handle.resolve().expect("Failed to resolve").to_json();
    assert_eq!(first, second);
    assert_eq!(fixture.queries(), before + 1);

    // The instance picks up the handle's result without another query
    let town = brad.load("town").expect("Failed to load town").cloned();
    assert_eq!(town.map(|t| t.to_json()), Some(first));
    assert_eq!(fixture.queries(), before + 1);
}

#[test]
fn test_lazy_one_and_many() {
    let fixture = seeded();
    let user = fixture.model("User", json!({}));
    let mut brad = user.find(4).expect("Failed to find").expect("Missing Brad");
    let town = brad.load("town").expect("Failed to load town").cloned();
    assert_eq!(
        town.as_ref().and_then(Related::one).and_then(|t| t.get::<String>("name")).as_deref(),
        Some("Poole")
    );

    let mut dorset = fixture
        .model("County", json!({}))
        .find(1)
        .expect("Failed to find")
        .expect("Missing Dorset");
    let towns = dorset.load("towns").expect("Failed to load towns").cloned();
    assert_eq!(
        towns.as_ref().map(|t| named(t.many())),
        Some(vec!["Bournemouth".to_string(), "Poole".to_string()])
    );
}

#[test]
fn test_missing_foreign_key_loads_an_empty_one() {
    let fixture = seeded();
    let mut bill = fixture
        .model("User", json!({}))
        .find(1)
        .expect("Failed to find")
        .expect("Missing Bill");
    assert!(bill.get_attribute("town").is_absent());

    let before = fixture.queries();
    let town = bill.load("town").expect("Failed to load town").cloned();
    assert!(matches!(town, Some(Related::One(None))));
    assert_eq!(fixture.queries(), before);
    assert_eq!(bill.to_json()["town"], JsonValue::Null);
}

#[test]
fn test_eager_one_paths_match_lazy_loading() {
    let fixture = seeded();
    let eager = ModelQuery::new("User", &fixture.ctx)
        .and_then(|q| q.with("town"))
        .and_then(|q| q.with("town.county"))
        .expect("Failed to add relations")
        .order_by("id", Order::Asc)
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(eager.len(), 9);

    let mut lazy = fixture
        .model("User", json!({}))
        .query()
        .order_by("id", Order::Asc)
        .hydrate()
        .expect("Failed to hydrate");
    for user in &mut lazy {
        load_lazily(user, "town", Some("county"));
    }

    let eager: Vec<JsonValue> = eager.iter().map(Model::to_json).collect();
    let lazy: Vec<JsonValue> = lazy.iter().map(Model::to_json).collect();
    assert_eq!(eager, lazy);
    // Bill has no town on either path
    assert_eq!(eager[0]["town"], JsonValue::Null);
    assert_eq!(eager[3]["town"]["name"], json!("Poole"));
    assert_eq!(eager[3]["town"]["county"]["name"], json!("Dorset"));
}

#[test]
fn test_eager_many_entries_follow_key_order() {
    let fixture = seeded();
    // Bernie sorts before Brad by name, so the joined rows arrive out of key order
    let eager = ModelQuery::new("Town", &fixture.ctx)
        .and_then(|q| q.with("users"))
        .expect("Failed to add relation")
        .filter(Expr::col((Name::new("towns"), Name::new("id"))).eq(2))
        .order_by("name", Order::Asc)
        .hydrate()
        .expect("Failed to hydrate");
    let users = &eager[0].to_json()["users"];
    assert_eq!((&users[0]["name"], &users[1]["name"]), (&json!("Brad"), &json!("Bernie")));
}

#[test]
fn test_eager_many_paths_match_lazy_loading() {
    let fixture = seeded();
    let before = fixture.queries();
    let eager = ModelQuery::new("County", &fixture.ctx)
        .and_then(|q| q.with("towns"))
        .and_then(|q| q.with("towns.users"))
        .expect("Failed to add relations")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(fixture.queries(), before + 1);

    let mut lazy = fixture.model("County", json!({})).all().expect("Failed to load counties");
    for county in &mut lazy {
        load_lazily(county, "towns", Some("users"));
    }

    let eager_json: Vec<JsonValue> = eager.iter().map(Model::to_json).collect();
    let lazy_json: Vec<JsonValue> = lazy.iter().map(Model::to_json).collect();
    assert_eq!(eager_json, lazy_json);

    let mut dorset = eager[0].clone();
    let towns = dorset.load("towns").expect("Failed to read towns").cloned();
    assert_eq!(towns.as_ref().map(Related::len), Some(2));
    let users = &eager_json[0]["towns"][0]["users"];
    assert_eq!(users.as_array().map(Vec::len), Some(2));
    assert_eq!((&users[0]["name"], &users[1]["name"]), (&json!("Ben"), &json!("Bob")));

    // Towns without users still carry an empty list
    assert_eq!(eager_json[2]["towns"][1]["users"], json!([]));
}

#[test]
fn test_nested_path_needs_its_parent() {
    let fixture = seeded();
    let err = ModelQuery::new("County", &fixture.ctx)
        .and_then(|q| q.with("towns.users"))
        .expect_err("Expected failure");
    assert!(matches!(err, OrmError::MissingParentRelation(_)));
    assert_eq!(err.to_string(), "Parent relation (towns) is missing");
}

#[test]
fn test_trailing_dot_is_ignored() {
    let fixture = seeded();
    let plain = ModelQuery::new("County", &fixture.ctx)
        .and_then(|q| q.with("towns"))
        .expect("Failed to add relation");
    let dotted = ModelQuery::new("County", &fixture.ctx)
        .and_then(|q| q.with("towns."))
        .expect("Failed to add relation");
    assert_eq!(plain.paths(), dotted.paths());

    let plain: Vec<JsonValue> = plain
        .hydrate()
        .expect("Failed to hydrate")
        .iter()
        .map(Model::to_json)
        .collect();
    let dotted: Vec<JsonValue> = dotted
        .hydrate()
        .expect("Failed to hydrate")
        .iter()
        .map(Model::to_json)
        .collect();
    assert_eq!(plain, dotted);
}
