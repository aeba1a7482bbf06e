//! `ModelQuery` predicates against stored rows.

use crate::common::Fixture;
use eloquent::query::Name;
use eloquent::{Model, ModelQuery, OrmError};
use sea_query::{Expr, ExprTrait};
use serde_json::{json, Value as JsonValue};

fn names(models: &[Model]) -> Vec<String> {
    models
        .iter()
        .filter_map(|model| model.get::<String>("name"))
        .collect()
}

fn john_and_jimmy(fixture: &Fixture) -> Model {
    let mut john = fixture.model(
        "User",
        json!({"name": "John", "age": 42, "email": "john@eloquent.rs"}),
    );
    assert!(john.save());
    let mut jimmy = fixture.model(
        "User",
        json!({"name": "Jimmy", "age": 32, "email": "jimmy@eloquent.rs"}),
    );
    assert!(jimmy.save());
    john
}

#[test]
fn test_where_and_or_where() {
    let fixture = Fixture::new();
    let mut john = john_and_jimmy(&fixture);

    let older = john
        .query()
        .and_where(("age", ">=", 43))
        .expect("Failed to add where");
    assert!(older.hydrate().expect("Failed to hydrate").is_empty());

    let older_or_jimmy = older.or_where(("name", "Jimmy")).expect("Failed to add where");
    assert_eq!(names(&older_or_jimmy.hydrate().expect("Failed to hydrate")), vec!["Jimmy"]);

    john.set_attribute("age", 43);
    assert!(john.save());
    assert_eq!(
        names(&older_or_jimmy.hydrate().expect("Failed to hydrate")),
        vec!["John", "Jimmy"]
    );
}

#[test]
fn test_insufficient_arguments_return_everything() {
    let fixture = Fixture::new();
    let john = john_and_jimmy(&fixture);

    let users = john
        .query()
        .and_where("age")
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(users.len(), 2);

    let users = john
        .query()
        .or_where("age")
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(users.len(), 2);
}

#[test]
fn test_bad_columns_and_operators_fail_at_build_time() {
    let fixture = Fixture::new();
    let john = john_and_jimmy(&fixture);

    let err = john
        .query()
        .and_where(("noExistentField", ">=", 43))
        .expect_err("Expected failure");
    assert!(matches!(err, OrmError::UnknownColumn(_)));
    assert_eq!(err.to_string(), "Unable to find column: noExistentField");

    let err = john
        .query()
        .and_where(("age", "boom", 43))
        .expect_err("Expected failure");
    assert_eq!(err.to_string(), "Unsupported where operator: boom");
}

#[test]
fn test_membership_predicates() {
    let fixture = Fixture::new();
    fixture.seed();
    let user = fixture.model("User", json!({}));

    let everyone = user
        .query()
        .where_in("name", Vec::<String>::new())
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(everyone.len(), 9);

    let still_everyone = user
        .query()
        .where_not_in("name", Vec::<String>::new())
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(still_everyone.len(), 9);

    let some = user
        .query()
        .where_in("name", ["Ben", "Brad", "Nobody"])
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(names(&some), vec!["Ben", "Brad"]);

    let rest = user
        .query()
        .where_not_in("town_id", [1, 2, 3])
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    // NOT IN never matches Bill's NULL town
    assert_eq!(names(&rest), vec!["Susie", "Sarah"]);

    let optional = user
        .query()
        .where_in("name", Some(vec!["Ben", "Brad"]))
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(names(&optional), vec!["Ben", "Brad"]);

    let missing = user
        .query()
        .where_not_in("name", None::<Vec<&str>>)
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(missing.len(), 9);
}

#[test]
fn test_null_equality_matches_missing_values() {
    let fixture = Fixture::new();
    fixture.seed();
    let townless = fixture
        .model("User", json!({}))
        .query()
        .and_where(("town_id", JsonValue::Null))
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(names(&townless), vec!["Bill"]);
}

#[test]
fn test_pass_through_clauses_keep_the_extension() {
    let fixture = Fixture::new();
    john_and_jimmy(&fixture);

    let users = ModelQuery::new("User", &fixture.ctx)
        .expect("Failed to build query")
        .group_by("name")
        .having(Expr::col(Name::new("name")).eq("John"))
        .limit(1)
        .and_where(("age", ">", 18))
        .expect("Failed to add where")
        .hydrate()
        .expect("Failed to hydrate");
    assert_eq!(names(&users), vec!["John"]);
}

#[test]
fn test_raw_conditions_and_fetch() {
    let fixture = Fixture::new();
    fixture.seed();

    let rows = ModelQuery::new("Town", &fixture.ctx)
        .expect("Failed to build query")
        .filter(Expr::col(Name::new("county_id")).eq(3))
        .fetch()
        .expect("Failed to fetch");
    assert_eq!(
        rows.iter().map(|row| row["name"].clone()).collect::<Vec<_>>(),
        vec![json!("Welshpool"), json!("Newtown")]
    );
}
