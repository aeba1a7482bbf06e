//! Shared fixture: schema document, SQLite tables, seed data and a
//! query-counting executor.

use eloquent::schema::Schema;
use eloquent::{Attributes, ChangeKind, Context, Dialect, ExecError, Executor, SqliteExecutor};
use sea_query::Values;
use serde_json::{json, Value as JsonValue};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

const TABLES: &str = "
    CREATE TABLE counties (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );
    CREATE TABLE towns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        county_id INTEGER NOT NULL
    );
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        email TEXT NOT NULL UNIQUE,
        town_id INTEGER
    );
    CREATE TABLE no_keys (
        field TEXT NOT NULL,
        value TEXT
    );
";

pub fn attrs(value: JsonValue) -> Attributes {
    match value {
        JsonValue::Object(map) => map,
        _ => Attributes::new(),
    }
}

pub fn schema() -> Schema {
    serde_json::from_value(json!({
        "entities": [
            {
                "entity": "User",
                "columns": [
                    {"name": "id", "type": "integer", "primary_key": true, "auto_increment": true},
                    {"name": "name", "type": "text"},
                    {"name": "age", "type": "integer"},
                    {"name": "email", "type": "text"},
                    {"name": "town_id", "type": "integer", "nullable": true}
                ],
                "relations": [
                    {"name": "town", "kind": "one", "fields": ["town_id"], "references": ["id"]}
                ],
                "rules": {"email": "required|email"}
            },
            {
                "entity": "Town",
                "columns": [
                    {"name": "id", "type": "integer", "primary_key": true, "auto_increment": true},
                    {"name": "name", "type": "text"},
                    {"name": "county_id", "type": "integer"}
                ],
                "relations": [
                    {"name": "county", "kind": "one", "fields": ["county_id"], "references": ["id"]},
                    {"name": "users", "kind": "many"}
                ]
            },
            {
                "entity": "County",
                "columns": [
                    {"name": "id", "type": "integer", "primary_key": true, "auto_increment": true},
                    {"name": "name", "type": "text"}
                ],
                "relations": [{"name": "towns", "kind": "many"}]
            },
            {
                "entity": "NoKey",
                "table": "no_keys",
                "columns": [
                    {"name": "field", "type": "text"},
                    {"name": "value", "type": "text", "nullable": true}
                ]
            }
        ]
    }))
    .expect("Failed to parse schema")
}

/// Executor that counts the selects run through it
pub struct CountingExecutor {
    inner: SqliteExecutor,
    pub queries: Cell<usize>,
}

impl Executor for CountingExecutor {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecError> {
        self.inner.execute(sql, values)
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Attributes>, ExecError> {
        self.queries.set(self.queries.get() + 1);
        self.inner.query_all(sql, values)
    }
}

pub type ChangeLog = Rc<RefCell<Vec<(ChangeKind, String)>>>;

pub struct Fixture {
    pub ctx: Context,
    pub executor: Rc<CountingExecutor>,
    pub changes: ChangeLog,
}

impl Fixture {
    pub fn new() -> Self {
        let inner = SqliteExecutor::in_memory().expect("Failed to open database");
        inner.execute_batch(TABLES).expect("Failed to create tables");
        let executor = Rc::new(CountingExecutor {
            inner,
            queries: Cell::new(0),
        });

        let changes: ChangeLog = Rc::default();
        let sink = Rc::clone(&changes);
        let ctx = Context::new(Arc::new(schema()), executor.clone()).with_on_change(
            move |kind, model| sink.borrow_mut().push((kind, model.entity().to_string())),
        );

        Self {
            ctx,
            executor,
            changes,
        }
    }

    pub fn queries(&self) -> usize {
        self.executor.queries.get()
    }

    pub fn count(&self, table: &str) -> i64 {
        let rows = self
            .ctx
            .executor()
            .query_all(&format!("SELECT COUNT(*) AS total FROM {table}"), &Values(vec![]))
            .expect("Failed to count rows");
        rows[0]["total"].as_i64().unwrap_or_default()
    }

    /// Dorset, Leicestershire and Powys with two towns each; every town but
    /// Welshpool and Newtown has two users, plus Bill who has no town.
    pub fn seed(&self) {
        let mut county_ids = Vec::new();
        for name in ["Dorset", "Leicestershire", "Powys"] {
            let mut county = self.model("County", json!({"name": name}));
            assert!(county.save(), "Failed to save {name}");
            county_ids.push(county.key().cloned().expect("Missing county key"));
        }

        let towns = [
            ("Bournemouth", 0),
            ("Poole", 0),
            ("Hinckley", 1),
            ("Nuneaton", 1),
            ("Welshpool", 2),
            ("Newtown", 2),
        ];
        let mut town_ids = Vec::new();
        for (name, county) in towns {
            let mut town = self.model("Town", json!({"name": name, "county_id": county_ids[county]}));
            assert!(town.save(), "Failed to save {name}");
            town_ids.push(town.key().cloned().expect("Missing town key"));
        }

        let users = [
            ("Bill", None),
            ("Ben", Some(0)),
            ("Bob", Some(0)),
            ("Brad", Some(1)),
            ("Bernie", Some(1)),
            ("Simon", Some(2)),
            ("Steve", Some(2)),
            ("Susie", Some(3)),
            ("Sarah", Some(3)),
        ];
        for (age, (name, town)) in (26..).zip(users) {
            let town_id = town.map(|index: usize| town_ids[index].clone());
            let mut user = self.model(
                "User",
                json!({
                    "name": name,
                    "age": age,
                    "email": format!("{}@eloquent.rs", name.to_lowercase()),
                    "town_id": town_id,
                }),
            );
            assert!(user.save(), "Failed to save {name}");
        }
        self.changes.borrow_mut().clear();
    }

    pub fn model(&self, entity: &str, attributes: JsonValue) -> eloquent::Model {
        eloquent::Model::new(entity, attrs(attributes), &self.ctx).expect("Failed to build model")
    }
}
