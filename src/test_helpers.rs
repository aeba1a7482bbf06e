//! Fixtures shared by the unit tests: the users/towns/counties/no_keys
//! schema, its DDL on an in-memory SQLite database, and seeded data.

use crate::executor::{Dialect, ExecError, Executor, SqliteExecutor};
use crate::model::{Attributes, Context};
use crate::schema::{ColumnDef, ColumnType, EntityDef, RelationDef, Schema};
use crate::validation::{Rule, RuleSet};
use sea_query::Values;
use serde_json::Value as JsonValue;
use std::cell::Cell;
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
        county_id INTEGER NOT NULL REFERENCES counties (id)
    );
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        email TEXT NOT NULL UNIQUE,
        town_id INTEGER REFERENCES towns (id)
    );
    CREATE TABLE no_keys (
        field TEXT NOT NULL,
        value TEXT
    );
";

const SEED: &str = "
    INSERT INTO counties (name) VALUES ('Dorset'), ('Leicestershire'), ('Powys');
    INSERT INTO towns (name, county_id) VALUES
        ('Bournemouth', 1), ('Poole', 1),
        ('Hinckley', 2), ('Nuneaton', 2),
        ('Welshpool', 3), ('Newtown', 3);
    INSERT INTO users (name, age, email, town_id) VALUES
        ('Bill', 26, 'bill@eloquent.rs', NULL),
        ('Ben', 27, 'ben@eloquent.rs', 1),
        ('Bob', 28, 'bob@eloquent.rs', 1),
        ('Brad', 29, 'brad@eloquent.rs', 2),
        ('Bernie', 30, 'bernie@eloquent.rs', 2),
        ('Simon', 31, 'simon@eloquent.rs', 3),
        ('Steve', 32, 'steve@eloquent.rs', 3),
        ('Susie', 33, 'susie@eloquent.rs', 4),
        ('Sarah', 34, 'sarah@eloquent.rs', 5),
        ('Steph', 35, 'steph@eloquent.rs', 6);
";

/// Object literal to attribute map
pub fn attrs(value: JsonValue) -> Attributes {
    match value {
        JsonValue::Object(map) => map,
        _ => Attributes::new(),
    }
}

fn key() -> ColumnDef {
    ColumnDef::new("id", ColumnType::Integer)
        .primary_key()
        .auto_increment()
}

pub fn schema() -> Schema {
    Schema::new()
        .entity(
            EntityDef::new("User")
                .column(key())
                .column(ColumnDef::new("name", ColumnType::Text))
                .column(ColumnDef::new("age", ColumnType::Integer))
                .column(ColumnDef::new("email", ColumnType::Text))
                .column(ColumnDef::new("town_id", ColumnType::Integer).nullable())
                .relation(RelationDef::one("town").fields(["town_id"]).references(["id"]))
                .rules(RuleSet::new().with("email", Rule::Email)),
        )
        .entity(
            EntityDef::new("Town")
                .column(key())
                .column(ColumnDef::new("name", ColumnType::Text))
                .column(ColumnDef::new("county_id", ColumnType::Integer))
                .relation(RelationDef::one("county").fields(["county_id"]).references(["id"]))
                .relation(RelationDef::many("users")),
        )
        .entity(
            EntityDef::new("County")
                .column(key())
                .column(ColumnDef::new("name", ColumnType::Text))
                .relation(RelationDef::many("towns")),
        )
        .entity(
            EntityDef::new("NoKey")
                .column(ColumnDef::new("field", ColumnType::Text))
                .column(ColumnDef::new("value", ColumnType::Text).nullable()),
        )
}

fn executor() -> SqliteExecutor {
    let executor = SqliteExecutor::in_memory().expect("Failed to open database");
    executor
        .execute_batch(TABLES)
        .expect("Failed to create tables");
    executor
}

fn seeded_executor() -> SqliteExecutor {
    let executor = executor();
    executor.execute_batch(SEED).expect("Failed to seed tables");
    executor
}

/// Context over empty tables
pub fn context() -> Context {
    Context::new(Arc::new(schema()), Rc::new(executor()))
}

/// Context over the seeded counties, towns and users
pub fn seeded_context() -> Context {
    Context::new(Arc::new(schema()), Rc::new(seeded_executor()))
}

/// Seeded context plus the number of queries run through it
pub fn counting_context() -> (Context, Rc<Cell<usize>>) {
    let queries = Rc::new(Cell::new(0));
    let executor = CountingExecutor {
        inner: seeded_executor(),
        queries: Rc::clone(&queries),
    };
    (Context::new(Arc::new(schema()), Rc::new(executor)), queries)
}

struct CountingExecutor {
    inner: SqliteExecutor,
    queries: Rc<Cell<usize>>,
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
