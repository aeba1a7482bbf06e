//! `rusqlite`-backed executor.
//!
//! Used as the default backend and by the test suite (`:memory:` databases).

use super::{Dialect, ExecError, Executor};
use crate::model::Attributes;
#[cfg(feature = "tracing")]
use crate::tracing_helpers;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use sea_query::{Value, Values};
use serde_json::{Number, Value as JsonValue};

/// Executor over a single `rusqlite::Connection`
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Open a database file, or an in-memory database for `:memory:`
    pub fn open(path: &str) -> Result<Self, ExecError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Ok(Self { conn })
    }

    /// Open a fresh in-memory database
    pub fn in_memory() -> Result<Self, ExecError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Run a batch of semicolon separated statements (DDL, fixtures)
    pub fn execute_batch(&self, sql: &str) -> Result<(), ExecError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let params = to_sql_params(values)?;
        let affected = self.conn.execute(sql, params_from_iter(params))?;
        Ok(affected as u64)
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Attributes>, ExecError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let params = to_sql_params(values)?;
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(params))?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = Attributes::new();
            for (index, name) in names.iter().enumerate() {
                attributes.insert(name.clone(), from_value_ref(row.get_ref(index)?));
            }
            results.push(attributes);
        }
        Ok(results)
    }
}

/// Convert sea-query bind values into owned rusqlite values
fn to_sql_params(values: &Values) -> Result<Vec<SqlValue>, ExecError> {
    values
        .iter()
        .map(|value| {
            Ok(match value {
                Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
                Value::TinyInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
                Value::SmallInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
                Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
                Value::BigInt(Some(i)) => SqlValue::Integer(*i),
                Value::TinyUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
                Value::SmallUnsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
                Value::Unsigned(Some(u)) => SqlValue::Integer(i64::from(*u)),
                Value::BigUnsigned(Some(u)) => {
                    let i = i64::try_from(*u).map_err(|_| {
                        ExecError::Other(format!(
                            "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                            u,
                            i64::MAX
                        ))
                    })?;
                    SqlValue::Integer(i)
                }
                Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
                Value::Double(Some(d)) => SqlValue::Real(*d),
                Value::String(Some(s)) => SqlValue::Text(s.clone()),
                Value::Bytes(Some(b)) => SqlValue::Blob(b.clone()),
                Value::Json(Some(j)) => SqlValue::Text(serde_json::to_string(&**j).map_err(|e| {
                    ExecError::Other(format!("Failed to serialize JSON: {e}"))
                })?),
                Value::Bool(None)
                | Value::TinyInt(None)
                | Value::SmallInt(None)
                | Value::Int(None)
                | Value::BigInt(None)
                | Value::TinyUnsigned(None)
                | Value::SmallUnsigned(None)
                | Value::Unsigned(None)
                | Value::BigUnsigned(None)
                | Value::Float(None)
                | Value::Double(None)
                | Value::String(None)
                | Value::Bytes(None)
                | Value::Json(None) => SqlValue::Null,
                _ => {
                    return Err(ExecError::Other(format!(
                        "Unsupported value type in query: {value:?}"
                    )))
                }
            })
        })
        .collect()
}

fn from_value_ref(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => JsonValue::from(b.to_vec()),
    }
}
