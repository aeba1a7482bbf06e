//! `Executor` Module
//!
//! Provides the `Executor` trait that abstracts statement execution away from
//! the mapping layer. Models and queries only ever build sea-query statements;
//! turning them into SQL for a given [`Dialect`] and running them is the
//! executor's job.
//!
//! Two implementations ship with the crate:
//! - [`SqliteExecutor`] (feature `sqlite`, default) backed by `rusqlite`
//! - [`MayPostgresExecutor`] (feature `postgres`) backed by `may_postgres`

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::MayPostgresExecutor;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;

use crate::config::DatabaseConfig;
use crate::model::Attributes;
use sea_query::{
    DeleteStatement, InsertStatement, QueryStatementWriter, SelectStatement, UpdateStatement,
    Values,
};
use serde::Deserialize;
use std::fmt;
use std::rc::Rc;

/// SQL flavour an executor speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

/// Build any sea-query statement for the given dialect
macro_rules! build_for {
    ($statement:expr, $dialect:expr) => {
        match $dialect {
            Dialect::Sqlite => $statement.build(sea_query::SqliteQueryBuilder),
            Dialect::Postgres => $statement.build(sea_query::PostgresQueryBuilder),
        }
    };
}

pub(crate) use build_for;

/// Executor error type
#[derive(Debug)]
pub enum ExecError {
    /// SQLite error from `rusqlite`
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Error),
    /// `PostgreSQL` error from `may_postgres`
    #[cfg(feature = "postgres")]
    Postgres(may_postgres::Error),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            ExecError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            #[cfg(feature = "postgres")]
            ExecError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            ExecError::QueryError(s) => write!(f, "Query error: {s}"),
            ExecError::ParseError(s) => write!(f, "Parse error: {s}"),
            ExecError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for ExecError {}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for ExecError {
    fn from(err: rusqlite::Error) -> Self {
        ExecError::Sqlite(err)
    }
}

#[cfg(feature = "postgres")]
impl From<may_postgres::Error> for ExecError {
    fn from(err: may_postgres::Error) -> Self {
        ExecError::Postgres(err)
    }
}

/// Outcome of an `INSERT ... RETURNING *`
#[derive(Debug, Clone, Default)]
pub struct InsertResult {
    /// Number of rows written
    pub affected: u64,
    /// First returned row, carrying generated column values
    pub row: Option<Attributes>,
}

/// Trait for executing database operations
///
/// Implementors supply the three primitive methods; the statement-level
/// methods (`select`, `insert`, `update`, `delete`) are provided and build
/// the statement for [`Executor::dialect`] before delegating.
///
/// Rows are returned as insertion-ordered JSON maps keyed by the column
/// name (or alias) reported by the driver.
pub trait Executor {
    /// SQL dialect statements must be built for
    fn dialect(&self) -> Dialect;

    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `ExecError` if the statement fails.
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `ExecError` if the query fails or a column cannot be decoded.
    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Attributes>, ExecError>;

    /// Run a select statement
    fn select(&self, statement: &SelectStatement) -> Result<Vec<Attributes>, ExecError> {
        let (sql, values) = build_for!(statement, self.dialect());
        self.query_all(&sql, &values)
    }

    /// Run an insert statement; it should carry a `RETURNING` clause so the
    /// generated key can be read back
    fn insert(&self, statement: &InsertStatement) -> Result<InsertResult, ExecError> {
        let (sql, values) = build_for!(statement, self.dialect());
        let rows = self.query_all(&sql, &values)?;
        Ok(InsertResult {
            affected: rows.len() as u64,
            row: rows.into_iter().next(),
        })
    }

    /// Run an update statement, returning the number of rows affected
    fn update(&self, statement: &UpdateStatement) -> Result<u64, ExecError> {
        let (sql, values) = build_for!(statement, self.dialect());
        self.execute(&sql, &values)
    }

    /// Run a delete statement, returning the number of rows affected
    fn delete(&self, statement: &DeleteStatement) -> Result<u64, ExecError> {
        let (sql, values) = build_for!(statement, self.dialect());
        self.execute(&sql, &values)
    }
}

/// Open the executor described by `config`
///
/// # Errors
///
/// Returns `ExecError::Other` when the dialect's feature is not compiled in,
/// or the driver error when the connection cannot be opened.
pub fn connect(config: &DatabaseConfig) -> Result<Rc<dyn Executor>, ExecError> {
    log::debug!("Opening {:?} executor", config.dialect);
    match config.dialect {
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Rc::new(SqliteExecutor::open(&config.url)?)),
        #[cfg(feature = "postgres")]
        Dialect::Postgres => {
            let client = may_postgres::connect(&config.url)?;
            Ok(Rc::new(MayPostgresExecutor::new(client)))
        }
        #[allow(unreachable_patterns)]
        other => Err(ExecError::Other(format!(
            "{other:?} support is not compiled in"
        ))),
    }
}
