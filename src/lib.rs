//! # Eloquent
//!
//! Active-record mapping core over sea-query: entity instances with change
//! tracking against a persisted snapshot, relations resolved lazily on first
//! access or eagerly through left joins, and reconstruction of nested
//! object graphs from a single joined result set.
//!
//! Everything an instance needs travels in an explicit [`Context`]: the
//! schema metadata, the executor and an optional change hook.
//!
//! ```no_run
//! use eloquent::{Context, Model, SqliteExecutor};
//! use eloquent::schema::Schema;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema: Schema = serde_json::from_str(&std::fs::read_to_string("schema.json")?)?;
//! let ctx = Context::new(Arc::new(schema), Rc::new(SqliteExecutor::open("app.db")?));
//!
//! let counties = eloquent::ModelQuery::new("County", &ctx)?
//!     .with("towns")?
//!     .with("towns.users")?
//!     .hydrate()?;
//!
//! let mut user = Model::new("User", Default::default(), &ctx)?
//!     .find(4)?
//!     .ok_or("missing user")?;
//! let name = user.get::<String>("name");
//! if let Some(town) = user.load("town")? {
//!     println!("{name:?} lives in {:?}", town.one().map(Model::to_json));
//! }
//! println!("{} counties", counties.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod inflect;
pub mod model;
pub mod query;
pub mod relation;
pub mod schema;
#[cfg(feature = "tracing")]
pub mod tracing_helpers;
pub mod validation;

#[cfg(all(test, feature = "sqlite"))]
mod test_helpers;

pub use config::DatabaseConfig;
pub use error::OrmError;
pub use executor::{connect, Dialect, ExecError, Executor, InsertResult};
#[cfg(feature = "postgres")]
pub use executor::MayPostgresExecutor;
#[cfg(feature = "sqlite")]
pub use executor::SqliteExecutor;
pub use model::{Assign, Attribute, Attributes, ChangeKind, Context, Model, OnChange, Related};
pub use query::{ModelQuery, WhereArgs, WhereOperator};
pub use relation::Deferred;
pub use schema::{MetadataAccessor, Schema};
pub use validation::{Rule, RuleSet, Validator};
