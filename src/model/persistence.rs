//! Persistence: save, delete, find and all.
//!
//! Writes never raise. Executor failures (constraint violations, missing
//! required values) are logged at `warn` and reported as `false`; callers
//! inspect `get_changes()` and `get_persisted_attributes()` to tell "nothing
//! to do" from "failed".

use super::{ChangeKind, Model};
use crate::error::OrmError;
use crate::executor::ExecError;
use crate::query::value_conversion::{to_column_value, to_value};
use crate::query::Name;
use crate::schema::ColumnType;
#[cfg(feature = "tracing")]
use crate::tracing_helpers;
use sea_query::{
    Asterisk, DeleteStatement, Expr, ExprTrait, InsertStatement, UpdateStatement,
};
use serde_json::Value as JsonValue;

impl Model {
    /// Insert or update this instance
    ///
    /// Without a key the column attributes are inserted and the generated key
    /// is read back. With a key only the change set is written; an empty
    /// change set saves nothing and returns `false`. On success the change
    /// set is cleared, the snapshot refreshed and the change hook fired.
    pub fn save(&mut self) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::persist_span("save", &self.table).entered();

        let (kind, outcome) = if self.key().is_none() {
            (ChangeKind::Insert, self.insert())
        } else if self.changes.is_empty() {
            log::debug!("Nothing to save for {}", self.entity);
            return false;
        } else {
            (ChangeKind::Update, self.update())
        };

        match outcome {
            Ok(true) => {
                self.original = Some(self.attributes.clone());
                self.changes.clear();
                self.ctx.notify(kind, self);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("Failed to save {}: {e}", self.entity);
                false
            }
        }
    }

    /// Delete this instance's row
    ///
    /// Deletes by primary key when one is set. Otherwise every populated
    /// attribute must match (NULLs through `IS NULL`), which removes *every*
    /// row sharing those values, including rows of keyless tables that were
    /// never loaded through this instance. On success the key attribute is
    /// removed and the change hook fired.
    pub fn delete(&mut self) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::persist_span("delete", &self.table).entered();

        let mut statement = DeleteStatement::default();
        statement.from_table(Name::new(&self.table));
        match (self.key_name(), self.key()) {
            (Some(name), Some(key)) => {
                statement.and_where(Expr::col(Name::new(name)).eq(Expr::val(to_value(key))));
            }
            _ if self.attributes.is_empty() => {
                log::debug!("Nothing to match a {} delete on", self.entity);
                return false;
            }
            _ => {
                for (name, value) in &self.attributes {
                    let column = Expr::col(Name::new(name));
                    statement.and_where(if matches!(value, JsonValue::Null) {
                        column.is_null()
                    } else {
                        column.eq(Expr::val(to_value(value)))
                    });
                }
            }
        }

        match self.ctx.executor().delete(&statement) {
            Ok(0) => false,
            Ok(_) => {
                if let Some(name) = self.key_name().map(str::to_string) {
                    self.attributes.remove(&name);
                }
                self.ctx.notify(ChangeKind::Delete, self);
                true
            }
            Err(e) => {
                log::warn!("Failed to delete {}: {e}", self.entity);
                false
            }
        }
    }

    /// Load the instance with the given primary key
    ///
    /// Always `Ok(None)` for entities without a primary key.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` when the executor fails.
    pub fn find(&self, key: impl Into<JsonValue>) -> Result<Option<Model>, OrmError> {
        let Some(name) = self.key_name() else {
            return Ok(None);
        };
        self.query().and_where((name, key.into()))?.first()
    }

    /// Every row of the entity's table
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` when the executor fails.
    pub fn all(&self) -> Result<Vec<Model>, OrmError> {
        self.query().hydrate()
    }

    fn insert(&mut self) -> Result<bool, OrmError> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in self.columns() {
            let Some(value) = self.attributes.get(&column.name) else {
                continue;
            };
            if column.primary_key && matches!(value, JsonValue::Null) {
                continue;
            }
            columns.push(Name::new(&column.name));
            values.push(Expr::val(to_column_value(value, column.column_type)));
        }

        let mut statement = InsertStatement::default();
        statement.into_table(Name::new(&self.table));
        if columns.is_empty() {
            statement.or_default_values();
        } else {
            statement.columns(columns);
            statement
                .values(values)
                .map_err(|e| ExecError::QueryError(e.to_string()))?;
        }
        statement.returning_col(Asterisk);

        let result = self.ctx.executor().insert(&statement)?;
        // The returned row carries the generated key and column defaults
        if let Some(row) = &result.row {
            let names: Vec<String> = self.columns().iter().map(|c| c.name.clone()).collect();
            for name in names {
                if let Some(value) = row.get(&name) {
                    self.attributes.insert(name, value.clone());
                }
            }
        }
        Ok(result.affected > 0 && (self.key_name().is_none() || self.key().is_some()))
    }

    fn update(&self) -> Result<bool, OrmError> {
        let (Some(name), Some(key)) = (self.key_name(), self.key()) else {
            return Ok(false);
        };
        if self.changes.is_empty() {
            return Ok(false);
        }

        let metadata = self.ctx.metadata();
        let mut statement = UpdateStatement::default();
        statement.table(Name::new(&self.table));
        for (column, value) in &self.changes {
            let column_type = metadata
                .column_of(&self.entity, column)
                .map_or(ColumnType::Text, |def| def.column_type);
            statement.value(Name::new(column), Expr::val(to_column_value(value, column_type)));
        }
        statement.and_where(Expr::col(Name::new(name)).eq(Expr::val(to_value(key))));

        Ok(self.ctx.executor().update(&statement)? > 0)
    }
}
