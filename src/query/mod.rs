//! Query building and execution for models.
//!
//! [`ModelQuery`] wraps a sea-query `SelectStatement` over an entity's table
//! and adds the model-aware pieces: column-checked `where` clauses in three
//! call shapes, membership predicates that vanish on empty input, eager
//! relation paths through [`with`](ModelQuery::with), and hydration of the
//! result rows into [`Model`]s.
//!
//! # Examples
//!
//! ```no_run
//! # use eloquent::{Context, ModelQuery, OrmError};
//! # fn demo(ctx: &Context) -> Result<(), OrmError> {
//! // age >= 43 OR name = 'Jimmy'
//! let users = ModelQuery::new("User", ctx)?
//!     .and_where(("age", ">=", 43))?
//!     .or_where(("name", "Jimmy"))?
//!     .hydrate()?;
//!
//! // Counties with their towns and each town's users, in one query
//! let counties = ModelQuery::new("County", ctx)?
//!     .with("towns")?
//!     .with("towns.users")?
//!     .hydrate()?;
//! # Ok(())
//! # }
//! ```

pub mod value_conversion;

use crate::error::OrmError;
use crate::executor::{build_for, Dialect};
use crate::model::{Attributes, Context, Model};
use crate::relation::flatten::flatten;
use crate::relation::JoinTree;
use sea_query::{
    Asterisk, Condition, Expr, ExprTrait, Iden, IntoCondition, Order,
    QueryStatementWriter, SelectStatement, Values,
};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use value_conversion::to_value;

/// Table or column identifier known only at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for Name {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Comparison operators accepted by `where` clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FromStr for WhereOperator {
    type Err = OrmError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        match symbol {
            "=" => Ok(WhereOperator::Eq),
            ">" => Ok(WhereOperator::Gt),
            ">=" => Ok(WhereOperator::Gte),
            "<" => Ok(WhereOperator::Lt),
            "<=" => Ok(WhereOperator::Lte),
            other => Err(OrmError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for WhereOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            WhereOperator::Eq => "=",
            WhereOperator::Gt => ">",
            WhereOperator::Gte => ">=",
            WhereOperator::Lt => "<",
            WhereOperator::Lte => "<=",
        };
        f.write_str(symbol)
    }
}

/// Arguments of a `where` clause
///
/// - a `Condition` or `Expr` passes through untouched
/// - a lone column name adds nothing
/// - `(column, value)` is an equality
/// - `(column, operator, value)` compares with `=`, `>`, `>=`, `<` or `<=`
#[derive(Debug, Clone)]
pub enum WhereArgs {
    Raw(Condition),
    Incomplete,
    Compare {
        column: String,
        operator: String,
        value: JsonValue,
    },
}

impl From<Condition> for WhereArgs {
    fn from(condition: Condition) -> Self {
        WhereArgs::Raw(condition)
    }
}

impl From<Expr> for WhereArgs {
    fn from(expr: Expr) -> Self {
        WhereArgs::Raw(Condition::all().add(expr))
    }
}

impl From<&str> for WhereArgs {
    fn from(_column: &str) -> Self {
        WhereArgs::Incomplete
    }
}

impl<V: Into<JsonValue>> From<(&str, V)> for WhereArgs {
    fn from((column, value): (&str, V)) -> Self {
        WhereArgs::Compare {
            column: column.to_string(),
            operator: "=".to_string(),
            value: value.into(),
        }
    }
}

impl<V: Into<JsonValue>> From<(&str, &str, V)> for WhereArgs {
    fn from((column, operator, value): (&str, &str, V)) -> Self {
        WhereArgs::Compare {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        }
    }
}

/// Select query over one entity's table
#[derive(Clone)]
pub struct ModelQuery {
    ctx: Context,
    statement: SelectStatement,
    condition: Option<Condition>,
    joins: JoinTree,
}

impl ModelQuery {
    /// Start a query selecting every declared column of `entity`
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` when `entity` is not in the schema.
    pub fn new(entity: &str, ctx: &Context) -> Result<Self, OrmError> {
        let joins = JoinTree::root(entity, ctx.metadata())?;
        Ok(Self::build(joins, ctx))
    }

    pub(crate) fn for_model(model: &Model) -> Self {
        let joins = JoinTree {
            entity: model.entity().to_string(),
            table: model.table().to_string(),
            key: model.key_name().map(str::to_string),
            relations: Vec::new(),
        };
        Self::build(joins, model.context())
    }

    fn build(joins: JoinTree, ctx: &Context) -> Self {
        let mut statement = SelectStatement::default();
        statement.from(Name::new(&joins.table));

        let columns = ctx.metadata().columns_of(&joins.entity).unwrap_or(&[]);
        if columns.is_empty() {
            statement.column((Name::new(&joins.table), Asterisk));
        }
        for column in columns {
            statement.expr_as(
                Expr::col((Name::new(&joins.table), Name::new(&column.name))),
                Name::new(&column.name),
            );
        }

        Self {
            ctx: ctx.clone(),
            statement,
            condition: None,
            joins,
        }
    }

    pub fn entity(&self) -> &str {
        &self.joins.entity
    }

    pub fn table(&self) -> &str {
        &self.joins.table
    }

    /// Relation paths requested through [`with`](Self::with)
    pub fn paths(&self) -> Vec<String> {
        self.joins.paths()
    }

    /// AND a predicate onto the accumulated `where` clause
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownColumn` or `OrmError::UnsupportedOperator`
    /// for a comparison that cannot be built.
    pub fn and_where(self, args: impl Into<WhereArgs>) -> Result<Self, OrmError> {
        let predicate = self.predicate(args.into())?;
        Ok(self.combine(predicate, false))
    }

    /// OR a predicate with everything accumulated so far
    ///
    /// # Errors
    ///
    /// Same as [`and_where`](Self::and_where).
    pub fn or_where(self, args: impl Into<WhereArgs>) -> Result<Self, OrmError> {
        let predicate = self.predicate(args.into())?;
        Ok(self.combine(predicate, true))
    }

    /// `column IN (values)`; nothing is added when `values` is empty
    ///
    /// Array items are spread into the list, so `Some(vec![..])` and `None`
    /// behave like the list itself and an empty one. Object items are skipped.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownColumn` when `column` is not declared.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        self.membership(column, values, true)
    }

    /// `column NOT IN (values)`; nothing is added when `values` is empty
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownColumn` when `column` is not declared.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        self.membership(column, values, false)
    }

    /// Eager load a relation path such as `"towns"` or `"towns.users"`
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingParentRelation` when a parent path was not
    /// requested first.
    pub fn with(mut self, path: &str) -> Result<Self, OrmError> {
        if let Some(join) = self.joins.register(path, self.ctx.metadata())? {
            join.apply(&mut self.statement);
        }
        Ok(self)
    }

    /// AND a raw condition
    pub fn filter<F>(self, condition: F) -> Self
    where
        F: IntoCondition,
    {
        self.combine(Some(condition.into_condition()), false)
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.statement
            .group_by_col((Name::new(&self.joins.table), Name::new(column)));
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.statement.and_having(condition);
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.statement
            .order_by((Name::new(&self.joins.table), Name::new(column)), order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.statement.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.statement.offset(offset);
        self
    }

    /// The statement as it will be executed
    ///
    /// With eager paths the rows are additionally ordered by the root key
    /// and then each joined table's key, after any caller ordering, so
    /// nested `Many` entries come out in key order.
    pub fn statement(&self) -> SelectStatement {
        let mut statement = self.statement.clone();
        if let Some(condition) = &self.condition {
            statement.cond_where(condition.clone());
        }
        if !self.joins.is_empty() {
            for (table, key) in self.joins.key_columns() {
                statement.order_by((Name::new(table), Name::new(key)), Order::Asc);
            }
        }
        statement
    }

    /// SQL and bind values for `dialect`
    pub fn to_sql(&self, dialect: Dialect) -> (String, Values) {
        let statement = self.statement();
        build_for!(statement, dialect)
    }

    /// Run the query and return one attribute map per root row
    ///
    /// With eager paths the joined rows are flattened, so each map also
    /// carries the requested relations as nested objects and arrays.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` when the executor fails.
    pub fn fetch(&self) -> Result<Vec<Attributes>, OrmError> {
        let rows = self.ctx.executor().select(&self.statement())?;
        log::debug!("Fetched {} row(s) from {}", rows.len(), self.joins.table);
        if self.joins.is_empty() {
            Ok(rows)
        } else {
            Ok(flatten(&self.joins, rows))
        }
    }

    /// Run the query and build a model per root row
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` when the executor fails.
    pub fn hydrate(&self) -> Result<Vec<Model>, OrmError> {
        self.fetch()?
            .into_iter()
            .map(|row| Model::new(&self.joins.entity, row, &self.ctx))
            .collect()
    }

    /// First matching model
    ///
    /// Without eager paths the statement is limited to one row; with them
    /// every joined row is read so the first entity's relations are complete.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Execution` when the executor fails.
    pub fn first(self) -> Result<Option<Model>, OrmError> {
        let query = if self.joins.is_empty() {
            self.limit(1)
        } else {
            self
        };
        Ok(query.hydrate()?.into_iter().next())
    }

    fn column(&self, column: &str) -> Result<Expr, OrmError> {
        let known = self
            .ctx
            .metadata()
            .column_of(&self.joins.entity, column)
            .is_some();
        if !known {
            return Err(OrmError::UnknownColumn(column.to_string()));
        }
        Ok(Expr::col((Name::new(&self.joins.table), Name::new(column))))
    }

    fn predicate(&self, args: WhereArgs) -> Result<Option<Condition>, OrmError> {
        let (column, operator, value) = match args {
            WhereArgs::Raw(condition) => return Ok(Some(condition)),
            WhereArgs::Incomplete => return Ok(None),
            WhereArgs::Compare {
                column,
                operator,
                value,
            } => (column, operator, value),
        };

        let column = self.column(&column)?;
        let operator: WhereOperator = operator.parse()?;
        let bound = Expr::val(to_value(&value));
        let expr = match operator {
            WhereOperator::Eq if matches!(value, JsonValue::Null) => column.is_null(),
            WhereOperator::Eq => column.eq(bound),
            WhereOperator::Gt => column.gt(bound),
            WhereOperator::Gte => column.gte(bound),
            WhereOperator::Lt => column.lt(bound),
            WhereOperator::Lte => column.lte(bound),
        };
        Ok(Some(Condition::all().add(expr)))
    }

    fn membership<I, V>(self, column: &str, values: I, inside: bool) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let column = self.column(column)?;
        let values: Vec<Expr> = values
            .into_iter()
            .flat_map(|value| match Into::<JsonValue>::into(value) {
                JsonValue::Array(items) => items,
                single => vec![single],
            })
            .filter(|value| !value.is_object())
            .map(|value| Expr::val(to_value(&value)))
            .collect();
        if values.is_empty() {
            return Ok(self);
        }

        let expr = if inside {
            column.is_in(values)
        } else {
            column.is_not_in(values)
        };
        Ok(self.combine(Some(Condition::all().add(expr)), false))
    }

    fn combine(mut self, predicate: Option<Condition>, any: bool) -> Self {
        let Some(predicate) = predicate else {
            return self;
        };
        self.condition = Some(match self.condition.take() {
            None => predicate,
            Some(previous) if any => Condition::any().add(previous).add(predicate),
            Some(previous) => Condition::all().add(previous).add(predicate),
        });
        self
    }
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("entity", &self.joins.entity)
            .field("sql", &self.to_sql(self.ctx.executor().dialect()).0)
            .field("paths", &self.joins.paths())
            .finish()
    }
}
