//! Active-record models.
//!
//! A [`Model`] is one entity instance: its column attributes, the change set
//! recorded since the last persisted snapshot, and the relation values that
//! have been resolved for it. Everything a model needs from the outside
//! world (metadata, executor, change hook) travels in an explicit
//! [`Context`].
//!
//! # Example
//!
//! ```no_run
//! use eloquent::{Context, Model, SqliteExecutor};
//! use eloquent::schema::{ColumnDef, ColumnType, EntityDef, Schema};
//! use serde_json::json;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::new().entity(
//!     EntityDef::new("User")
//!         .column(ColumnDef::new("id", ColumnType::Integer).primary_key().auto_increment())
//!         .column(ColumnDef::new("name", ColumnType::Text)),
//! );
//! let ctx = Context::new(Arc::new(schema), Rc::new(SqliteExecutor::open("app.db")?));
//!
//! let mut user = Model::new("User", json!({"name": "John"}).as_object().cloned().unwrap_or_default(), &ctx)?;
//! user.save();
//! # Ok(())
//! # }
//! ```

mod attributes;
mod persistence;

pub use attributes::{Assign, Attribute, Related};

use crate::error::OrmError;
use crate::executor::Executor;
use crate::query::ModelQuery;
use crate::relation::Deferred;
use crate::schema::{ColumnDef, MetadataAccessor, RelationDef};
use crate::validation::Validator;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Insertion-ordered attribute map
pub type Attributes = serde_json::Map<String, JsonValue>;

/// Kind of write reported to the change hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Callback fired after every successful insert, update or delete
pub type OnChange = Rc<dyn Fn(ChangeKind, &Model)>;

/// Shared handles every model and query carries
#[derive(Clone)]
pub struct Context {
    metadata: Arc<dyn MetadataAccessor>,
    executor: Rc<dyn Executor>,
    on_change: Option<OnChange>,
}

impl Context {
    pub fn new(metadata: Arc<dyn MetadataAccessor>, executor: Rc<dyn Executor>) -> Self {
        Self {
            metadata,
            executor,
            on_change: None,
        }
    }

    /// Register a change hook
    pub fn with_on_change(mut self, on_change: impl Fn(ChangeKind, &Model) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }

    pub fn metadata(&self) -> &dyn MetadataAccessor {
        self.metadata.as_ref()
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub(crate) fn notify(&self, kind: ChangeKind, model: &Model) {
        if let Some(on_change) = &self.on_change {
            on_change(kind, model);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("dialect", &self.executor.dialect())
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// One entity instance
#[derive(Clone)]
pub struct Model {
    entity: String,
    table: String,
    ctx: Context,
    attributes: Attributes,
    changes: Attributes,
    original: Option<Attributes>,
    relations: HashMap<String, Related>,
    pending: HashMap<String, Deferred>,
}

impl Model {
    /// Build an entity instance from an attribute map
    ///
    /// Relation entries in `attributes` (as produced by eager loading) are
    /// hydrated into related models. The persisted snapshot is seeded only
    /// when the column attributes are complete; the change set is cleared
    /// when a primary key is present.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` when `entity` is not in the schema.
    pub fn new(entity: &str, attributes: Attributes, ctx: &Context) -> Result<Self, OrmError> {
        let table = ctx
            .metadata()
            .table_name_of(entity)
            .ok_or_else(|| OrmError::Configuration(entity.to_string()))?
            .to_string();

        let mut model = Self {
            entity: entity.to_string(),
            table,
            ctx: ctx.clone(),
            attributes: Attributes::new(),
            changes: Attributes::new(),
            original: None,
            relations: HashMap::new(),
            pending: HashMap::new(),
        };

        model.set_attributes(attributes);
        if model.is_complete() {
            model.original = Some(model.attributes.clone());
        }
        if let Some(original) = &model.original {
            model
                .changes
                .retain(|name, value| original.get(name) != Some(value));
        }
        if model.key().is_some() {
            model.changes.clear();
        }
        Ok(model)
    }

    /// New instance of the same entity type
    pub fn factory(&self, attributes: Attributes) -> Result<Model, OrmError> {
        Model::new(&self.entity, attributes, &self.ctx)
    }

    /// Turn raw rows into instances of the same entity type
    pub fn hydrate(&self, rows: Vec<Attributes>) -> Result<Vec<Model>, OrmError> {
        rows.into_iter().map(|row| self.factory(row)).collect()
    }

    /// Start a query against this entity's table
    pub fn query(&self) -> ModelQuery {
        ModelQuery::for_model(self)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn columns(&self) -> &[ColumnDef] {
        self.ctx.metadata().columns_of(&self.entity).unwrap_or(&[])
    }

    /// Relation descriptors declared for this entity
    pub fn relations(&self) -> &[RelationDef] {
        self.ctx.metadata().relations_of(&self.entity).unwrap_or(&[])
    }

    pub fn key_name(&self) -> Option<&str> {
        self.ctx
            .metadata()
            .primary_key_of(&self.entity)
            .map(|column| column.name.as_str())
    }

    /// Primary key value; `None` when the table has no key or it is unset/null
    pub fn key(&self) -> Option<&JsonValue> {
        let name = self.key_name()?;
        self.attributes.get(name).filter(|value| !value.is_null())
    }

    pub fn get_attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_changes(&self) -> &Attributes {
        &self.changes
    }

    /// Last persisted (or persistable) state; `None` while incomplete
    pub fn get_persisted_attributes(&self) -> Option<&Attributes> {
        self.original.as_ref()
    }

    /// Typed access to a column attribute
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.attributes
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Whether the column attributes pass the entity's validator
    pub fn is_complete(&self) -> bool {
        self.validator().passes(&self.attributes)
    }

    /// Derived column rules merged with any registered overrides
    pub fn validator(&self) -> Validator {
        let metadata = self.ctx.metadata();
        Validator::for_columns(self.columns(), metadata.rules_of(&self.entity))
    }

    /// Attributes plus every resolved relation, nested
    pub fn to_json(&self) -> JsonValue {
        let mut out = self.attributes.clone();
        for relation in self.relations() {
            if let Some(related) = self.relations.get(&relation.name) {
                out.insert(relation.name.clone(), related.to_json());
            }
        }
        JsonValue::Object(out)
    }

    pub(crate) fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.ctx.metadata().relation_of(&self.entity, name)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("entity", &self.entity)
            .field("attributes", &self.attributes)
            .field("changes", &self.changes)
            .field("relations", &self.relations)
            .finish_non_exhaustive()
    }
}
