//! Schema metadata.
//!
//! [`MetadataAccessor`] is the narrow interface models use to resolve an
//! entity type to its table, columns, primary key, relations and rule
//! overrides. [`Schema`] is the in-crate implementation: built in code with
//! [`EntityDef`] builders, or deserialized from a JSON/TOML document.
//!
//! Table names and relation targets may be omitted; they are then guessed
//! from the entity and relation names (`ProductProperty` -> `product_properties`,
//! `towns` -> `Town`).

use crate::inflect;
use crate::validation::{RuleError, RuleSet};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Boolean,
    Json,
}

/// Column descriptor
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnDef {
    /// A non-null column without default
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Cardinality of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    One,
    Many,
}

/// Relation descriptor
///
/// `One` relations pair `fields` (local columns) with `references` (target
/// columns). `Many` relations carry no columns and are resolved through the
/// inverse `One` relation declared on the target.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl RelationDef {
    pub fn one(name: &str) -> Self {
        Self::new(name, RelationKind::One)
    }

    pub fn many(name: &str) -> Self {
        Self::new(name, RelationKind::Many)
    }

    fn new(name: &str, kind: RelationKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: inflect::entity_name(name),
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Override the guessed target entity
    pub fn target(mut self, entity: &str) -> Self {
        self.target = entity.to_string();
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    /// (local, target) column pairs of a `One` relation
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .zip(&self.references)
            .map(|(field, reference)| (field.as_str(), reference.as_str()))
    }
}

/// Everything the schema knows about one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub entity: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub relations: Vec<RelationDef>,
    pub rules: Option<RuleSet>,
}

impl EntityDef {
    /// Start an entity definition, guessing its table name
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            table: inflect::table_name(entity),
            columns: Vec::new(),
            relations: Vec::new(),
            rules: None,
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Extra validation rules, merged over the rules derived from columns
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }
}

/// Read-only view of entity metadata
pub trait MetadataAccessor {
    /// Table backing `entity`, or `None` when the entity is unknown
    fn table_name_of(&self, entity: &str) -> Option<&str>;

    fn columns_of(&self, entity: &str) -> Option<&[ColumnDef]>;

    fn relations_of(&self, entity: &str) -> Option<&[RelationDef]>;

    /// Caller-supplied rule overrides
    fn rules_of(&self, _entity: &str) -> Option<&RuleSet> {
        None
    }

    /// First column flagged as primary key
    fn primary_key_of(&self, entity: &str) -> Option<&ColumnDef> {
        self.columns_of(entity)?
            .iter()
            .find(|column| column.primary_key)
    }

    fn column_of(&self, entity: &str, column: &str) -> Option<&ColumnDef> {
        self.columns_of(entity)?
            .iter()
            .find(|candidate| candidate.name == column)
    }

    fn relation_of(&self, entity: &str, relation: &str) -> Option<&RelationDef> {
        self.relations_of(entity)?
            .iter()
            .find(|candidate| candidate.name == relation)
    }

    /// The `One` relation on the target of `relation` that points back at `entity`'s table
    fn inverse_of(&self, entity: &str, relation: &RelationDef) -> Option<&RelationDef> {
        let table = self.table_name_of(entity)?;
        self.relations_of(&relation.target)?.iter().find(|candidate| {
            candidate.kind == RelationKind::One
                && self.table_name_of(&candidate.target) == Some(table)
        })
    }
}

/// In-memory schema registry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "SchemaDocument")]
pub struct Schema {
    entities: Vec<EntityDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing an earlier definition with the same name
    pub fn entity(mut self, definition: EntityDef) -> Self {
        self.entities.retain(|existing| existing.entity != definition.entity);
        self.entities.push(definition);
        self
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.iter()
    }

    fn get(&self, entity: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|definition| definition.entity == entity)
    }
}

impl MetadataAccessor for Schema {
    fn table_name_of(&self, entity: &str) -> Option<&str> {
        self.get(entity).map(|definition| definition.table.as_str())
    }

    fn columns_of(&self, entity: &str) -> Option<&[ColumnDef]> {
        self.get(entity).map(|definition| definition.columns.as_slice())
    }

    fn relations_of(&self, entity: &str) -> Option<&[RelationDef]> {
        self.get(entity).map(|definition| definition.relations.as_slice())
    }

    fn rules_of(&self, entity: &str) -> Option<&RuleSet> {
        self.get(entity)?.rules.as_ref()
    }
}

/// Error raised while loading a schema document
#[derive(Debug)]
pub enum SchemaError {
    /// A rule override could not be parsed
    Rules { entity: String, source: RuleError },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Rules { entity, source } => {
                write!(f, "Invalid rules for {entity}: {source}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchemaError::Rules { source, .. } => Some(source),
        }
    }
}

/// Serialized form: `{"entities": [{"entity": "User", "columns": [...], ...}]}`
#[derive(Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityDocument>,
}

#[derive(Deserialize)]
struct EntityDocument {
    entity: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnDef>,
    #[serde(default)]
    relations: Vec<RelationDef>,
    #[serde(default)]
    rules: Option<JsonValue>,
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = SchemaError;

    fn try_from(document: SchemaDocument) -> Result<Self, Self::Error> {
        let mut schema = Schema::new();
        for raw in document.entities {
            let mut definition = EntityDef::new(&raw.entity);
            if let Some(table) = raw.table {
                definition.table = table;
            }
            definition.columns = raw.columns;
            definition.relations = raw
                .relations
                .into_iter()
                .map(|mut relation| {
                    if relation.target.is_empty() {
                        relation.target = inflect::entity_name(&relation.name);
                    }
                    relation
                })
                .collect();
            if let Some(rules) = raw.rules {
                definition.rules = Some(RuleSet::from_json(&rules).map_err(|source| {
                    SchemaError::Rules {
                        entity: raw.entity.clone(),
                        source,
                    }
                })?);
            }
            schema = schema.entity(definition);
        }
        Ok(schema)
    }
}
