//! Attribute store: reads, writes and change-set diffing.

use super::{Attributes, Model};
use crate::error::OrmError;
use crate::relation::{lazy, Deferred};
use crate::schema::{RelationDef, RelationKind};
use serde_json::Value as JsonValue;

/// Result of reading an attribute by name
#[derive(Debug)]
pub enum Attribute<'a> {
    /// A set column value
    Value(&'a JsonValue),
    /// A relation that has already been resolved
    Related(&'a Related),
    /// A relation that can be resolved through the handle
    Unresolved(Deferred),
    /// Neither a set column nor a resolvable relation
    Absent,
}

impl<'a> Attribute<'a> {
    pub fn value(&self) -> Option<&'a JsonValue> {
        match self {
            Attribute::Value(value) => Some(*value),
            _ => None,
        }
    }

    pub fn related(&self) -> Option<&'a Related> {
        match self {
            Attribute::Related(related) => Some(*related),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Attribute::Absent)
    }
}

/// A resolved relation value
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Model>>),
    Many(Vec<Model>),
}

impl Related {
    pub fn one(&self) -> Option<&Model> {
        match self {
            Related::One(model) => model.as_deref(),
            Related::Many(_) => None,
        }
    }

    /// Related models as a slice; a `One` yields zero or one element
    pub fn many(&self) -> &[Model] {
        match self {
            Related::One(Some(model)) => std::slice::from_ref(&**model),
            Related::One(None) => &[],
            Related::Many(models) => models,
        }
    }

    pub fn models_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        let models: Vec<&mut Model> = match self {
            Related::One(model) => model.iter_mut().map(|m| &mut **m).collect(),
            Related::Many(models) => models.iter_mut().collect(),
        };
        models.into_iter()
    }

    pub fn len(&self) -> usize {
        self.many().len()
    }

    pub fn is_empty(&self) -> bool {
        self.many().is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Related::One(Some(model)) => model.to_json(),
            Related::One(None) => JsonValue::Null,
            Related::Many(models) => JsonValue::Array(models.iter().map(Model::to_json).collect()),
        }
    }
}

/// Anything that can be written through [`Model::set_attribute`]
#[derive(Debug, Clone)]
pub enum Assign {
    Value(JsonValue),
    One(Option<Model>),
    Many(Vec<Option<Model>>),
}

impl From<JsonValue> for Assign {
    fn from(value: JsonValue) -> Self {
        Assign::Value(value)
    }
}

impl From<&str> for Assign {
    fn from(value: &str) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<String> for Assign {
    fn from(value: String) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<i64> for Assign {
    fn from(value: i64) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<i32> for Assign {
    fn from(value: i32) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<f64> for Assign {
    fn from(value: f64) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<bool> for Assign {
    fn from(value: bool) -> Self {
        Assign::Value(JsonValue::from(value))
    }
}

impl From<Model> for Assign {
    fn from(model: Model) -> Self {
        Assign::One(Some(model))
    }
}

impl From<Option<Model>> for Assign {
    fn from(model: Option<Model>) -> Self {
        Assign::One(model)
    }
}

impl From<Vec<Model>> for Assign {
    fn from(models: Vec<Model>) -> Self {
        Assign::Many(models.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<Model>>> for Assign {
    fn from(models: Vec<Option<Model>>) -> Self {
        Assign::Many(models)
    }
}

impl From<Related> for Assign {
    fn from(related: Related) -> Self {
        match related {
            Related::One(model) => Assign::One(model.map(|m| *m)),
            Related::Many(models) => models.into(),
        }
    }
}

impl Model {
    /// Read an attribute
    ///
    /// Columns come back as [`Attribute::Value`]. Relations come back as
    /// [`Attribute::Related`] once resolved, otherwise as an
    /// [`Attribute::Unresolved`] handle when the lookup criteria can be
    /// built from this instance's attributes. Repeated reads of an
    /// unresolved relation return the same handle.
    pub fn get_attribute(&mut self, name: &str) -> Attribute<'_> {
        if self.attributes.contains_key(name) {
            return self
                .attributes
                .get(name)
                .map_or(Attribute::Absent, Attribute::Value);
        }

        self.settle(name);
        if self.relations.contains_key(name) {
            return self
                .relations
                .get(name)
                .map_or(Attribute::Absent, Attribute::Related);
        }
        if let Some(deferred) = self.pending.get(name) {
            return Attribute::Unresolved(deferred.clone());
        }

        let Some(relation) = self.relation_def(name).cloned() else {
            return Attribute::Absent;
        };
        match lazy::defer(self, &relation) {
            Some(deferred) => {
                self.pending.insert(name.to_string(), deferred.clone());
                Attribute::Unresolved(deferred)
            }
            None => Attribute::Absent,
        }
    }

    /// Read an attribute, substituting `fallback` when it is absent
    pub fn get_attribute_or<'a>(&'a mut self, name: &str, fallback: &'a JsonValue) -> Attribute<'a> {
        match self.get_attribute(name) {
            Attribute::Absent => Attribute::Value(fallback),
            found => found,
        }
    }

    /// Resolve a relation (querying at most once) and cache it on the instance
    ///
    /// A `One` whose local fields are unset or null resolves to an empty
    /// `Related::One(None)`, matching what eager loading produces. Returns
    /// `Ok(None)` when `name` is not a relation, or for a `Many` whose
    /// criteria cannot be built.
    pub fn load(&mut self, name: &str) -> Result<Option<&Related>, OrmError> {
        let (deferred, absent) = match self.get_attribute(name) {
            Attribute::Unresolved(deferred) => (Some(deferred), false),
            Attribute::Absent => (None, true),
            _ => (None, false),
        };
        if let Some(deferred) = deferred {
            let related = deferred.resolve()?.clone();
            self.pending.remove(name);
            self.relations.insert(name.to_string(), related);
        } else if absent
            && self
                .relation_def(name)
                .is_some_and(|relation| relation.kind == RelationKind::One)
        {
            self.relations.insert(name.to_string(), Related::One(None));
        }
        Ok(self.relations.get(name))
    }

    /// Mutable access to an already resolved relation
    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.settle(name);
        self.relations.get_mut(name)
    }

    /// Write an attribute
    ///
    /// Columns are stored and diffed against the persisted snapshot; the
    /// return value says whether the change set now holds the column.
    /// Relations coerce the value into models of the target entity and
    /// always return `true`. Unknown names are ignored and return `false`.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Assign>) -> bool {
        let value = value.into();

        if self.columns().iter().any(|column| column.name == name) {
            let Assign::Value(value) = value else {
                log::debug!("Ignoring model value for column {}.{name}", self.entity);
                return false;
            };
            let unchanged = self
                .original
                .as_ref()
                .and_then(|original| original.get(name))
                .filter(|original| same_value(original, &value))
                .cloned();
            if let Some(original) = unchanged {
                self.attributes.insert(name.to_string(), original);
                self.changes.remove(name);
                return false;
            }
            self.attributes.insert(name.to_string(), value.clone());
            self.changes.insert(name.to_string(), value);
            return true;
        }

        let Some(relation) = self.relation_def(name).cloned() else {
            return false;
        };
        match self.coerce(&relation, value) {
            Ok(related) => {
                self.pending.remove(name);
                self.relations.insert(name.to_string(), related);
                true
            }
            Err(e) => {
                log::warn!("Unable to set relation {}.{name}: {e}", self.entity);
                false
            }
        }
    }

    /// Apply [`Model::set_attribute`] to every entry, in order
    pub fn set_attributes(&mut self, attributes: Attributes) {
        for (name, value) in attributes {
            self.set_attribute(&name, value);
        }
    }

    /// Move a memoised handle that has since been resolved into the cache
    fn settle(&mut self, name: &str) {
        let resolved = self
            .pending
            .get(name)
            .and_then(|deferred| deferred.get().cloned());
        if let Some(related) = resolved {
            self.pending.remove(name);
            self.relations.insert(name.to_string(), related);
        }
    }

    fn coerce(&self, relation: &RelationDef, value: Assign) -> Result<Related, OrmError> {
        let models = match value {
            Assign::Value(JsonValue::Array(items)) => items
                .into_iter()
                .map(|item| self.related_model(relation, Assign::Value(item)))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
            Assign::Many(items) => items
                .into_iter()
                .map(|item| self.related_model(relation, Assign::One(item)))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
            single => self.related_model(relation, single)?.into_iter().collect::<Vec<_>>(),
        };

        Ok(match relation.kind {
            RelationKind::One => Related::One(models.into_iter().next().map(Box::new)),
            RelationKind::Many => Related::Many(models),
        })
    }

    /// A model of the relation's target, or `None` for null entries
    fn related_model(&self, relation: &RelationDef, value: Assign) -> Result<Option<Model>, OrmError> {
        match value {
            Assign::One(Some(model)) if model.entity == relation.target => Ok(Some(model)),
            Assign::One(Some(model)) => {
                Model::new(&relation.target, model.attributes, &self.ctx).map(Some)
            }
            Assign::Value(JsonValue::Object(attributes)) => {
                Model::new(&relation.target, attributes, &self.ctx).map(Some)
            }
            Assign::One(None) | Assign::Many(_) | Assign::Value(_) => Ok(None),
        }
    }
}

/// JSON equality where numbers compare by numeric value, so `27` and `27.0`
/// are the same column value
pub(crate) fn same_value(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(left), JsonValue::Number(right)) => {
            match (left.as_i64(), right.as_i64()) {
                (Some(left), Some(right)) => left == right,
                _ => left.as_f64() == right.as_f64(),
            }
        }
        (JsonValue::Array(left), JsonValue::Array(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(left, right)| same_value(left, right))
        }
        (JsonValue::Object(left), JsonValue::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(name, value)| right.get(name).is_some_and(|other| same_value(value, other)))
        }
        _ => left == right,
    }
}
