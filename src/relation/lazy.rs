//! Lazy loading of relations.
//!
//! Reading an unresolved relation from a [`Model`] yields a [`Deferred`]
//! handle. The handle carries the lookup criteria built from the owning
//! instance's attributes and runs the target's query the first time it is
//! resolved; later calls return the memoised outcome without querying again.
//!
//! # Example
//!
//! ```no_run
//! # use eloquent::{Attribute, Model};
//! # fn demo(user: &mut Model) -> Result<(), eloquent::OrmError> {
//! if let Attribute::Unresolved(town) = user.get_attribute("town") {
//!     let town = town.resolve()?;
//!     println!("{:?}", town.one().map(|t| t.get::<String>("name")));
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::OrmError;
use crate::model::{Context, Model, Related};
use crate::query::ModelQuery;
use crate::schema::{RelationDef, RelationKind};
use once_cell::unsync::OnceCell;
use sea_query::Order;
use serde_json::Value as JsonValue;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a relation lookup that has not necessarily run yet
///
/// Clones share the same memoised outcome.
#[derive(Clone)]
pub struct Deferred(Rc<Lookup>);

struct Lookup {
    relation: String,
    kind: RelationKind,
    target: String,
    /// (target column, required value)
    criteria: Vec<(String, JsonValue)>,
    ctx: Context,
    outcome: OnceCell<Related>,
}

impl Deferred {
    /// Run the lookup, or return the outcome of an earlier run
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` when the target entity is unknown
    /// and `OrmError::Execution` when the query fails. A failed run is not
    /// memoised.
    pub fn resolve(&self) -> Result<&Related, OrmError> {
        let lookup = &self.0;
        lookup.outcome.get_or_try_init(|| {
            log::debug!("Lazy loading {} ({})", lookup.relation, lookup.target);
            let mut query = ModelQuery::new(&lookup.target, &lookup.ctx)?;
            for (column, value) in &lookup.criteria {
                query = query.and_where((column.as_str(), value.clone()))?;
            }
            Ok(match lookup.kind {
                RelationKind::One => {
                    Related::One(query.limit(1).hydrate()?.into_iter().next().map(Box::new))
                }
                RelationKind::Many => {
                    // Same order as eager loading
                    let key = lookup
                        .ctx
                        .metadata()
                        .primary_key_of(&lookup.target)
                        .map(|column| column.name.clone());
                    if let Some(key) = key {
                        query = query.order_by(&key, Order::Asc);
                    }
                    Related::Many(query.hydrate()?)
                }
            })
        })
    }

    /// The memoised outcome, if the lookup already ran
    pub fn get(&self) -> Option<&Related> {
        self.0.outcome.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.0.outcome.get().is_some()
    }

    /// Name of the relation this handle resolves
    pub fn relation(&self) -> &str {
        &self.0.relation
    }

    /// Whether both handles share one lookup
    pub fn same_handle(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("relation", &self.0.relation)
            .field("target", &self.0.target)
            .field("criteria", &self.0.criteria)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Build the lookup for `relation` from `model`'s current attributes
///
/// `One` relations match `target.references[i] = model[fields[i]]`. `Many`
/// relations go through the inverse `One` declared on the target and match
/// `target.inverse.fields[i] = model[inverse.references[i]]`. Returns `None`
/// when no pairing exists or any local value is absent or null.
pub(crate) fn defer(model: &Model, relation: &RelationDef) -> Option<Deferred> {
    let pairs: Vec<(String, String)> = match relation.kind {
        RelationKind::One => relation
            .pairs()
            .map(|(local, target)| (target.to_string(), local.to_string()))
            .collect(),
        RelationKind::Many => model
            .context()
            .metadata()
            .inverse_of(model.entity(), relation)?
            .pairs()
            .map(|(target, local)| (target.to_string(), local.to_string()))
            .collect(),
    };
    if pairs.is_empty() {
        return None;
    }

    let criteria = pairs
        .into_iter()
        .map(|(target, local)| {
            model
                .get_attributes()
                .get(&local)
                .filter(|value| !value.is_null())
                .map(|value| (target, value.clone()))
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Deferred(Rc::new(Lookup {
        relation: relation.name.clone(),
        kind: relation.kind,
        target: relation.target.clone(),
        criteria,
        ctx: model.context().clone(),
        outcome: OnceCell::new(),
    })))
}
