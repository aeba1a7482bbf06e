//! Eager loading through left joins.
//!
//! `ModelQuery::with("town.county")` registers each relation path in a
//! [`JoinTree`] rooted at the queried entity and emits one `LEFT JOIN` per
//! newly registered relation. Joined columns are selected under
//! `"<table>.<column>"` aliases so [`flatten`](super::flatten) can split each
//! flat row back into per-table column maps.
//!
//! Joins always pair columns through the `One` side of a relation: a `One`
//! joins `target.references = current.fields`, a `Many` goes through the
//! inverse `One` declared on its target and joins
//! `target.inverse.fields = current.inverse.references`.
//!
//! Each table can appear once per query, since joined rows are keyed by
//! table name.

use crate::error::OrmError;
use crate::query::Name;
use crate::schema::{MetadataAccessor, RelationKind};
use sea_query::{Condition, Expr, ExprTrait, JoinType, SelectStatement};

/// Requested relation paths, as a tree of joined entities
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTree {
    pub entity: String,
    pub table: String,
    /// Primary key column, used to deduplicate join fan-out
    pub key: Option<String>,
    pub relations: Vec<JoinEdge>,
}

/// A registered relation and the subtree below it
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    pub name: String,
    pub kind: RelationKind,
    pub node: JoinTree,
}

/// A left join to add to the statement
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    /// ((joined table, column), (joined-to table, column))
    pub on: Vec<((String, String), (String, String))>,
    pub columns: Vec<String>,
}

impl JoinTree {
    /// Tree with no requested relations
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Configuration` when `entity` is not in the schema.
    pub fn root(entity: &str, metadata: &dyn MetadataAccessor) -> Result<Self, OrmError> {
        let table = metadata
            .table_name_of(entity)
            .ok_or_else(|| OrmError::Configuration(entity.to_string()))?;
        Ok(Self {
            entity: entity.to_string(),
            table: table.to_string(),
            key: metadata.primary_key_of(entity).map(|column| column.name.clone()),
            relations: Vec::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&JoinEdge> {
        self.relations.iter().find(|edge| edge.name == name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut JoinEdge> {
        self.relations.iter_mut().find(|edge| edge.name == name)
    }

    /// Every registered path, parents before children
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for edge in &self.relations {
            paths.push(edge.name.clone());
            paths.extend(
                edge.node
                    .paths()
                    .into_iter()
                    .map(|child| format!("{}.{child}", edge.name)),
            );
        }
        paths
    }

    /// `(table, key)` for this node and every joined node, parents first
    ///
    /// Keyless tables are left out.
    pub fn key_columns(&self) -> Vec<(String, String)> {
        let mut columns: Vec<(String, String)> = self
            .key
            .iter()
            .map(|key| (self.table.clone(), key.clone()))
            .collect();
        for edge in &self.relations {
            columns.extend(edge.node.key_columns());
        }
        columns
    }

    /// Register a dot-separated relation path
    ///
    /// Returns the join to emit, or `None` when nothing needs joining: an
    /// empty path, a path registered earlier, an unknown relation, or a
    /// `Many` with no inverse `One` on its target. Trailing empty segments
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::MissingParentRelation` when a parent path has not
    /// been registered yet.
    pub fn register(
        &mut self,
        path: &str,
        metadata: &dyn MetadataAccessor,
    ) -> Result<Option<Join>, OrmError> {
        let mut segments: Vec<&str> = path.split('.').collect();
        while segments.last().is_some_and(|segment| segment.is_empty()) {
            segments.pop();
        }
        let Some((last, parents)) = segments.split_last() else {
            return Ok(None);
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            current = match current.child_mut(segment) {
                Some(edge) => &mut edge.node,
                None => {
                    return Err(OrmError::MissingParentRelation(
                        segments[..=depth].join("."),
                    ))
                }
            };
        }

        if current.child(last).is_some() {
            return Ok(None);
        }
        let Some(relation) = metadata.relation_of(&current.entity, last) else {
            log::debug!("Ignoring unknown relation {path}");
            return Ok(None);
        };
        let Some(table) = metadata.table_name_of(&relation.target) else {
            return Ok(None);
        };

        let on = match relation.kind {
            RelationKind::One => relation
                .pairs()
                .map(|(field, reference)| {
                    (
                        (table.to_string(), reference.to_string()),
                        (current.table.clone(), field.to_string()),
                    )
                })
                .collect::<Vec<_>>(),
            RelationKind::Many => {
                let Some(inverse) = metadata.inverse_of(&current.entity, relation) else {
                    log::debug!("Ignoring {path}: no inverse relation on {}", relation.target);
                    return Ok(None);
                };
                inverse
                    .pairs()
                    .map(|(field, reference)| {
                        (
                            (table.to_string(), field.to_string()),
                            (current.table.clone(), reference.to_string()),
                        )
                    })
                    .collect()
            }
        };
        if on.is_empty() {
            return Ok(None);
        }

        let columns: Vec<String> = metadata
            .columns_of(&relation.target)
            .unwrap_or(&[])
            .iter()
            .map(|column| column.name.clone())
            .collect();

        current.relations.push(JoinEdge {
            name: relation.name.clone(),
            kind: relation.kind,
            node: JoinTree {
                entity: relation.target.clone(),
                table: table.to_string(),
                key: metadata
                    .primary_key_of(&relation.target)
                    .map(|column| column.name.clone()),
                relations: Vec::new(),
            },
        });

        Ok(Some(Join {
            table: table.to_string(),
            on,
            columns,
        }))
    }
}

impl Join {
    /// Add the `LEFT JOIN` and the aliased joined columns to `statement`
    pub fn apply(&self, statement: &mut SelectStatement) {
        let condition = self.on.iter().fold(
            Condition::all(),
            |condition, ((table, column), (other_table, other_column))| {
                condition.add(
                    Expr::col((Name::new(table), Name::new(column)))
                        .equals((Name::new(other_table), Name::new(other_column))),
                )
            },
        );
        statement.join(JoinType::LeftJoin, Name::new(&self.table), condition);

        for column in &self.columns {
            statement.expr_as(
                Expr::col((Name::new(&self.table), Name::new(column))),
                Name(format!("{}.{column}", self.table)),
            );
        }
    }
}
