//! Row flattening for eager loads.
//!
//! A joined query returns one flat row per matched row combination. Each row
//! is split into per-table column maps ([`JoinedRow`]) and folded into an
//! accumulator keyed by primary key, so join fan-out collapses back into one
//! entry per entity. `Many` relations accumulate in first-seen order and are
//! turned into sequences in a single bottom-up pass once every row has been
//! consumed.

use super::eager::JoinTree;
use crate::model::Attributes;
use crate::schema::RelationKind;
use serde_json::Value as JsonValue;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One flat row split by table
///
/// Columns aliased `"<table>.<column>"` belong to that table, bare columns to
/// the root table. Joined tables whose columns are all NULL (left-join
/// misses) are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    tables: HashMap<String, Attributes>,
}

impl JoinedRow {
    pub fn split(root_table: &str, row: Attributes) -> Self {
        let mut tables: HashMap<String, Attributes> = HashMap::new();
        for (alias, value) in row {
            let (table, column) = match alias.split_once('.') {
                Some((table, column)) => (table.to_string(), column.to_string()),
                None => (root_table.to_string(), alias),
            };
            tables.entry(table).or_default().insert(column, value);
        }
        tables.retain(|table, columns| {
            table == root_table || columns.values().any(|value| !value.is_null())
        });
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&Attributes> {
        self.tables.get(name)
    }
}

/// Fold joined rows into nested attribute maps, one per root entity
///
/// Requested relations are always present on the output: `Many` as an
/// array (possibly empty), `One` as an object or null.
pub fn flatten(tree: &JoinTree, rows: Vec<Attributes>) -> Vec<Attributes> {
    let mut roots = Accumulator::default();
    for row in rows {
        roots.absorb(tree, &JoinedRow::split(&tree.table, row));
    }
    roots.into_sequence()
}

struct Node {
    key: String,
    attributes: Attributes,
    relations: Vec<(String, Nested)>,
}

enum Nested {
    One(Option<Box<Node>>),
    Many(Accumulator),
}

#[derive(Default)]
struct Accumulator {
    order: Vec<String>,
    nodes: HashMap<String, Node>,
}

/// Deduplication key: the primary key value, or every column when there is none
fn row_key(columns: &Attributes, key: Option<&str>) -> String {
    key.and_then(|key| columns.get(key))
        .filter(|value| !value.is_null())
        .map_or_else(
            || JsonValue::Object(columns.clone()).to_string(),
            JsonValue::to_string,
        )
}

impl Node {
    fn new(tree: &JoinTree, key: String, attributes: Attributes) -> Self {
        let relations = tree
            .relations
            .iter()
            .map(|edge| {
                let nested = match edge.kind {
                    RelationKind::One => Nested::One(None),
                    RelationKind::Many => Nested::Many(Accumulator::default()),
                };
                (edge.name.clone(), nested)
            })
            .collect();
        Self {
            key,
            attributes,
            relations,
        }
    }

    fn absorb(&mut self, tree: &JoinTree, row: &JoinedRow) {
        for (edge, (_, nested)) in tree.relations.iter().zip(self.relations.iter_mut()) {
            match nested {
                Nested::Many(accumulator) => accumulator.absorb(&edge.node, row),
                Nested::One(slot) => {
                    let Some(columns) = row.table(&edge.node.table) else {
                        continue;
                    };
                    let key = row_key(columns, edge.node.key.as_deref());
                    if slot.as_ref().map_or(true, |node| node.key != key) {
                        *slot = Some(Box::new(Node::new(&edge.node, key, columns.clone())));
                    }
                    if let Some(node) = slot {
                        node.absorb(&edge.node, row);
                    }
                }
            }
        }
    }

    fn into_attributes(self) -> Attributes {
        let mut attributes = self.attributes;
        for (name, nested) in self.relations {
            let value = match nested {
                Nested::One(node) => node.map_or(JsonValue::Null, |node| {
                    JsonValue::Object(node.into_attributes())
                }),
                Nested::Many(accumulator) => JsonValue::Array(
                    accumulator
                        .into_sequence()
                        .into_iter()
                        .map(JsonValue::Object)
                        .collect(),
                ),
            };
            attributes.insert(name, value);
        }
        attributes
    }
}

impl Accumulator {
    fn absorb(&mut self, tree: &JoinTree, row: &JoinedRow) {
        let Some(columns) = row.table(&tree.table) else {
            return;
        };
        let key = row_key(columns, tree.key.as_deref());
        let node = match self.nodes.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                let key = entry.key().clone();
                entry.insert(Node::new(tree, key, columns.clone()))
            }
        };
        node.absorb(tree, row);
    }

    fn into_sequence(mut self) -> Vec<Attributes> {
        self.order
            .iter()
            .filter_map(|key| self.nodes.remove(key))
            .map(Node::into_attributes)
            .collect()
    }
}
