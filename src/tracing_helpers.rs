//! Span helpers for executor calls (feature `tracing`).

use tracing::Span;

/// Span wrapping a single statement sent to the database
pub fn execute_query_span(sql: &str) -> Span {
    tracing::debug_span!("eloquent.query", sql = %sql)
}

/// Span wrapping a model persistence operation (`save`, `delete`)
pub fn persist_span(operation: &'static str, table: &str) -> Span {
    tracing::debug_span!("eloquent.persist", operation, table = %table)
}
