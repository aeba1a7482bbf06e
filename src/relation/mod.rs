//! Relation resolution.
//!
//! - [`lazy`]: a relation read from an instance becomes a [`Deferred`]
//!   lookup, run at most once.
//! - [`eager`]: `ModelQuery::with` registers relation paths and emits the
//!   matching left joins.
//! - [`flatten`]: the joined result set is folded back into one nested
//!   attribute map per root row.

pub mod eager;
pub mod flatten;
pub mod lazy;

pub use eager::JoinTree;
pub use lazy::Deferred;
