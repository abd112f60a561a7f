//! C5: the shard descriptor graph and schema state (spec.md §4.5).
//!
//! Ownership is expressed as `FOREIGN KEY` annotations on `CREATE TABLE`
//! (`OWNED_BY`, `ACCESSED_BY`, `OWNS`, `ACCESSES`). [`ShardGraph::add_table`]
//! folds each new table's annotations into fully flattened ownership chains
//! at declaration time, so every other component queries pre-computed chains
//! rather than re-deriving them.

mod error;
mod graph;
mod types;

pub use error::SchemaError;
pub use graph::ShardGraph;
pub use types::{
    chain_is_access_only, DescriptorKind, FkAnnotation, OwnershipChain, Relation, ShardDescriptor,
};
