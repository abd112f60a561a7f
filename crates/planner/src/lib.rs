//! C6: the sharding plan compiler (spec.md §4.6).
//!
//! A [`k9db_schema::ShardGraph`] only knows the *shape* of ownership (which
//! columns point at which ancestors); resolving a concrete row into concrete
//! shard names needs the row's actual values, and — for a `Transitive`
//! chain — the current placement of an ancestor row the planner does not
//! itself store. [`ShardLookup`] is the seam: `k9db-engine` implements it
//! against `k9db-storage`'s PK index so this crate stays free of any KV
//! dependency.

mod error;
mod insert;
mod select;
mod update;
mod varowned;

pub use error::PlanError;
pub use insert::{compile_insert, requires_ownership, InsertPlan};
pub use select::{compile_select, SelectPlan};
pub use update::{compile_update, UpdatePlan};
pub use varowned::{varowned_links, VarownedLink};

use k9db_codec::Value;
use k9db_primitives::{DEFAULT_SHARD_ID, DEFAULT_SHARD_KIND};
use k9db_storage::TableSchema;

/// Resolves the shard(s) an ancestor row currently occupies, keyed by
/// `(table, pk)`. The only storage-dependent operation the plan compiler
/// needs — everything else is pure graph/value arithmetic.
pub trait ShardLookup {
    fn shards_of(&self, table: &str, pk: &Value) -> Result<Vec<String>, PlanError>;
}

pub fn default_shard() -> String {
    format!("{DEFAULT_SHARD_KIND}__{DEFAULT_SHARD_ID}")
}

pub fn shard_name(kind: &str, id: &Value) -> String {
    format!("{kind}__{id}")
}

pub(crate) fn column_index(schema: &TableSchema, name: &str) -> Result<usize, PlanError> {
    schema
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| PlanError::UnknownColumn(name.to_string(), schema.name.clone()))
}
