//! C8: the GDPR GET/FORGET engine (spec.md §4.8).
//!
//! Traversal itself only needs the shard descriptor graph and each table's
//! rules; row access is a narrow [`GdprStore`] seam so this crate never
//! touches `k9db-kv` directly, mirroring how `k9db-planner`'s
//! [`k9db_planner::ShardLookup`] keeps the plan compiler free of storage.

mod error;
mod rules;
mod traverse;

pub use error::GdprError;
pub use rules::RuleRegistry;
pub use traverse::{gdpr_forget, gdpr_get, ForgetOutcome, GdprRow, GdprStore, GetOutcome, SchemaLookup};
