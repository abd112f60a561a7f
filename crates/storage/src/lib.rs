//! C4: the table and index layer (spec.md §4.4).
//!
//! One [`schema::TableSchema`] describes a table's column families; one
//! [`table::Table`] performs row and index operations against a
//! `k9db-kv::Store` through a `k9db-crypto::EncryptionManager`. Index
//! selection (`index::select_index`) implements the PK-then-unique-then-
//! longest-composite-prefix priority order, falling back to a logged full
//! scan.

mod error;
mod index;
mod schema;
mod table;

pub use error::StorageError;
pub use index::{encode_index_entry, encode_index_prefix, decode_index_entry, select_index, Equalities, IndexPlan};
pub use schema::{ColumnSchema, IndexSchema, TableSchema};
pub use table::{Row, Table};
