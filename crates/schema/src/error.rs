use k9db_primitives::TableId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("table {0:?} is not declared in this schema")]
    UnknownTable(String),

    #[error("column {col:?} referenced by a FOREIGN KEY does not exist on table {table:?}")]
    UnknownColumn { table: String, col: String },

    #[error("table {table:?} is {kind} of itself via column {col:?}, with no path back to a data subject")]
    UnresolvableSelfReference { table: String, col: String, kind: &'static str },

    #[error("ownership annotation on table {0:?} references table {1:?}, which is not yet declared")]
    ForwardReference(String, String),

    #[error("cycle detected in the ownership graph while visiting table {0:?} as shard kind {1:?}")]
    Cycle(TableId, String),
}
