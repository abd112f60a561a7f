use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Schema(#[from] k9db_schema::SchemaError),

    #[error(transparent)]
    Storage(#[from] k9db_storage::StorageError),

    #[error("column {0:?} is not part of table {1:?}'s schema")]
    UnknownColumn(String, String),

    #[error("row has {0} columns, but table {1:?} expects at least {2}")]
    ShortRow(usize, String, usize),
}
