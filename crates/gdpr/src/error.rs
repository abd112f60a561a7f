use thiserror::Error;

#[derive(Error, Debug)]
pub enum GdprError {
    #[error(transparent)]
    Schema(#[from] k9db_schema::SchemaError),

    #[error(transparent)]
    Storage(#[from] k9db_storage::StorageError),

    #[error("table {0:?} is not registered with this GDPR engine")]
    UnknownTable(String),

    #[error("column {0:?} is not part of table {1:?}'s schema")]
    UnknownColumn(String, String),
}
