use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("column family {0:?} does not exist")]
    NoSuchColumnFamily(String),

    #[error("lock wait timed out after {0:?}")]
    LockTimeout(std::time::Duration),

    #[error("transaction conflicts with a concurrent commit to its read set")]
    TransientConflict,

    #[error("underlying rocksdb error: {0}")]
    Backend(#[from] rocksdb::Error),
}
