use thiserror::Error;

use k9db_codec::Value;
use k9db_storage::StorageError;

#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("compliance violation: {table:?} row {pk:?} is still unowned in the default shard at commit")]
    Orphaned { table: String, pk: Value },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
