use thiserror::Error;

/// §7's error-kind taxonomy; the session dispatch loop matches on this to
/// decide what's safe to retry and what must roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSql,
    SchemaViolation,
    IntegrityError,
    ComplianceViolation,
    TransientConflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum SqlError {
    #[error(transparent)]
    Parse(#[from] k9db_sql::ParseError),

    #[error(transparent)]
    Schema(#[from] k9db_schema::SchemaError),

    #[error(transparent)]
    Storage(#[from] k9db_storage::StorageError),

    #[error(transparent)]
    Plan(#[from] k9db_planner::PlanError),

    #[error(transparent)]
    Gdpr(#[from] k9db_gdpr::GdprError),

    #[error(transparent)]
    Compliance(#[from] k9db_compliance::ComplianceError),

    #[error(transparent)]
    Catalog(#[from] k9db_catalog::CatalogError),

    #[error(transparent)]
    Kv(#[from] k9db_kv::KvError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid TOML configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid SQL: {0}")]
    Invalid(String),

    #[error("unknown table {0:?}")]
    UnknownTable(String),

    #[error("unknown column {0:?} on table {1:?}")]
    UnknownColumn(String, String),

    #[error("a prepared statement was executed with the wrong number of bound arguments")]
    ArgCountMismatch,

    #[error("{0}")]
    Internal(String),
}

impl SqlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::Parse(_) | SqlError::Invalid(_) | SqlError::ArgCountMismatch => ErrorKind::InvalidSql,
            SqlError::Schema(_) | SqlError::UnknownTable(_) | SqlError::UnknownColumn(..) => ErrorKind::SchemaViolation,
            SqlError::Compliance(_) => ErrorKind::ComplianceViolation,
            SqlError::Kv(k9db_kv::KvError::TransientConflict) => ErrorKind::TransientConflict,
            SqlError::Storage(k9db_storage::StorageError::Kv(k9db_kv::KvError::TransientConflict)) => {
                ErrorKind::TransientConflict
            }
            SqlError::Storage(_) | SqlError::Plan(_) | SqlError::Gdpr(_) | SqlError::Catalog(_) => {
                ErrorKind::IntegrityError
            }
            SqlError::Kv(_) | SqlError::Io(_) | SqlError::Config(_) | SqlError::Internal(_) => ErrorKind::Internal,
        }
    }
}
