use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Kv(#[from] k9db_kv::KvError),

    #[error("catalog sequence counter entry is corrupt ({0} bytes, expected 8)")]
    CorruptCounter(usize),

    #[error("catalog DDL entry is not valid UTF-8: {0}")]
    CorruptDdl(#[from] std::string::FromUtf8Error),
}
