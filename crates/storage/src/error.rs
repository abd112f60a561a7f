use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Codec(#[from] k9db_codec::CodecError),

    #[error(transparent)]
    Crypto(#[from] k9db_crypto::CryptoError),

    #[error(transparent)]
    Kv(#[from] k9db_kv::KvError),

    #[error("column {0:?} is not part of table {1:?}'s schema")]
    UnknownColumn(String, String),

    #[error("no index covers the requested columns; falling back to a full scan")]
    NoMatchingIndex,
}
