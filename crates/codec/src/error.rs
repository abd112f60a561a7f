use thiserror::Error;

/// Errors raised while encoding or decoding a [`crate::Sequence`] into typed
/// values. Grounded on the teacher's `TableError::DecodeField` /
/// `RowDecodeError` variants (`crates/core/src/db/datastore/error.rs`), which
/// report the same "expected X, found Y at column N" shape.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("column {col}: expected {expected}, found {found:?}")]
    TypeMismatch {
        col: usize,
        expected: &'static str,
        found: String,
    },
    #[error("column {0} out of range for a sequence of {1} columns")]
    ColumnOutOfRange(usize, usize),
    #[error("value payload contains a reserved separator or NULL byte")]
    ReservedByteInPayload,
    #[error("failed to parse integer column {0}: {1}")]
    ParseInt(usize, String),
}
