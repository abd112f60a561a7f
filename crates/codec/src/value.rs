use std::fmt;

use crate::error::CodecError;

/// The reserved column-separator byte (spec.md §3, "Sequence").
pub const SEPARATOR: u8 = 0x1E;
/// The reserved single-byte encoding of `NULL` (spec.md §3, "Value").
pub const NULL_BYTE: u8 = 0x00;

/// The declared type of a column, used to decode a [`crate::Sequence`] slot
/// back into a [`Value`]. Lives here (not in `k9db-schema`) because the
/// codec is the lower leaf crate; schema re-exports this type for its
/// column definitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    UInt,
    Text,
    DateTime,
}

impl ColumnType {
    pub fn label(self) -> &'static str {
        match self {
            ColumnType::Int => "Int",
            ColumnType::UInt => "UInt",
            ColumnType::Text => "Text",
            ColumnType::DateTime => "DateTime",
        }
    }
}

/// A tagged union of the scalar values k9db stores (spec.md §3, "Value").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Text(String),
    DateTime(String),
}

impl Value {
    /// Textual encoding used inside a [`crate::Sequence`]: integers as
    /// decimal, text and datetimes verbatim, `NULL` as the single reserved
    /// byte. The caller is responsible for ensuring no separator or NULL
    /// byte appears inside a non-NULL payload (spec.md §3 invariant).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            Value::Null => vec![NULL_BYTE],
            Value::Int(i) => i.to_string().into_bytes(),
            Value::UInt(u) => u.to_string().into_bytes(),
            Value::Text(s) => s.clone().into_bytes(),
            Value::DateTime(s) => s.clone().into_bytes(),
        };
        if !matches!(self, Value::Null) && bytes.iter().any(|&b| b == SEPARATOR || b == NULL_BYTE) {
            return Err(CodecError::ReservedByteInPayload);
        }
        Ok(bytes)
    }

    /// Decode a raw column slice per its declared [`ColumnType`].
    pub fn decode(col: usize, ty: ColumnType, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes == [NULL_BYTE] {
            return Ok(Value::Null);
        }
        match ty {
            ColumnType::Int => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .map(Value::Int)
                .ok_or_else(|| CodecError::ParseInt(col, String::from_utf8_lossy(bytes).into_owned())),
            ColumnType::UInt => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Value::UInt)
                .ok_or_else(|| CodecError::ParseInt(col, String::from_utf8_lossy(bytes).into_owned())),
            ColumnType::Text => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
            ColumnType::DateTime => Ok(Value::DateTime(String::from_utf8_lossy(bytes).into_owned())),
        }
    }

    pub fn as_text(&self) -> Result<&str, CodecError> {
        match self {
            Value::Text(s) | Value::DateTime(s) => Ok(s),
            other => Err(CodecError::TypeMismatch {
                col: 0,
                expected: "Text",
                found: format!("{other:?}"),
            }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    /// The test-contract literal rendering of §6.3: `NULL` unquoted, strings
    /// unquoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Text(s) | Value::DateTime(s) => write!(f, "{s}"),
        }
    }
}
