use crate::error::CodecError;
use crate::value::{ColumnType, Value, NULL_BYTE, SEPARATOR};

/// An ordered list of values encoded as their textual form, each terminated
/// by [`SEPARATOR`] (spec.md §3, "Sequence"). Both row keys and row values
/// are sequences. Supports zero-copy slicing of individual columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    bytes: Vec<u8>,
    /// Byte offset (exclusive of the trailing separator) where each column
    /// ends, i.e. `offsets[i]` is the index of the i-th separator.
    offsets: Vec<usize>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence directly from already-encoded bytes (e.g. read back
    /// from a column family). Recomputes the offset table in one pass.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let offsets = bytes
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| (b == SEPARATOR).then_some(i))
            .collect();
        Self { bytes, offsets }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Append a value's textual encoding followed by the reserved separator.
    pub fn push(&mut self, value: &Value) -> Result<(), CodecError> {
        let payload = value.encode()?;
        self.bytes.extend_from_slice(&payload);
        self.bytes.push(SEPARATOR);
        self.offsets.push(self.bytes.len() - 1);
        Ok(())
    }

    /// Zero-copy slice of the i-th column, excluding the trailing separator.
    pub fn at(&self, i: usize) -> Result<&[u8], CodecError> {
        let end = *self
            .offsets
            .get(i)
            .ok_or(CodecError::ColumnOutOfRange(i, self.offsets.len()))?;
        let start = if i == 0 { 0 } else { self.offsets[i - 1] + 1 };
        Ok(&self.bytes[start..end])
    }

    /// Materialize every column's slice in one pass.
    pub fn split(&self) -> Vec<&[u8]> {
        (0..self.len()).map(|i| self.at(i).expect("i < len")).collect()
    }

    /// Decode the i-th column per its declared type.
    pub fn decode_at(&self, i: usize, ty: ColumnType) -> Result<Value, CodecError> {
        Value::decode(i, ty, self.at(i)?)
    }

    /// Decode the full sequence into typed values using a per-column type
    /// list (the table's schema).
    pub fn decode_all(&self, types: &[ColumnType]) -> Result<Vec<Value>, CodecError> {
        if types.len() != self.len() {
            return Err(CodecError::ColumnOutOfRange(types.len(), self.len()));
        }
        types
            .iter()
            .enumerate()
            .map(|(i, &ty)| self.decode_at(i, ty))
            .collect()
    }

    /// A prefix of this sequence up to (and including the separator after)
    /// column `i` — the byte-prefix used for index prefix-seeks (C4 §4.4).
    pub fn prefix_through(&self, i: usize) -> Result<&[u8], CodecError> {
        let end = *self
            .offsets
            .get(i)
            .ok_or(CodecError::ColumnOutOfRange(i, self.offsets.len()))?;
        Ok(&self.bytes[..=end])
    }

    /// Build a sequence from a list of already-encoded values, in order.
    pub fn from_values(values: &[Value]) -> Result<Self, CodecError> {
        let mut seq = Self::new();
        for v in values {
            seq.push(v)?;
        }
        Ok(seq)
    }

    /// Return a copy of this sequence with the value at `i` replaced —
    /// used by [`update`] to build a new row value with named columns
    /// replaced (spec.md §4.1, `Update(schema, updates)`).
    pub fn with_replaced(&self, types: &[ColumnType], i: usize, new_value: &Value) -> Result<Self, CodecError> {
        let mut values = self.decode_all(types)?;
        *values
            .get_mut(i)
            .ok_or(CodecError::ColumnOutOfRange(i, values.len()))? = new_value.clone();
        Self::from_values(&values)
    }
}

/// Returns true iff `byte` is one of the two reserved bytes that may never
/// appear inside a non-NULL value payload.
pub fn is_reserved_byte(byte: u8) -> bool {
    byte == SEPARATOR || byte == NULL_BYTE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_and_at_round_trip() {
        let mut seq = Sequence::new();
        seq.push(&Value::Text("users__0".into())).unwrap();
        seq.push(&Value::Int(42)).unwrap();
        seq.push(&Value::Null).unwrap();

        assert_eq!(seq.len(), 3);
        assert_eq!(seq.at(0).unwrap(), b"users__0");
        assert_eq!(seq.at(1).unwrap(), b"42");
        assert_eq!(seq.at(2).unwrap(), &[NULL_BYTE]);
    }

    #[test]
    fn from_bytes_recomputes_offsets() {
        let mut built = Sequence::new();
        built.push(&Value::Int(1)).unwrap();
        built.push(&Value::Text("a".into())).unwrap();
        let round_tripped = Sequence::from_bytes(built.as_bytes().to_vec());
        assert_eq!(round_tripped, built);
    }

    #[test]
    fn decode_all_respects_schema_types() {
        let seq = Sequence::from_values(&[Value::Int(7), Value::Text("hi".into()), Value::Null]).unwrap();
        let decoded = seq
            .decode_all(&[ColumnType::Int, ColumnType::Text, ColumnType::Text])
            .unwrap();
        assert_eq!(decoded, vec![Value::Int(7), Value::Text("hi".into()), Value::Null]);
    }

    #[test]
    fn reserved_byte_in_text_is_rejected() {
        let bad = Value::Text("a\u{1E}b".into());
        assert!(bad.encode().is_err());
    }

    #[test]
    fn prefix_through_is_a_valid_seek_prefix() {
        let seq = Sequence::from_values(&[Value::Text("c1".into()), Value::Text("c2".into())]).unwrap();
        assert_eq!(seq.prefix_through(0).unwrap(), b"c1\x1E");
    }
}
