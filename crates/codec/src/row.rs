use crate::error::CodecError;
use crate::sequence::Sequence;
use crate::value::{ColumnType, Value};

/// `<kind>__<user_id>` (spec.md §3, "Shard name").
pub fn shard_name(kind: &str, user_id: &str) -> String {
    format!("{kind}__{user_id}")
}

/// Split a shard name back into `(kind, user_id)` at the first `__`.
/// Mirrors `k9db::util::ShardName::FindSplit` in the original implementation
/// (`examples/original_source/k9db/util/shard_name.cc`): scan left to right
/// for the first `__` pair rather than splitting on the last occurrence,
/// since a user id may itself legally contain underscores.
pub fn split_shard_name(name: &str) -> Option<(&str, &str)> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'_' && bytes[i + 1] == b'_' {
            return Some((&name[..i], &name[i + 2..]));
        }
        i += 1;
    }
    None
}

/// A row's key is the two-value sequence `[shard_name, primary_key]`
/// (spec.md §3, "Row key").
pub fn encode_row_key(shard: &str, pk: &Value) -> Result<Sequence, CodecError> {
    Sequence::from_values(&[Value::Text(shard.to_string()), pk.clone()])
}

/// Decode a row key back into its shard name and primary key.
pub fn decode_row_key(key: &Sequence, pk_type: ColumnType) -> Result<(String, Value), CodecError> {
    let shard = key.decode_at(0, ColumnType::Text)?;
    let pk = key.decode_at(1, pk_type)?;
    let shard = match shard {
        Value::Text(s) => s,
        _ => unreachable!("shard column is always decoded as Text"),
    };
    Ok((shard, pk))
}

/// A row's value is the sequence of all columns in declared order; the PK
/// column appears both in the key and here (spec.md §3, §4.1). `FromInsert`
/// from spec.md §4.1: build the `(key, value)` pair for a freshly inserted
/// row in a given shard.
pub fn from_insert(
    columns: &[Value],
    pk_col: usize,
    shard: &str,
) -> Result<(Sequence, Sequence), CodecError> {
    let pk = columns
        .get(pk_col)
        .ok_or(CodecError::ColumnOutOfRange(pk_col, columns.len()))?;
    let key = encode_row_key(shard, pk)?;
    let value = Sequence::from_values(columns)?;
    Ok((key, value))
}

/// The PK of a row is always read back from its value, never recomputed
/// from the key (spec.md §4.1 invariant).
pub fn pk_of(value: &Sequence, pk_col: usize, pk_type: ColumnType) -> Result<Value, CodecError> {
    value.decode_at(pk_col, pk_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn shard_name_round_trips() {
        let name = shard_name("user", "42");
        assert_eq!(name, "user__42");
        assert_eq!(split_shard_name(&name), Some(("user", "42")));
    }

    #[test]
    fn split_handles_underscores_in_user_id() {
        // first "__" wins, matching the original's left-to-right scan.
        assert_eq!(split_shard_name("user__a__b"), Some(("user", "a__b")));
    }

    #[test]
    fn from_insert_builds_key_with_pk_from_value_not_recomputed() {
        let cols = vec![Value::Int(5), Value::Text("alice".into())];
        let (key, value) = from_insert(&cols, 0, "user__5").unwrap();
        let (shard, pk) = decode_row_key(&key, ColumnType::Int).unwrap();
        assert_eq!(shard, "user__5");
        assert_eq!(pk, Value::Int(5));
        assert_eq!(pk_of(&value, 0, ColumnType::Int).unwrap(), Value::Int(5));
    }
}
