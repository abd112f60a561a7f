use k9db_codec::{Sequence, Value};
use k9db_primitives::{ColId, IndexId};

use crate::error::StorageError;
use crate::schema::{IndexSchema, TableSchema};

/// Equality constraints read off a query's `WHERE` clause, keyed by column.
/// Order doesn't matter; [`select_index`] matches them against each index's
/// declared column order.
pub type Equalities<'a> = [(ColId, Value)];

/// The chosen access path for a query (spec.md §4.4, "Index selection
/// algorithm"), in priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexPlan {
    Pk(Value),
    Unique { index: IndexId, value: Value },
    /// `remaining` columns of the index beyond the matched prefix must be
    /// applied as an in-memory filter over candidates found by the prefix
    /// scan (spec.md §4.4, "Composite encoding").
    Composite { index: IndexId, prefix: Vec<Value>, remaining: ColList },
    FullScan,
}

use k9db_primitives::ColList;

pub fn select_index(schema: &TableSchema, equalities: &Equalities<'_>) -> IndexPlan {
    if let Some((_, v)) = equalities.iter().find(|(c, _)| *c == schema.pk_column) {
        return IndexPlan::Pk(v.clone());
    }

    for (col, v) in equalities {
        if let Some(idx) = schema.unique_index_over(*col) {
            return IndexPlan::Unique { index: idx.id, value: v.clone() };
        }
    }

    let mut best: Option<(&IndexSchema, usize)> = None;
    for idx in &schema.indices {
        if idx.columns.len() == 1 {
            continue; // single-column non-unique indices are handled as 1-wide composites below
        }
        let mut matched = 0;
        for col in idx.columns.iter() {
            if equalities.iter().any(|(c, _)| c == col) {
                matched += 1;
            } else {
                break;
            }
        }
        if matched == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((b, m)) => matched > m || (matched == m && idx.columns.len() > b.columns.len()),
        };
        if better {
            best = Some((idx, matched));
        }
    }
    // Non-unique single-column indices are a degenerate composite with a
    // full, 1-column prefix match.
    for idx in &schema.indices {
        if idx.columns.len() != 1 {
            continue;
        }
        let col = idx.columns[0];
        if !equalities.iter().any(|(c, _)| *c == col) {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, m)) => m < 1,
        };
        if better {
            best = Some((idx, 1));
        }
    }

    match best {
        Some((idx, matched)) => {
            let prefix = idx
                .columns
                .iter()
                .take(matched)
                .map(|c| equalities.iter().find(|(cc, _)| cc == c).unwrap().1.clone())
                .collect();
            let remaining = idx.columns.iter().skip(matched).copied().collect();
            IndexPlan::Composite { index: idx.id, prefix, remaining }
        }
        None => {
            log::warn!("no index covers table {:?}'s query constraints; full scan", schema.name);
            IndexPlan::FullScan
        }
    }
}

/// `<indexed_value(s)> 0x1E <shard> 0x1E <pk> 0x1E` (spec.md §3, "Key format
/// in the index column family").
pub fn encode_index_entry(values: &[Value], shard: &str, pk: &Value) -> Result<Sequence, StorageError> {
    let mut cols = values.to_vec();
    cols.push(Value::Text(shard.to_string()));
    cols.push(pk.clone());
    Ok(Sequence::from_values(&cols)?)
}

/// The seek prefix for a lookup constrained to `values` (a strict prefix of
/// the entry above, `<indexed_value(s)> 0x1E`).
pub fn encode_index_prefix(values: &[Value]) -> Result<Vec<u8>, StorageError> {
    Ok(Sequence::from_values(values)?.into_bytes())
}

/// Recover `(shard, pk)` from a full index entry key, given how many leading
/// columns are the indexed value(s).
pub fn decode_index_entry(
    entry: &Sequence,
    num_indexed_cols: usize,
    pk_type: k9db_codec::ColumnType,
) -> Result<(String, Value), StorageError> {
    let shard = match entry.decode_at(num_indexed_cols, k9db_codec::ColumnType::Text)? {
        Value::Text(s) => s,
        _ => unreachable!("shard column is always Text"),
    };
    let pk = entry.decode_at(num_indexed_cols + 1, pk_type)?;
    Ok((shard, pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_primitives::{ColId, IndexId, TableId};
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    fn schema() -> TableSchema {
        use crate::schema::ColumnSchema;
        TableSchema {
            id: TableId(0),
            name: "t".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "a".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "b".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "c".into(), ty: k9db_codec::ColumnType::Int, nullable: true },
            ],
            pk_column: ColId(0),
            indices: vec![
                IndexSchema { id: IndexId(1), columns: smallvec![ColId(1)], unique: true },
                IndexSchema { id: IndexId(2), columns: smallvec![ColId(2), ColId(3)], unique: false },
            ],
        }
    }

    #[test]
    fn pk_constraint_always_wins() {
        let s = schema();
        let eq = [(ColId(0), Value::Int(5)), (ColId(1), Value::Int(9))];
        assert_eq!(select_index(&s, &eq), IndexPlan::Pk(Value::Int(5)));
    }

    #[test]
    fn unique_column_beats_composite() {
        let s = schema();
        let eq = [(ColId(1), Value::Int(9)), (ColId(2), Value::Int(1))];
        assert_eq!(
            select_index(&s, &eq),
            IndexPlan::Unique { index: IndexId(1), value: Value::Int(9) }
        );
    }

    #[test]
    fn composite_prefix_match_leaves_remaining_as_filter() {
        let s = schema();
        let eq = [(ColId(2), Value::Int(1))];
        match select_index(&s, &eq) {
            IndexPlan::Composite { index, prefix, remaining } => {
                assert_eq!(index, IndexId(2));
                assert_eq!(prefix, vec![Value::Int(1)]);
                assert_eq!(remaining.as_slice(), [ColId(3)]);
            }
            other => panic!("expected Composite, got {other:?}"),
        }
    }

    #[test]
    fn no_constrained_columns_is_a_full_scan() {
        let s = schema();
        assert_eq!(select_index(&s, &[]), IndexPlan::FullScan);
    }

    #[test]
    fn index_entry_round_trips_shard_and_pk() {
        let entry = encode_index_entry(&[Value::Int(1)], "user__5", &Value::Int(42)).unwrap();
        let (shard, pk) = decode_index_entry(&entry, 1, k9db_codec::ColumnType::Int).unwrap();
        assert_eq!(shard, "user__5");
        assert_eq!(pk, Value::Int(42));
    }
}
