use k9db_codec::{Sequence, Value};
use k9db_crypto::EncryptionManager;
use k9db_kv::{ReadSnapshot, Store, WriteTxn};

use crate::error::StorageError;
use crate::index::{self, IndexPlan};
use crate::schema::TableSchema;

/// A logical row found by a shard- or index-based scan: the shard it lives
/// in plus its decoded columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub shard: String,
    pub columns: Vec<Value>,
}

/// Operations over one table's row CF and its indices (C4, spec.md §4.4).
/// Holds no transaction state itself — every method takes the live
/// `WriteTxn`/`ReadSnapshot` explicitly, matching `k9db-kv`'s session-owns-
/// the-transaction model.
pub struct Table<'a> {
    schema: TableSchema,
    crypto: &'a EncryptionManager,
}

impl<'a> Table<'a> {
    pub fn new(schema: TableSchema, crypto: &'a EncryptionManager) -> Self {
        Self { schema, crypto }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Declare this table's column families on a freshly opened store — must
    /// run once before any `Put`/`Get` (mirrors `CREATE TABLE`'s persistence
    /// side effect, spec.md §4.12).
    pub fn create_column_families(&self, store: &Store, opts: &k9db_kv::StoreOptions) -> Result<(), StorageError> {
        for cf in self.schema.column_families() {
            store.create_column_family(&cf, opts)?;
        }
        Ok(())
    }

    fn encode_key(&self, shard: &str, pk: &Value) -> Result<Vec<u8>, StorageError> {
        Ok(self.crypto.encrypt_key(shard.as_bytes(), &pk.encode()?)?)
    }

    fn decode_row(&self, shard: String, value_bytes: &[u8]) -> Result<Row, StorageError> {
        let value = Sequence::from_bytes(value_bytes.to_vec());
        let types: Vec<_> = self.schema.columns.iter().map(|c| c.ty).collect();
        let columns = value.decode_all(&types)?;
        Ok(Row { shard, columns })
    }

    /// `Put(key, value, txn)` (spec.md §4.4): write the row and refresh
    /// every index.
    pub fn put(&self, shard: &str, columns: &[Value], txn: &dyn WriteTxn) -> Result<(), StorageError> {
        let pk = &columns[self.schema.pk_column.0 as usize];
        let key = self.encode_key(shard, pk)?;
        let value = Sequence::from_values(columns)?;
        let encrypted_value = self.crypto.encrypt_value(shard, value.as_bytes())?;
        txn.put(&self.schema.rows_cf(), &key, &encrypted_value)?;
        self.index_add(shard, columns, txn)?;
        Ok(())
    }

    /// `Delete(key, txn)`.
    pub fn delete(&self, shard: &str, pk: &Value, txn: &dyn WriteTxn) -> Result<(), StorageError> {
        if let Some(row) = self.get(shard, pk, txn)? {
            let key = self.encode_key(shard, pk)?;
            txn.delete(&self.schema.rows_cf(), &key)?;
            self.index_delete(shard, &row.columns, txn)?;
        }
        Ok(())
    }

    /// `Get(key, txn)` — a locking read.
    pub fn get(&self, shard: &str, pk: &Value, txn: &dyn WriteTxn) -> Result<Option<Row>, StorageError> {
        let key = self.encode_key(shard, pk)?;
        match txn.get_for_update(&self.schema.rows_cf(), &key)? {
            None => Ok(None),
            Some(bytes) => {
                let plain = self.crypto.decrypt_value(shard, &bytes)?;
                Ok(Some(self.decode_row(shard.to_string(), &plain)?))
            }
        }
    }

    /// `MultiGet(keys, txn)`.
    pub fn multi_get(&self, shards_pks: &[(&str, &Value)], txn: &dyn WriteTxn) -> Result<Vec<Option<Row>>, StorageError> {
        shards_pks.iter().map(|(shard, pk)| self.get(shard, pk, txn)).collect()
    }

    /// `GetAll(txn)` — a full table scan (empty prefix always matches).
    pub fn get_all(&self, txn: &dyn WriteTxn) -> Result<Vec<Row>, StorageError> {
        self.scan_prefix(&[], txn)
    }

    /// `GetShard(encrypted_prefix, txn)`.
    pub fn get_shard(&self, shard: &str, txn: &dyn WriteTxn) -> Result<Vec<Row>, StorageError> {
        let prefix = self.crypto.encrypt_seek(shard.as_bytes())?;
        self.scan_prefix(&prefix, txn)
    }

    /// Same as [`Table::get_shard`] but against a non-locking snapshot, used
    /// by `SELECT` (spec.md §4.4, §4.7).
    pub fn get_shard_snapshot(&self, shard: &str, snap: &dyn ReadSnapshot) -> Result<Vec<Row>, StorageError> {
        let prefix = self.crypto.encrypt_seek(shard.as_bytes())?;
        let iter = snap.iter_prefix(&self.schema.rows_cf(), &prefix)?;
        self.decode_scan(iter)
    }

    fn scan_prefix(&self, prefix: &[u8], txn: &dyn WriteTxn) -> Result<Vec<Row>, StorageError> {
        let iter = txn.iter_prefix(&self.schema.rows_cf(), prefix)?;
        self.decode_scan(iter)
    }

    fn decode_scan(
        &self,
        iter: Box<dyn Iterator<Item = Result<k9db_kv::Entry, k9db_kv::KvError>> + '_>,
    ) -> Result<Vec<Row>, StorageError> {
        let mut out = Vec::new();
        for entry in iter {
            let (key, value) = entry?;
            let (shard, _pk) = self.crypto.decrypt_key(&key)?;
            let shard = String::from_utf8_lossy(shard.as_slice()).into_owned();
            let plain = self.crypto.decrypt_value(&shard, &value)?;
            out.push(self.decode_row(shard, &plain)?);
        }
        Ok(out)
    }

    /// `CheckUniqueAndLock(pk, txn)`: true iff at least one shard already
    /// holds this PK. The underlying `iter_prefix` is the locking iterator,
    /// so walking it already takes the lock a concurrent race-insert would
    /// need to clear (spec.md §4.4).
    pub fn check_unique_and_lock(&self, pk: &Value, txn: &dyn WriteTxn) -> Result<bool, StorageError> {
        let prefix = index::encode_index_prefix(&[pk.clone()])?;
        let mut iter = txn.iter_prefix(&self.schema.pk_index_cf(), &prefix)?;
        Ok(iter.next().transpose()?.is_some())
    }

    /// Every shard currently holding a row with this PK (spec.md §4.6's
    /// `shards_of`): the sharding plan compiler uses this to resolve
    /// `Transitive` chains, and GDPR traversal uses it to find a subject's
    /// own home shard when it is itself owned by another subject.
    pub fn shards_containing_pk(&self, pk: &Value, txn: &dyn WriteTxn) -> Result<Vec<String>, StorageError> {
        let prefix = index::encode_index_prefix(&[pk.clone()])?;
        let pk_type = self.schema.pk_type();
        let pairs = self.scan_index_cf(&self.schema.pk_index_cf(), &prefix, 1, pk_type, txn, None)?;
        Ok(pairs.into_iter().map(|(shard, _)| shard).collect())
    }

    fn index_values(&self, columns: &[Value], cols: &[k9db_primitives::ColId]) -> Vec<Value> {
        cols.iter().map(|c| columns[c.0 as usize].clone()).collect()
    }

    /// `IndexAdd(shard, value_seq, txn)`.
    pub fn index_add(&self, shard: &str, columns: &[Value], txn: &dyn WriteTxn) -> Result<(), StorageError> {
        let pk = &columns[self.schema.pk_column.0 as usize];
        let pk_entry = index::encode_index_entry(&[pk.clone()], shard, pk)?;
        txn.put(&self.schema.pk_index_cf(), pk_entry.as_bytes(), b"")?;

        for idx in &self.schema.indices {
            let values = self.index_values(columns, idx.columns.as_slice());
            let entry = index::encode_index_entry(&values, shard, pk)?;
            txn.put(&self.schema.index_cf(idx), entry.as_bytes(), b"")?;
        }
        Ok(())
    }

    /// `IndexDelete(shard, value_seq, txn, update_pk=true)`.
    pub fn index_delete(&self, shard: &str, columns: &[Value], txn: &dyn WriteTxn) -> Result<(), StorageError> {
        self.index_delete_inner(shard, columns, txn, true)
    }

    fn index_delete_inner(
        &self,
        shard: &str,
        columns: &[Value],
        txn: &dyn WriteTxn,
        update_pk: bool,
    ) -> Result<(), StorageError> {
        let pk = &columns[self.schema.pk_column.0 as usize];
        if update_pk {
            let pk_entry = index::encode_index_entry(&[pk.clone()], shard, pk)?;
            txn.delete(&self.schema.pk_index_cf(), pk_entry.as_bytes())?;
        }
        for idx in &self.schema.indices {
            let values = self.index_values(columns, idx.columns.as_slice());
            let entry = index::encode_index_entry(&values, shard, pk)?;
            txn.delete(&self.schema.index_cf(idx), entry.as_bytes())?;
        }
        Ok(())
    }

    /// `IndexUpdate(shard, old, new, txn)`: remove entries keyed by the old
    /// column values, add entries keyed by the new ones. The PK never
    /// changes across an update, so its index entry is left alone.
    pub fn index_update(
        &self,
        shard: &str,
        old: &[Value],
        new: &[Value],
        txn: &dyn WriteTxn,
    ) -> Result<(), StorageError> {
        self.index_delete_inner(shard, old, txn, false)?;
        let pk = &new[self.schema.pk_column.0 as usize];
        for idx in &self.schema.indices {
            let values = self.index_values(new, idx.columns.as_slice());
            let entry = index::encode_index_entry(&values, shard, pk)?;
            txn.put(&self.schema.index_cf(idx), entry.as_bytes(), b"")?;
        }
        Ok(())
    }

    /// `IndexLookup(value_mapper, txn, limit)`.
    pub fn index_lookup(
        &self,
        equalities: &[(k9db_primitives::ColId, Value)],
        txn: &dyn WriteTxn,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let results = self.index_lookup_inner(equalities, txn, limit)?;
        Ok(results)
    }

    /// `IndexLookupDedup`: same as [`Table::index_lookup`] but with
    /// duplicate `(shard, pk)` pairs collapsed (can happen when a composite
    /// index's unmatched suffix columns are applied as a filter and several
    /// entries decode to the same candidate).
    pub fn index_lookup_dedup(
        &self,
        equalities: &[(k9db_primitives::ColId, Value)],
        txn: &dyn WriteTxn,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for pair in self.index_lookup_inner(equalities, txn, limit)? {
            if seen.insert(pair.clone()) {
                out.push(pair);
            }
        }
        Ok(out)
    }

    fn index_lookup_inner(
        &self,
        equalities: &[(k9db_primitives::ColId, Value)],
        txn: &dyn WriteTxn,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let plan = index::select_index(&self.schema, equalities);
        let pk_type = self.schema.pk_type();
        match plan {
            // A PK-constrained lookup never touches an index CF; the only
            // thing missing is the shard, which the caller must already
            // know to resolve a `Pk` plan into a `Table::get` (or scan every
            // shard it can see). Surfacing a lone PK value here instead of
            // a `(shard, pk)` pair would misrepresent what was found.
            IndexPlan::Pk(_) => Ok(Vec::new()),
            IndexPlan::Unique { value, .. } => {
                let prefix = index::encode_index_prefix(&[value])?;
                self.scan_index_cf(&self.schema.pk_index_cf(), &prefix, 1, pk_type, txn, limit)
            }
            IndexPlan::Composite { index, prefix, remaining } => {
                let idx = self.schema.indices.iter().find(|i| i.id == index).expect("index exists");
                let cf = self.schema.index_cf(idx);
                let num_matched = prefix.len();
                let raw_prefix = index::encode_index_prefix(&prefix)?;
                let mut out = self.scan_index_cf(&cf, &raw_prefix, num_matched, pk_type, txn, None)?;
                // `remaining` columns can't be checked from the index key
                // alone; a caller with leftover columns must filter
                // candidates itself against `Table::get` before applying its
                // own limit, so this scan only truncates when the whole
                // index was matched.
                if remaining.is_empty() {
                    if let Some(limit) = limit {
                        out.truncate(limit);
                    }
                }
                Ok(out)
            }
            IndexPlan::FullScan => Ok(Vec::new()),
        }
    }

    fn scan_index_cf(
        &self,
        cf: &str,
        prefix: &[u8],
        num_indexed_cols: usize,
        pk_type: k9db_codec::ColumnType,
        txn: &dyn WriteTxn,
        limit: Option<usize>,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let mut out = Vec::new();
        for entry in txn.iter_prefix(cf, prefix)? {
            let (key, _) = entry?;
            let seq = Sequence::from_bytes(key.to_vec());
            let (shard, pk) = index::decode_index_entry(&seq, num_indexed_cols, pk_type)?;
            out.push((shard, pk));
            if limit.map_or(false, |l| out.len() >= l) {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, IndexSchema};
    use k9db_codec::ColumnType;
    use k9db_kv::{Store, StoreOptions};
    use k9db_primitives::{ColId, IndexId, TableId};
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;
    use tempfile::TempDir;

    fn test_schema() -> TableSchema {
        TableSchema {
            id: TableId(0),
            name: "users".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: ColumnType::Int, nullable: false },
                ColumnSchema { name: "name".into(), ty: ColumnType::Text, nullable: false },
            ],
            pk_column: ColId(0),
            indices: vec![IndexSchema { id: IndexId(1), columns: smallvec![ColId(1)], unique: true }],
        }
    }

    fn open() -> (TempDir, Store) {
        let dir = TempDir::with_prefix("k9db_storage_test").unwrap();
        let store = Store::open(dir.path(), &[], &StoreOptions::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_round_trips_a_row() {
        let (_dir, store) = open();
        let crypto = EncryptionManager::new(false);
        let table = Table::new(test_schema(), &crypto);
        table.create_column_families(&store, &StoreOptions::default()).unwrap();

        let txn = store.begin_write();
        table.put("user__1", &[Value::Int(1), Value::Text("alice".into())], &txn).unwrap();
        let row = table.get("user__1", &Value::Int(1), &txn).unwrap().unwrap();
        assert_eq!(row.columns, vec![Value::Int(1), Value::Text("alice".into())]);
        txn.commit().unwrap();
    }

    #[test]
    fn delete_removes_row_and_index_entries() {
        let (_dir, store) = open();
        let crypto = EncryptionManager::new(false);
        let table = Table::new(test_schema(), &crypto);
        table.create_column_families(&store, &StoreOptions::default()).unwrap();

        let txn = store.begin_write();
        table.put("user__1", &[Value::Int(1), Value::Text("alice".into())], &txn).unwrap();
        table.delete("user__1", &Value::Int(1), &txn).unwrap();
        assert!(table.get("user__1", &Value::Int(1), &txn).unwrap().is_none());
        assert!(!table.check_unique_and_lock(&Value::Int(1), &txn).unwrap());
        txn.commit().unwrap();
    }

    #[test]
    fn check_unique_and_lock_detects_existing_pk() {
        let (_dir, store) = open();
        let crypto = EncryptionManager::new(false);
        let table = Table::new(test_schema(), &crypto);
        table.create_column_families(&store, &StoreOptions::default()).unwrap();

        let txn = store.begin_write();
        table.put("user__1", &[Value::Int(1), Value::Text("alice".into())], &txn).unwrap();
        assert!(table.check_unique_and_lock(&Value::Int(1), &txn).unwrap());
        assert!(!table.check_unique_and_lock(&Value::Int(2), &txn).unwrap());
        txn.commit().unwrap();
    }

    #[test]
    fn get_shard_scans_only_that_shard() {
        let (_dir, store) = open();
        let crypto = EncryptionManager::new(false);
        let table = Table::new(test_schema(), &crypto);
        table.create_column_families(&store, &StoreOptions::default()).unwrap();

        let txn = store.begin_write();
        table.put("user__1", &[Value::Int(1), Value::Text("a".into())], &txn).unwrap();
        table.put("user__1", &[Value::Int(2), Value::Text("b".into())], &txn).unwrap();
        table.put("user__2", &[Value::Int(3), Value::Text("c".into())], &txn).unwrap();

        let rows = table.get_shard("user__1", &txn).unwrap();
        assert_eq!(rows.len(), 2);
        txn.commit().unwrap();
    }
}
