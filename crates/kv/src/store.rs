use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::unsync::OnceCell;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Options, SliceTransform, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};

use crate::error::KvError;
use crate::txn::{Entry, PrefixIter, ReadSnapshot, WriteTxn};

/// How the column families are configured when the store is opened.
///
/// `prefix_extractor`/`comparator` are supplied by the caller (`k9db-storage`)
/// rather than hard-coded here, since the shape of a key prefix depends on
/// whether encryption (`k9db-crypto`) is on — this crate only knows how to
/// run an ordered KV store, not how K9db encodes shard prefixes into keys.
pub struct StoreOptions {
    pub lock_wait_timeout: Duration,
    pub prefix_extractor: Option<(&'static str, fn(&[u8]) -> &[u8])>,
    pub comparator: Option<(&'static str, fn(&[u8], &[u8]) -> std::cmp::Ordering)>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_wait_timeout: Duration::from_secs(10),
            prefix_extractor: None,
            comparator: None,
        }
    }
}

/// One open database directory (spec.md §6.2): a `rocksdb::TransactionDB`
/// with one column family per table/index plus the metadata CF, mirroring
/// `RocksDBObjectDB::open`'s `create_if_missing`/`create_missing_column_families`
/// setup but for `TransactionDB` rather than a plain `DB`.
pub struct Store {
    db: TransactionDB,
}

fn cf_options(opts: &StoreOptions) -> Options {
    let mut cf_opts = Options::default();
    if let Some((name, transform)) = opts.prefix_extractor {
        let slice_transform = SliceTransform::create(name, move |key| transform(key), None);
        cf_opts.set_prefix_extractor(slice_transform);
    }
    if let Some((name, compare)) = opts.comparator {
        cf_opts.set_comparator(name, move |a, b| compare(a, b));
    }
    cf_opts
}

impl Store {
    pub fn open(path: impl AsRef<Path>, cf_names: &[&str], opts: &StoreOptions) -> Result<Self, KvError> {
        let root = path.as_ref();
        std::fs::create_dir_all(root).map_err(rocksdb::Error::from)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_default_lock_timeout(opts.lock_wait_timeout.as_millis() as i64);

        let descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_options(opts)))
            .collect();

        let db = if descriptors.is_empty() {
            TransactionDB::open(&db_opts, &txn_db_opts, root)?
        } else {
            TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, root, descriptors)?
        };

        Ok(Self { db })
    }

    pub fn create_column_family(&self, name: &str, opts: &StoreOptions) -> Result<(), KvError> {
        self.db.create_cf(name, &cf_options(opts))?;
        Ok(())
    }

    pub fn begin_write(&self) -> RocksWriteTxn<'_> {
        let txn_opts = TransactionOptions::default();
        let write_opts = WriteOptions::default();
        let txn = self.db.transaction_opt(&write_opts, &txn_opts);
        RocksWriteTxn { db: &self.db, txn, finalized: Cell::new(false) }
    }

    pub fn snapshot(&self) -> RocksReadSnapshot<'_> {
        RocksReadSnapshot { db: &self.db, snapshot: OnceCell::new() }
    }
}

fn is_conflict(e: &rocksdb::Error) -> bool {
    matches!(
        e.kind(),
        rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain | rocksdb::ErrorKind::TimedOut
    )
}

fn cf_handle<'a>(db: &'a TransactionDB, name: &str) -> Result<Arc<BoundColumnFamily<'a>>, KvError> {
    db.cf_handle(name)
        .ok_or_else(|| KvError::NoSuchColumnFamily(name.to_string()))
}

/// A live write transaction (spec.md §4.3). `commit`/`rollback` take `&self`
/// (the underlying `rocksdb::Transaction` does too) and are made idempotent
/// with a `finalized` flag: the first call does the real work, later calls
/// on the same transaction are no-ops.
pub struct RocksWriteTxn<'a> {
    db: &'a TransactionDB,
    txn: Transaction<'a, TransactionDB>,
    finalized: Cell<bool>,
}

impl<'a> WriteTxn for RocksWriteTxn<'a> {
    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        let cf = cf_handle(self.db, cf)?;
        self.txn.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: &str, key: &[u8]) -> Result<(), KvError> {
        let cf = cf_handle(self.db, cf)?;
        self.txn.delete_cf(&cf, key)?;
        Ok(())
    }

    fn get_for_update(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let cf = cf_handle(self.db, cf)?;
        Ok(self.txn.get_for_update_cf(&cf, key, true)?)
    }

    fn multi_get_for_update(
        &self,
        cf: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<Option<Vec<u8>>>, KvError> {
        keys.iter().map(|k| self.get_for_update(cf, k)).collect()
    }

    fn iter_prefix<'b>(
        &'b self,
        cf: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry, KvError>> + 'b>, KvError> {
        let cf = cf_handle(self.db, cf)?;
        let mode = rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let inner = self.txn.iterator_cf(&cf, mode);
        Ok(Box::new(PrefixIter::new(inner, prefix.to_vec())))
    }

    fn commit(&self) -> Result<(), KvError> {
        if self.finalized.replace(true) {
            return Ok(());
        }
        self.txn.commit().map_err(|e| {
            if is_conflict(&e) {
                KvError::TransientConflict
            } else {
                e.into()
            }
        })
    }

    fn rollback(&self) -> Result<(), KvError> {
        if self.finalized.replace(true) {
            return Ok(());
        }
        Ok(self.txn.rollback()?)
    }
}

/// A read-only, non-locking view bound to a snapshot taken lazily on the
/// first read (spec.md §4.3).
pub struct RocksReadSnapshot<'a> {
    db: &'a TransactionDB,
    snapshot: OnceCell<rocksdb::SnapshotWithThreadMode<'a, TransactionDB>>,
}

impl<'a> RocksReadSnapshot<'a> {
    fn snapshot(&self) -> &rocksdb::SnapshotWithThreadMode<'a, TransactionDB> {
        self.snapshot.get_or_init(|| self.db.snapshot())
    }
}

impl<'a> ReadSnapshot for RocksReadSnapshot<'a> {
    fn get(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let cf = cf_handle(self.db, cf)?;
        Ok(self.snapshot().get_cf(&cf, key)?)
    }

    fn multi_get(&self, cf: &str, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>, KvError> {
        keys.iter().map(|k| self.get(cf, k)).collect()
    }

    fn iter_prefix<'b>(
        &'b self,
        cf: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry, KvError>> + 'b>, KvError> {
        let cf = cf_handle(self.db, cf)?;
        let mode = rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let inner = self.snapshot().iterator_cf(&cf, mode);
        Ok(Box::new(PrefixIter::new(inner, prefix.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_test_store() -> (TempDir, Store) {
        let dir = TempDir::with_prefix("k9db_kv_test").unwrap();
        let store = Store::open(dir.path(), &["rows"], &StoreOptions::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn write_then_read_committed_value_on_a_snapshot() {
        let (_dir, store) = open_test_store();
        let txn = store.begin_write();
        txn.put("rows", b"user__1\x1E1", b"alice").unwrap();
        txn.commit().unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.get("rows", b"user__1\x1E1").unwrap(), Some(b"alice".to_vec()));
    }

    #[test]
    fn rollback_discards_writes() {
        let (_dir, store) = open_test_store();
        let txn = store.begin_write();
        txn.put("rows", b"user__1\x1E1", b"alice").unwrap();
        txn.rollback().unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.get("rows", b"user__1\x1E1").unwrap(), None);
    }

    #[test]
    fn commit_is_idempotent_after_first_call() {
        let (_dir, store) = open_test_store();
        let txn = store.begin_write();
        txn.put("rows", b"k", b"v").unwrap();
        txn.commit().unwrap();
        // Second commit is a documented no-op, not an error.
        txn.commit().unwrap();
    }

    #[test]
    fn prefix_iteration_stops_at_first_non_matching_key() {
        let (_dir, store) = open_test_store();
        let txn = store.begin_write();
        txn.put("rows", b"user__1\x1E1", b"a").unwrap();
        txn.put("rows", b"user__1\x1E2", b"b").unwrap();
        txn.put("rows", b"user__2\x1E1", b"c").unwrap();
        txn.commit().unwrap();

        let snap = store.snapshot();
        let found: Vec<_> = snap
            .iter_prefix("rows", b"user__1\x1E")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
