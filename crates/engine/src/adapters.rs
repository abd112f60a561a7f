//! Bridges the storage-free trait seams `k9db-planner`, `k9db-gdpr` and
//! `k9db-compliance` each define onto the real `k9db-storage::Table`. Every
//! adapter here is the session-local counterpart the doc comment on each of
//! those seams names as "implemented by `k9db-engine`".
//!
//! None of these owns a lock: each borrows `&HashMap<String, TableSchema>`
//! for its lifetime, so a single `Database::schemas_read()` guard can back
//! several adapters at once (e.g. GDPR traversal's schema lookup and row
//! store side by side) without taking the read lock twice.

use std::collections::HashMap;

use k9db_codec::Value;
use k9db_compliance::DefaultShardChecker;
use k9db_crypto::EncryptionManager;
use k9db_gdpr::{GdprError, GdprStore, SchemaLookup};
use k9db_kv::WriteTxn;
use k9db_planner::{PlanError, ShardLookup};
use k9db_storage::{StorageError, Table, TableSchema};

fn table_for<'a>(schemas: &'a HashMap<String, TableSchema>, crypto: &'a EncryptionManager, name: &str) -> Option<Table<'a>> {
    schemas.get(name).map(|schema| Table::new(schema.clone(), crypto))
}

/// [`k9db_planner::ShardLookup`], backed by [`Table::shards_containing_pk`].
pub struct ShardLookupAdapter<'a> {
    schemas: &'a HashMap<String, TableSchema>,
    crypto: &'a EncryptionManager,
    txn: &'a dyn WriteTxn,
}

impl<'a> ShardLookupAdapter<'a> {
    pub fn new(schemas: &'a HashMap<String, TableSchema>, crypto: &'a EncryptionManager, txn: &'a dyn WriteTxn) -> Self {
        Self { schemas, crypto, txn }
    }
}

impl<'a> ShardLookup for ShardLookupAdapter<'a> {
    fn shards_of(&self, table: &str, pk: &Value) -> Result<Vec<String>, PlanError> {
        let Some(t) = table_for(self.schemas, self.crypto, table) else {
            return Ok(Vec::new());
        };
        Ok(t.shards_containing_pk(pk, self.txn)?)
    }
}

/// [`k9db_gdpr::SchemaLookup`], backed by the session's schema cache.
pub struct SchemaLookupAdapter<'a> {
    schemas: &'a HashMap<String, TableSchema>,
}

impl<'a> SchemaLookupAdapter<'a> {
    pub fn new(schemas: &'a HashMap<String, TableSchema>) -> Self {
        Self { schemas }
    }
}

impl<'a> SchemaLookup for SchemaLookupAdapter<'a> {
    fn schema(&self, table: &str) -> Result<&TableSchema, GdprError> {
        self.schemas.get(table).ok_or_else(|| GdprError::UnknownTable(table.to_string()))
    }
}

/// [`k9db_gdpr::GdprStore`], backed by `k9db-storage::Table` over the
/// session's write transaction.
pub struct GdprStoreAdapter<'a> {
    schemas: &'a HashMap<String, TableSchema>,
    crypto: &'a EncryptionManager,
    txn: &'a dyn WriteTxn,
}

impl<'a> GdprStoreAdapter<'a> {
    pub fn new(schemas: &'a HashMap<String, TableSchema>, crypto: &'a EncryptionManager, txn: &'a dyn WriteTxn) -> Self {
        Self { schemas, crypto, txn }
    }

    fn table(&self, name: &str) -> Result<Table<'a>, GdprError> {
        table_for(self.schemas, self.crypto, name).ok_or_else(|| GdprError::UnknownTable(name.to_string()))
    }
}

impl<'a> GdprStore for GdprStoreAdapter<'a> {
    fn rows_in_shard(&mut self, table: &str, shard: &str) -> Result<Vec<(Value, Vec<Value>)>, GdprError> {
        let t = self.table(table)?;
        let rows = t.get_shard(shard, self.txn)?;
        Ok(rows.into_iter().map(|r| (r.columns[t.schema().pk_column.0 as usize].clone(), r.columns)).collect())
    }

    fn put(&mut self, table: &str, shard: &str, columns: &[Value]) -> Result<(), GdprError> {
        let t = self.table(table)?;
        Ok(t.put(shard, columns, self.txn)?)
    }

    fn delete(&mut self, table: &str, shard: &str, pk: &Value) -> Result<(), GdprError> {
        let t = self.table(table)?;
        Ok(t.delete(shard, pk, self.txn)?)
    }

    fn get(&mut self, table: &str, shard: &str, pk: &Value) -> Result<Option<Vec<Value>>, GdprError> {
        let t = self.table(table)?;
        Ok(t.get(shard, pk, self.txn)?.map(|row| row.columns))
    }
}

/// [`k9db_compliance::DefaultShardChecker`], backed by the PK index of the
/// default shard's table.
pub struct DefaultShardCheckerAdapter<'a> {
    schemas: &'a HashMap<String, TableSchema>,
    crypto: &'a EncryptionManager,
    txn: &'a dyn WriteTxn,
    default_shard: String,
}

impl<'a> DefaultShardCheckerAdapter<'a> {
    pub fn new(schemas: &'a HashMap<String, TableSchema>, crypto: &'a EncryptionManager, txn: &'a dyn WriteTxn, default_shard: String) -> Self {
        Self { schemas, crypto, txn, default_shard }
    }
}

impl<'a> DefaultShardChecker for DefaultShardCheckerAdapter<'a> {
    fn still_in_default(&self, table: &str, pk: &Value) -> Result<bool, StorageError> {
        let Some(t) = table_for(self.schemas, self.crypto, table) else {
            return Ok(false);
        };
        let shards = t.shards_containing_pk(pk, self.txn)?;
        Ok(shards.iter().any(|s| s == &self.default_shard))
    }
}
