//! C7's top-level handle: one `rocksdb` instance, its encryption manager,
//! and the in-memory catalog state every session reads through a lock.
//!
//! `Database::open` is a deliberate two-phase open. `rocksdb::TransactionDB`
//! requires every existing column family to be named up front, but the set
//! of table/index CFs is itself recorded *inside* the catalog CF — so phase
//! one opens with only [`k9db_catalog::CATALOG_CF`], replays the DDL log to
//! reconstruct every table's schema, then phase two re-opens with the full
//! CF list that replay discovered. `k9db-kv`'s thin wrapper doesn't expose
//! rocksdb's own `list_cf`, so this sidesteps it rather than adding one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use k9db_catalog::{Catalog, CATALOG_CF};
use k9db_crypto::EncryptionManager;
use k9db_gdpr::RuleRegistry;
use k9db_kv::{Store, StoreOptions, WriteTxn};
use k9db_primitives::{IndexId, TableId};
use k9db_schema::ShardGraph;
use k9db_storage::{IndexSchema, TableSchema};
use k9db_sql::Statement;
use k9db_views::InMemoryViewSink;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use smallvec::smallvec;

use crate::config::Config;
use crate::ddl;
use crate::error::SqlError;

pub struct Database {
    config: Config,
    store: Store,
    crypto: EncryptionManager,
    schemas: RwLock<HashMap<String, TableSchema>>,
    graph: RwLock<ShardGraph>,
    rules: RwLock<RuleRegistry>,
    views: Mutex<InMemoryViewSink>,
    next_table_id: AtomicU32,
    next_index_id: AtomicU32,
}

fn store_options(config: &Config) -> StoreOptions {
    StoreOptions { lock_wait_timeout: config.lock_wait_timeout, ..Default::default() }
}

impl Database {
    pub fn open(config: Config) -> Result<Self, SqlError> {
        let opts = store_options(&config);

        let ddls = {
            let bootstrap = Store::open(&config.data_dir, &[CATALOG_CF], &opts)?;
            let snap = bootstrap.snapshot();
            Catalog::replay(&snap)?
        };

        let crypto = EncryptionManager::new(config.encryption_enabled);
        let mut schemas = HashMap::new();
        let mut graph = ShardGraph::new();
        let mut rules = RuleRegistry::new();
        let mut next_table_id = 0u32;
        let mut next_index_id = 0u32;
        let mut cf_names = vec![CATALOG_CF.to_string()];

        for text in &ddls {
            match k9db_sql::parse(text)? {
                Statement::CreateTable(ct) => {
                    let table_id = TableId(next_table_id);
                    next_table_id += 1;
                    let mut bp = ddl::build_table_blueprint(&ct, table_id)?;
                    for (col, _name) in std::mem::take(&mut bp.unique_columns) {
                        let index_id = IndexId(next_index_id);
                        next_index_id += 1;
                        bp.schema.indices.push(IndexSchema { id: index_id, columns: smallvec![col], unique: true });
                    }
                    let pk_name = bp.schema.columns[bp.schema.pk_column.0 as usize].name.clone();
                    graph.add_table(table_id, &bp.schema.name, bp.schema.pk_column, &pk_name, bp.is_data_subject, &bp.annotations)?;
                    rules.register(&bp.schema.name, bp.rules);
                    cf_names.extend(bp.schema.column_families());
                    schemas.insert(bp.schema.name.clone(), bp.schema);
                }
                Statement::CreateIndex(ci) => {
                    let schema = schemas.get_mut(&ci.table).ok_or_else(|| SqlError::UnknownTable(ci.table.clone()))?;
                    let index_id = IndexId(next_index_id);
                    next_index_id += 1;
                    let idx = ddl::build_index_schema(&ci, schema, index_id)?;
                    cf_names.push(schema.index_cf(&idx));
                    schema.indices.push(idx);
                }
                other => return Err(SqlError::Internal(format!("catalog replay found a non-DDL statement: {other:?}"))),
            }
        }

        let cf_refs: Vec<&str> = cf_names.iter().map(String::as_str).collect();
        let store = Store::open(&config.data_dir, &cf_refs, &opts)?;

        Ok(Self {
            config,
            store,
            crypto,
            schemas: RwLock::new(schemas),
            graph: RwLock::new(graph),
            rules: RwLock::new(rules),
            views: Mutex::new(InMemoryViewSink::default()),
            next_table_id: AtomicU32::new(next_table_id),
            next_index_id: AtomicU32::new(next_index_id),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn crypto(&self) -> &EncryptionManager {
        &self.crypto
    }

    pub fn default_shard(&self) -> String {
        k9db_planner::default_shard()
    }

    pub fn schemas_read(&self) -> RwLockReadGuard<'_, HashMap<String, TableSchema>> {
        self.schemas.read()
    }

    pub fn schemas_write(&self) -> RwLockWriteGuard<'_, HashMap<String, TableSchema>> {
        self.schemas.write()
    }

    pub fn graph_read(&self) -> RwLockReadGuard<'_, ShardGraph> {
        self.graph.read()
    }

    pub fn graph_write(&self) -> RwLockWriteGuard<'_, ShardGraph> {
        self.graph.write()
    }

    pub fn rules_read(&self) -> RwLockReadGuard<'_, RuleRegistry> {
        self.rules.read()
    }

    pub fn rules_write(&self) -> RwLockWriteGuard<'_, RuleRegistry> {
        self.rules.write()
    }

    pub fn views(&self) -> MutexGuard<'_, InMemoryViewSink> {
        self.views.lock()
    }

    pub fn schema(&self, table: &str) -> Result<TableSchema, SqlError> {
        self.schemas.read().get(table).cloned().ok_or_else(|| SqlError::UnknownTable(table.to_string()))
    }

    fn next_table_id(&self) -> TableId {
        TableId(self.next_table_id.fetch_add(1, Ordering::SeqCst))
    }

    fn next_index_id(&self) -> IndexId {
        IndexId(self.next_index_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Registers a `CREATE TABLE` both in the live catalog state and in the
    /// persisted DDL log, then declares its column families. `ddl_text` is
    /// the original statement text, persisted verbatim (spec.md §4.12).
    pub fn create_table(&self, ct: &k9db_sql::CreateTable, ddl_text: &str, txn: &dyn WriteTxn) -> Result<(), SqlError> {
        if self.schemas.read().contains_key(&ct.name) {
            return Err(SqlError::Invalid(format!("table {:?} already exists", ct.name)));
        }
        let table_id = self.next_table_id();
        let mut bp = ddl::build_table_blueprint(ct, table_id)?;
        for (col, _name) in std::mem::take(&mut bp.unique_columns) {
            let index_id = self.next_index_id();
            bp.schema.indices.push(IndexSchema { id: index_id, columns: smallvec![col], unique: true });
        }

        let opts = store_options(&self.config);
        for cf in bp.schema.column_families() {
            self.store.create_column_family(&cf, &opts)?;
        }

        let pk_name = bp.schema.columns[bp.schema.pk_column.0 as usize].name.clone();
        self.graph.write().add_table(table_id, &bp.schema.name, bp.schema.pk_column, &pk_name, bp.is_data_subject, &bp.annotations)?;
        self.rules.write().register(&bp.schema.name, bp.rules);
        Catalog::record_ddl(txn, ddl_text)?;
        self.schemas.write().insert(bp.schema.name.clone(), bp.schema);
        Ok(())
    }

    /// Registers a `CREATE INDEX` the same way: live state, persisted log,
    /// declared column family.
    pub fn create_index(&self, ci: &k9db_sql::CreateIndex, ddl_text: &str, txn: &dyn WriteTxn) -> Result<(), SqlError> {
        let index_id = self.next_index_id();
        let cf = {
            let mut schemas = self.schemas.write();
            let schema = schemas.get_mut(&ci.table).ok_or_else(|| SqlError::UnknownTable(ci.table.clone()))?;
            let idx = ddl::build_index_schema(ci, schema, index_id)?;
            let cf = schema.index_cf(&idx);
            schema.indices.push(idx);
            cf
        };
        self.store.create_column_family(&cf, &store_options(&self.config))?;
        Catalog::record_ddl(txn, ddl_text)?;
        Ok(())
    }
}
