//! C7's statement dispatch loop: one session owns one live write
//! transaction plus the C10 compliance transaction that rides alongside it,
//! and turns parsed `k9db-sql` statements into `k9db-storage`/`k9db-planner`/
//! `k9db-gdpr` calls.

use k9db_codec::Value;
use k9db_compliance::ComplianceTransaction;
use k9db_gdpr::{gdpr_forget, gdpr_get, ForgetOutcome, GetOutcome};
use k9db_kv::{RocksWriteTxn, WriteTxn};
use k9db_planner::{compile_insert, compile_select, compile_update, default_shard, varowned_links, SelectPlan};
use k9db_sql::{Delete, Insert, Projection, Select, Statement, Update};
use k9db_storage::{IndexPlan, Table};
use k9db_views::{SqlResultSet, ViewSink};
use log::debug;

use crate::adapters::{DefaultShardCheckerAdapter, GdprStoreAdapter, SchemaLookupAdapter, ShardLookupAdapter};
use crate::database::Database;
use crate::error::SqlError;
use crate::expr::{collect_equalities, eval_bool, eval_scalar};
use crate::prepared::PreparedStatementCache;

/// What a statement produced, for the REPL/driver to render (spec.md §6.1).
#[derive(Debug, Clone)]
pub enum StatementResult {
    Ack,
    Rows(SqlResultSet),
    GdprGet(GetOutcome),
    GdprForget(ForgetOutcome),
    Text(String),
}

pub struct Session<'db> {
    db: &'db Database,
    txn: Option<RocksWriteTxn<'db>>,
    compliance: ComplianceTransaction,
    /// `PRAGMA SET ECHO`/`SET AUTO_CTX` state (spec.md §6.1).
    echo: bool,
    auto_ctx: bool,
    /// True once `PRAGMA CTX START` opened an explicit multi-statement
    /// transaction the session must not auto-commit after every statement.
    explicit_ctx: bool,
    prepared: PreparedStatementCache,
}

impl<'db> Session<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db, txn: None, compliance: ComplianceTransaction::new(), echo: false, auto_ctx: true, explicit_ctx: false, prepared: PreparedStatementCache::new() }
    }

    fn ensure_txn(&mut self) -> &RocksWriteTxn<'db> {
        if self.txn.is_none() {
            self.txn = Some(self.db.store().begin_write());
        }
        self.txn.as_ref().expect("just ensured")
    }

    /// Commits the live transaction through the C10 compliance recheck, the
    /// same "rescan then commit" order spec.md §4.10 describes.
    fn commit_txn(&mut self) -> Result<(), SqlError> {
        let Some(txn) = self.txn.take() else { return Ok(()) };
        {
            let schemas = self.db.schemas_read();
            let checker = DefaultShardCheckerAdapter::new(&schemas, self.db.crypto(), &txn, self.db.default_shard());
            if let Err(e) = self.compliance.commit(&checker) {
                txn.rollback()?;
                self.compliance = ComplianceTransaction::new();
                return Err(SqlError::from(e));
            }
        }
        txn.commit()?;
        self.compliance = ComplianceTransaction::new();
        Ok(())
    }

    fn rollback_txn(&mut self) -> Result<(), SqlError> {
        if let Some(txn) = self.txn.take() {
            txn.rollback()?;
        }
        self.compliance = ComplianceTransaction::new();
        Ok(())
    }

    /// Ends the transaction wrapping one statement, unless an explicit
    /// `PRAGMA CTX START` is holding it open for more statements.
    fn maybe_auto_commit(&mut self) -> Result<(), SqlError> {
        if self.auto_ctx && !self.explicit_ctx {
            self.commit_txn()?;
        }
        Ok(())
    }

    pub fn execute(&mut self, sql: &str) -> Result<StatementResult, SqlError> {
        if self.echo {
            debug!("echo: {sql}");
        }
        let prepared = self.prepared.prepare(sql)?.clone();
        self.execute_parsed(&prepared.statement, &[], prepared.needs_flow)
    }

    pub fn execute_with_args(&mut self, sql: &str, args: &[Value]) -> Result<StatementResult, SqlError> {
        let prepared = self.prepared.prepare(sql)?.clone();
        self.execute_parsed(&prepared.statement, args, prepared.needs_flow)
    }

    fn execute_parsed(&mut self, stmt: &Statement, args: &[Value], flow: bool) -> Result<StatementResult, SqlError> {
        match stmt {
            Statement::CreateTable(ct) => {
                self.ensure_txn();
                let txn = self.txn.as_ref().unwrap();
                let text = format!("{ct:?}");
                self.db.create_table(ct, &text, txn)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Ack)
            }
            Statement::CreateIndex(ci) => {
                self.ensure_txn();
                let txn = self.txn.as_ref().unwrap();
                let text = format!("{ci:?}");
                self.db.create_index(ci, &text, txn)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Ack)
            }
            Statement::Insert(ins) | Statement::Replace(ins) => {
                self.insert_row(ins, args)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Ack)
            }
            Statement::Update(u) => {
                self.update_rows(u, args)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Ack)
            }
            Statement::Delete(d) => {
                self.delete_rows(d, args)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Ack)
            }
            Statement::Select(sel) => {
                if flow {
                    // spec.md §4.9: statements the direct storage path can't
                    // serve (joins, aggregates, ordering) are served from a
                    // materialized view instead. This engine exposes one
                    // automatic view per base table (pushed to on every
                    // write) rather than a full incremental-view-maintenance
                    // compiler for arbitrary flow SQL.
                    let rows = self.db.views().query(&sel.table);
                    return Ok(StatementResult::Rows(rows));
                }
                let rows = self.select_rows(sel, args)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::Rows(rows))
            }
            Statement::GdprGet { kind, id } => {
                self.ensure_txn();
                let id_value = eval_scalar(id, &self.db.schema(kind)?, None, args, &mut 0)?;
                let outcome = self.gdpr_get(kind, &id_value)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::GdprGet(outcome))
            }
            Statement::GdprForget { kind, id } => {
                self.ensure_txn();
                let id_value = eval_scalar(id, &self.db.schema(kind)?, None, args, &mut 0)?;
                let outcome = self.gdpr_forget(kind, &id_value)?;
                self.maybe_auto_commit()?;
                Ok(StatementResult::GdprForget(outcome))
            }
            Statement::ExplainCompliance => Ok(StatementResult::Text(crate::explain::explain_compliance(&self.db.graph_read()))),
            Statement::Pragma(p) => self.pragma(p.clone()),
        }
    }

    fn insert_row(&mut self, ins: &Insert, args: &[Value]) -> Result<(), SqlError> {
        let schema = self.db.schema(&ins.table)?;
        let mut columns = vec![Value::Null; schema.columns.len()];
        let mut arg_idx = 0;
        match &ins.columns {
            Some(names) => {
                for (name, expr) in names.iter().zip(&ins.values) {
                    let idx = schema.columns.iter().position(|c| &c.name == name).ok_or_else(|| SqlError::UnknownColumn(name.clone(), schema.name.clone()))?;
                    columns[idx] = eval_scalar(expr, &schema, None, args, &mut arg_idx)?;
                }
            }
            None => {
                for (idx, expr) in ins.values.iter().enumerate() {
                    columns[idx] = eval_scalar(expr, &schema, None, args, &mut arg_idx)?;
                }
            }
        }

        self.ensure_txn();
        let txn = self.txn.as_ref().unwrap();
        let pk = columns[schema.pk_column.0 as usize].clone();

        let plan = {
            let graph = self.db.graph_read();
            let schemas = self.db.schemas_read();
            let lookup = ShardLookupAdapter::new(&schemas, self.db.crypto(), txn);
            compile_insert(&graph, &schema, &columns, &lookup)?
        };

        let table = Table::new(schema.clone(), self.db.crypto());
        for shard in &plan.targets {
            table.put(shard, &columns, txn)?;
        }
        self.push_view_delta(&ins.table, &columns, true);

        if plan.dangling && plan.requires_ownership {
            self.compliance.observe_default_write(&ins.table, pk);
        }

        let links = {
            let graph = self.db.graph_read();
            varowned_links(&graph, &schema, &columns, &plan.targets)?
        };
        Self::apply_varowned_copies(self.db, &mut self.compliance, &links, txn)?;
        Ok(())
    }

    fn update_rows(&mut self, u: &Update, args: &[Value]) -> Result<(), SqlError> {
        let schema = self.db.schema(&u.table)?;
        self.ensure_txn();
        let txn = self.txn.as_ref().unwrap();
        let table = Table::new(schema.clone(), self.db.crypto());
        let requires_ownership = k9db_planner::requires_ownership(&self.db.graph_read(), &u.table)?;

        let mut arg_idx = 0;
        let mut equalities = Vec::new();
        if let Some(sel) = &u.selection {
            collect_equalities(sel, &schema, args, &mut arg_idx, &mut equalities)?;
        }

        let candidate_shards = {
            let graph = self.db.graph_read();
            let schemas = self.db.schemas_read();
            let lookup = ShardLookupAdapter::new(&schemas, self.db.crypto(), txn);
            match compile_select(&graph, &schema, &equalities, &lookup)? {
                SelectPlan::ShardScan { shard } => vec![shard],
                SelectPlan::Index(_) => all_shards_hint(),
            }
        };

        let rows = self.scan_candidates(&table, &candidate_shards, &equalities, txn)?;
        for row in rows {
            let mut remaining_arg_idx = arg_idx;
            if let Some(sel) = &u.selection {
                if !eval_bool(sel, &schema, &row.columns, args, &mut remaining_arg_idx)? {
                    continue;
                }
            }
            let mut new_columns = row.columns.clone();
            let mut assign_idx = remaining_arg_idx;
            for (name, expr) in &u.assignments {
                let idx = schema.columns.iter().position(|c| &c.name == name).ok_or_else(|| SqlError::UnknownColumn(name.clone(), schema.name.clone()))?;
                new_columns[idx] = eval_scalar(expr, &schema, Some(&row.columns), args, &mut assign_idx)?;
            }

            let plan = {
                let graph = self.db.graph_read();
                let schemas = self.db.schemas_read();
                let lookup = ShardLookupAdapter::new(&schemas, self.db.crypto(), txn);
                compile_update(&graph, &schema, &row.columns, &new_columns, &lookup)?
            };

            table.delete(&row.shard, &row.columns[schema.pk_column.0 as usize], txn)?;
            self.push_view_delta(&u.table, &row.columns, false);
            for shard in plan.added.iter().chain(&plan.unchanged) {
                table.put(shard, &new_columns, txn)?;
            }
            self.push_view_delta(&u.table, &new_columns, true);

            let pk = new_columns[schema.pk_column.0 as usize].clone();
            let fell_to_default = plan.added.contains(&default_shard())
                || (plan.unchanged.contains(&default_shard()) && plan.added.is_empty() && plan.removed.is_empty());
            if fell_to_default && requires_ownership {
                self.compliance.observe_default_write(&u.table, pk.clone());
            } else {
                self.compliance.observe_left_default(&u.table, &pk);
            }
        }
        Ok(())
    }

    fn delete_rows(&mut self, d: &Delete, args: &[Value]) -> Result<(), SqlError> {
        let schema = self.db.schema(&d.table)?;
        self.ensure_txn();
        let txn = self.txn.as_ref().unwrap();
        let table = Table::new(schema.clone(), self.db.crypto());

        let mut arg_idx = 0;
        let mut equalities = Vec::new();
        if let Some(sel) = &d.selection {
            collect_equalities(sel, &schema, args, &mut arg_idx, &mut equalities)?;
        }

        let candidate_shards = {
            let graph = self.db.graph_read();
            let schemas = self.db.schemas_read();
            let lookup = ShardLookupAdapter::new(&schemas, self.db.crypto(), txn);
            match compile_select(&graph, &schema, &equalities, &lookup)? {
                SelectPlan::ShardScan { shard } => vec![shard],
                SelectPlan::Index(_) => all_shards_hint(),
            }
        };

        let rows = self.scan_candidates(&table, &candidate_shards, &equalities, txn)?;
        for row in rows {
            if let Some(sel) = &d.selection {
                let mut a = arg_idx;
                if !eval_bool(sel, &schema, &row.columns, args, &mut a)? {
                    continue;
                }
            }
            let pk = row.columns[schema.pk_column.0 as usize].clone();
            table.delete(&row.shard, &pk, txn)?;
            self.push_view_delta(&d.table, &row.columns, false);
            self.compliance.observe_left_default(&d.table, &pk);

            let links = {
                let graph = self.db.graph_read();
                varowned_links(&graph, &schema, &row.columns, &[row.shard.clone()])?
            };
            for link in &links {
                let target_schema = self.db.schema(&link.target_table)?;
                let target_table = Table::new(target_schema, self.db.crypto());
                target_table.delete(&row.shard, &link.target_pk, txn)?;
            }
        }
        Ok(())
    }

    /// Scans the given shards when the plan resolved to exactly one (the
    /// common case); falls back to every shard the PK index knows about
    /// when it didn't, since an arbitrary `UPDATE`/`DELETE ... WHERE` may
    /// need to touch rows anywhere.
    fn scan_candidates(&self, table: &Table<'_>, shards: &[String], equalities: &[(k9db_primitives::ColId, Value)], txn: &dyn WriteTxn) -> Result<Vec<k9db_storage::Row>, SqlError> {
        if !shards.is_empty() {
            let mut out = Vec::new();
            for shard in shards {
                out.extend(table.get_shard(shard, txn)?);
            }
            return Ok(out);
        }
        match k9db_storage::select_index(table.schema(), equalities) {
            IndexPlan::Pk(pk) => {
                let shards = table.shards_containing_pk(&pk, txn)?;
                let pairs: Vec<(&str, &Value)> = shards.iter().map(|s| (s.as_str(), &pk)).collect();
                Ok(table.multi_get(&pairs, txn)?.into_iter().flatten().collect())
            }
            IndexPlan::FullScan => Ok(table.get_all(txn)?),
            _ => {
                let pairs = table.index_lookup_dedup(equalities, txn, None)?;
                let refs: Vec<(&str, &Value)> = pairs.iter().map(|(s, p)| (s.as_str(), p)).collect();
                Ok(table.multi_get(&refs, txn)?.into_iter().flatten().collect())
            }
        }
    }

    /// Copies a variably-owned target row into every shard its owning row
    /// just resolved to (spec.md §8 scenario 2), then cleans up the default
    /// shard if that was the target's only home before this write resolved
    /// a real owner for it ("default-shard cleanup" in the same scenario).
    ///
    /// Takes `db`/`compliance` rather than `&mut self` so callers can hold
    /// `self.txn` borrowed across the call instead of re-opening it.
    fn apply_varowned_copies(
        db: &Database,
        compliance: &mut ComplianceTransaction,
        links: &[k9db_planner::VarownedLink],
        txn: &dyn WriteTxn,
    ) -> Result<(), SqlError> {
        let default_shard = db.default_shard();
        for link in links {
            let target_schema = db.schema(&link.target_table)?;
            let target_table = Table::new(target_schema, db.crypto());
            let existing_shards = target_table.shards_containing_pk(&link.target_pk, txn)?;
            let Some(source_shard) = existing_shards.first() else { continue };
            let Some(row) = target_table.get(source_shard, &link.target_pk, txn)? else { continue };
            for shard in &link.shards {
                if !existing_shards.contains(shard) {
                    target_table.put(shard, &row.columns, txn)?;
                }
            }
            if existing_shards.iter().any(|s| s == &default_shard) && !link.shards.contains(&default_shard) {
                target_table.delete(&default_shard, &link.target_pk, txn)?;
                compliance.observe_left_default(&link.target_table, &link.target_pk);
            }
        }
        Ok(())
    }

    fn select_rows(&mut self, sel: &Select, args: &[Value]) -> Result<SqlResultSet, SqlError> {
        let schema = self.db.schema(&sel.table)?;
        self.ensure_txn();
        let txn = self.txn.as_ref().unwrap();
        let table = Table::new(schema.clone(), self.db.crypto());

        let mut arg_idx = 0;
        let mut equalities = Vec::new();
        if let Some(e) = &sel.selection {
            collect_equalities(e, &schema, args, &mut arg_idx, &mut equalities)?;
        }

        let plan = {
            let graph = self.db.graph_read();
            let schemas = self.db.schemas_read();
            let lookup = ShardLookupAdapter::new(&schemas, self.db.crypto(), txn);
            compile_select(&graph, &schema, &equalities, &lookup)?
        };

        let candidates = match plan {
            SelectPlan::ShardScan { shard } => table.get_shard(&shard, txn)?,
            SelectPlan::Index(IndexPlan::Pk(pk)) => {
                let shards = table.shards_containing_pk(&pk, txn)?;
                let pairs: Vec<(&str, &Value)> = shards.iter().map(|s| (s.as_str(), &pk)).collect();
                table.multi_get(&pairs, txn)?.into_iter().flatten().collect()
            }
            SelectPlan::Index(IndexPlan::FullScan) => table.get_all(txn)?,
            SelectPlan::Index(_) => {
                let pairs = table.index_lookup_dedup(&equalities, txn, None)?;
                let refs: Vec<(&str, &Value)> = pairs.iter().map(|(s, p)| (s.as_str(), p)).collect();
                table.multi_get(&refs, txn)?.into_iter().flatten().collect()
            }
        };

        let columns: Vec<String> = match &sel.projection {
            Projection::Star => schema.columns.iter().map(|c| c.name.clone()).collect(),
            Projection::Columns(names) => names.clone(),
        };
        let mut rows = Vec::new();
        for row in candidates {
            let mut a = arg_idx;
            if let Some(e) = &sel.selection {
                if !eval_bool(e, &schema, &row.columns, args, &mut a)? {
                    continue;
                }
            }
            let projected = match &sel.projection {
                Projection::Star => row.columns.clone(),
                Projection::Columns(names) => names
                    .iter()
                    .map(|name| {
                        let idx = schema.columns.iter().position(|c| &c.name == name).ok_or_else(|| SqlError::UnknownColumn(name.clone(), schema.name.clone()))?;
                        Ok(row.columns[idx].clone())
                    })
                    .collect::<Result<Vec<_>, SqlError>>()?,
            };
            rows.push(projected);
        }
        Ok(SqlResultSet { columns, rows })
    }

    fn gdpr_get(&mut self, kind: &str, id: &Value) -> Result<GetOutcome, SqlError> {
        let txn = self.txn.as_ref().expect("ensure_txn was just called");
        let graph = self.db.graph_read();
        let schemas = self.db.schemas_read();
        let rules = self.db.rules_read();
        let schema_lookup = SchemaLookupAdapter::new(&schemas);
        let mut store = GdprStoreAdapter::new(&schemas, self.db.crypto(), txn);
        Ok(gdpr_get(&graph, &schema_lookup, &rules, kind, id, &mut store)?)
    }

    fn gdpr_forget(&mut self, kind: &str, id: &Value) -> Result<ForgetOutcome, SqlError> {
        let txn = self.txn.as_ref().expect("ensure_txn was just called");
        let graph = self.db.graph_read();
        let schemas = self.db.schemas_read();
        let rules = self.db.rules_read();
        let schema_lookup = SchemaLookupAdapter::new(&schemas);
        let mut store = GdprStoreAdapter::new(&schemas, self.db.crypto(), txn);
        Ok(gdpr_forget(&graph, &schema_lookup, &rules, kind, id, &mut store)?)
    }

    fn push_view_delta(&self, table: &str, columns: &[Value], positive: bool) {
        self.db.views().push(table, columns, positive);
    }

    fn pragma(&mut self, p: k9db_sql::Pragma) -> Result<StatementResult, SqlError> {
        use k9db_sql::Pragma::*;
        match p {
            SetEcho(v) => {
                self.echo = v;
                Ok(StatementResult::Ack)
            }
            SetAutoCtx(v) => {
                self.auto_ctx = v;
                Ok(StatementResult::Ack)
            }
            CtxStart => {
                self.ensure_txn();
                self.explicit_ctx = true;
                Ok(StatementResult::Ack)
            }
            CtxCommit => {
                self.explicit_ctx = false;
                self.commit_txn()?;
                Ok(StatementResult::Ack)
            }
            CtxRollback => {
                self.explicit_ctx = false;
                self.rollback_txn()?;
                Ok(StatementResult::Ack)
            }
            ShowView(name) => Ok(StatementResult::Rows(self.db.views().query(&name))),
            ShowMemory => Ok(StatementResult::Text(format!("{} row(s) pending compliance recheck", self.compliance.pending_count()))),
            ShowShards => Ok(StatementResult::Text(self.db.graph_read().table_names().join(", "))),
            ShowPrepared => Ok(StatementResult::Text(self.prepared.texts().join("\n"))),
            ShowIndices => {
                let schemas = self.db.schemas_read();
                let mut lines = Vec::new();
                for schema in schemas.values() {
                    for idx in &schema.indices {
                        lines.push(format!("{}: index {:?}", schema.name, idx.id));
                    }
                }
                Ok(StatementResult::Text(lines.join("\n")))
            }
        }
    }
}

fn all_shards_hint() -> Vec<String> {
    Vec::new()
}
