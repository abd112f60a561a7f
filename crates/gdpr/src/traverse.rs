use std::collections::{HashMap, HashSet};

use k9db_codec::Value;
use k9db_planner::shard_name;
use k9db_schema::{DescriptorKind, ShardGraph};
use k9db_sql::{AnonRule, RuleAction, RuleTarget, RuleWhen};
use k9db_storage::TableSchema;

use crate::error::GdprError;
use crate::rules::RuleRegistry;

/// One row surfaced by [`gdpr_get`], after `ON GET` rules have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GdprRow {
    pub table: String,
    pub shard: String,
    pub pk: Value,
    pub columns: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetOutcome {
    pub rows: Vec<GdprRow>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForgetOutcome {
    /// Every low-level put/delete/anonymize, counted once each (spec.md
    /// §4.8, "Counting for the return value").
    pub operations: usize,
}

/// Looks up a table's schema by name. `k9db-engine` implements this against
/// its own in-memory catalog of `TableSchema`s.
pub trait SchemaLookup {
    fn schema(&self, table: &str) -> Result<&TableSchema, GdprError>;
}

/// The row-level operations GDPR traversal needs. `k9db-engine` implements
/// this against `k9db-storage::Table` inside the session's write
/// transaction.
pub trait GdprStore {
    fn rows_in_shard(&mut self, table: &str, shard: &str) -> Result<Vec<(Value, Vec<Value>)>, GdprError>;
    fn put(&mut self, table: &str, shard: &str, columns: &[Value]) -> Result<(), GdprError>;
    fn delete(&mut self, table: &str, shard: &str, pk: &Value) -> Result<(), GdprError>;
    /// A single row by PK, if it's present in `shard`. Used to read a data
    /// subject's own row once (spec.md §4.8 step 1) rather than scanning the
    /// whole shard to find it among [`Self::rows_in_shard`]'s results.
    fn get(&mut self, table: &str, shard: &str, pk: &Value) -> Result<Option<Vec<Value>>, GdprError>;
}

/// spec.md §4.8 step 1: "If the subject is itself sharded (user sharded by
/// another user), union across its own shards." A `CREATE DATA_SUBJECT
/// TABLE` always has a home in its own `kind__id` shard, but it may *also*
/// declare `OWNED_BY`/`ACCESSED_BY` against another data subject, in which
/// case its row lives in that owner's shard too (resolved the same way
/// `k9db-planner::compile_insert` placed it there).
fn subject_shards(
    graph: &ShardGraph,
    kind: &str,
    id: &Value,
    store: &mut dyn GdprStore,
) -> Result<Vec<String>, GdprError> {
    let own_shard = shard_name(kind, id);
    let mut shards = vec![own_shard.clone()];
    let chains: Vec<_> = graph
        .chains_from(kind)?
        .iter()
        .filter(|c| c.first().is_some_and(|d| d.kind != DescriptorKind::Variable))
        .cloned()
        .collect();
    if chains.is_empty() {
        return Ok(shards);
    }
    let Some(columns) = store.get(kind, &own_shard, id)? else {
        return Ok(shards);
    };
    for chain in &chains {
        let first = chain.first().expect("filtered to non-empty, non-variable chains above");
        let idx = first.down_column.0 as usize;
        let Some(fk_value) = columns.get(idx) else { continue };
        if fk_value.is_null() {
            continue;
        }
        let owner_kind = first.shard_kind.as_deref().expect("non-variable chain always names its shard_kind");
        let shard = shard_name(owner_kind, fk_value);
        if !shards.contains(&shard) {
            shards.push(shard);
        }
    }
    Ok(shards)
}

/// spec.md §4.8, `GDPR GET <kind> <id>`.
pub fn gdpr_get(
    graph: &ShardGraph,
    schemas: &dyn SchemaLookup,
    rules: &RuleRegistry,
    kind: &str,
    id: &Value,
    store: &mut dyn GdprStore,
) -> Result<GetOutcome, GdprError> {
    let subject_shard = shard_name(kind, id);
    let subject_shard_set = subject_shards(graph, kind, id, store)?;
    let mut tables = graph.tables_sharing_subject(kind);
    if !tables.iter().any(|t| t == kind) {
        tables.push(kind.to_string());
    }

    let mut seen: HashSet<(String, Value)> = HashSet::new();
    let mut rows = Vec::new();
    for table in tables {
        let schema = schemas.schema(&table)?;
        // The subject's own row can live in more than `kind__id` (step 1);
        // every other table reachable from it is still keyed by the
        // subject's id, so it only ever lives in `kind__id`.
        let shards: &[String] = if table == kind { &subject_shard_set } else { std::slice::from_ref(&subject_shard) };
        for shard in shards {
            for (pk, mut columns) in store.rows_in_shard(&table, shard)? {
                if !seen.insert((table.clone(), pk.clone())) {
                    continue; // dedup by row (spec.md §4.8 step 2)
                }
                apply_get_rules(rules.rules_for(&table), schema, id, &mut columns)?;
                rows.push(GdprRow { table: table.clone(), shard: shard.clone(), pk, columns });
            }
        }
    }
    Ok(GetOutcome { rows })
}

/// spec.md §4.8, `GDPR FORGET <kind> <id>`.
pub fn gdpr_forget(
    graph: &ShardGraph,
    schemas: &dyn SchemaLookup,
    rules: &RuleRegistry,
    kind: &str,
    id: &Value,
    store: &mut dyn GdprStore,
) -> Result<ForgetOutcome, GdprError> {
    let subject_shard = shard_name(kind, id);
    let mut operations = 0usize;

    for table in graph.tables_sharing_subject(kind) {
        let schema = schemas.schema(&table)?;
        for (pk, columns) in store.rows_in_shard(&table, &subject_shard)? {
            operations += forget_one_row(graph, schema, rules, kind, id, &table, &subject_shard, pk, columns, store)?;
        }
    }

    // Step 4: the subject row itself is always deleted, from every shard it
    // occupies — not just `kind__id` if the subject is itself sharded by
    // another subject (step 1).
    schemas.schema(kind)?;
    for shard in subject_shards(graph, kind, id, store)? {
        store.delete(kind, &shard, id)?;
        operations += 1;
    }

    Ok(ForgetOutcome { operations })
}

#[allow(clippy::too_many_arguments)]
fn forget_one_row(
    graph: &ShardGraph,
    schema: &TableSchema,
    rules: &RuleRegistry,
    kind: &str,
    id: &Value,
    table: &str,
    shard: &str,
    pk: Value,
    mut columns: Vec<Value>,
    store: &mut dyn GdprStore,
) -> Result<usize, GdprError> {
    let applicable: Vec<&AnonRule> = rules
        .rules_for(table)
        .iter()
        .filter(|r| r.when == RuleWhen::Del && rule_fires(&r.target, schema, &columns, id))
        .collect();

    if applicable.is_empty() {
        if is_purely_accessed(graph, table, kind)? {
            // Accessor-only edges never cascade a delete; the FK is
            // anonymized and the row stays (spec.md §4.6, "Delete plan").
            null_subject_fk(graph, table, kind, schema, &mut columns)?;
            store.put(table, shard, &columns)?;
            return Ok(1);
        }
        store.delete(table, shard, &pk)?;
        return Ok(1);
    }

    let any_delete_row = applicable.iter().any(|r| matches!(r.action, RuleAction::DeleteRow));
    let anon_rules: Vec<&Vec<String>> = applicable
        .iter()
        .filter_map(|r| match &r.action {
            RuleAction::Anon(cols) => Some(cols),
            RuleAction::DeleteRow => None,
        })
        .collect();

    // "If at least one path fires DELETE_ROW and any other path requires
    // preservation, the row is preserved with anonymization applied from
    // that path" (spec.md §4.7).
    if any_delete_row && anon_rules.is_empty() {
        store.delete(table, shard, &pk)?;
        return Ok(1);
    }

    let cols_to_null = intersect_anon_columns(&anon_rules);
    for name in &cols_to_null {
        let idx = column_index(schema, name)?;
        columns[idx] = Value::Null;
    }
    store.put(table, shard, &columns)?;
    Ok(1)
}

fn intersect_anon_columns(rule_sets: &[&Vec<String>]) -> Vec<String> {
    let Some((first, rest)) = rule_sets.split_first() else { return Vec::new() };
    first.iter().filter(|c| rest.iter().all(|set| set.contains(*c))).cloned().collect()
}

fn apply_get_rules(
    rules: &[AnonRule],
    schema: &TableSchema,
    id: &Value,
    columns: &mut [Value],
) -> Result<(), GdprError> {
    let firing: Vec<&AnonRule> =
        rules.iter().filter(|r| r.when == RuleWhen::Get && rule_fires(&r.target, schema, columns, id)).collect();
    let anon_rules: Vec<&Vec<String>> = firing
        .iter()
        .filter_map(|r| match &r.action {
            RuleAction::Anon(cols) => Some(cols),
            RuleAction::DeleteRow => None,
        })
        .collect();
    for name in &intersect_anon_columns(&anon_rules) {
        let idx = column_index(schema, name)?;
        columns[idx] = Value::Null;
    }
    Ok(())
}

/// `Related` targets reference an inverse (`OWNS`/`ACCESSES`) edge rather
/// than a literal column of this row; evaluating that precisely needs a
/// live cross-table lookup this traversal does not perform, so such a rule
/// is treated as always-firing when declared. `Column` targets fire only
/// when that column's value is the subject being processed.
fn rule_fires(target: &RuleTarget, schema: &TableSchema, columns: &[Value], id: &Value) -> bool {
    match target {
        RuleTarget::Column(name) => column_index(schema, name).ok().map(|i| &columns[i] == id).unwrap_or(false),
        RuleTarget::Related { .. } => true,
    }
}

fn is_purely_accessed(graph: &ShardGraph, table: &str, kind: &str) -> Result<bool, GdprError> {
    let chains = graph.chains_from(table)?;
    let matching: Vec<_> =
        chains.iter().filter(|c| c.first().is_some_and(|d| d.shard_kind.as_deref() == Some(kind))).collect();
    Ok(!matching.is_empty() && matching.iter().all(|c| ShardGraph::is_access_only_chain(c)))
}

fn null_subject_fk(
    graph: &ShardGraph,
    table: &str,
    kind: &str,
    schema: &TableSchema,
    columns: &mut [Value],
) -> Result<(), GdprError> {
    for chain in graph.chains_from(table)? {
        let Some(first) = chain.first() else { continue };
        if first.shard_kind.as_deref() == Some(kind) {
            let idx = column_index(schema, &first.down_column_name)?;
            columns[idx] = Value::Null;
        }
    }
    Ok(())
}

fn column_index(schema: &TableSchema, name: &str) -> Result<usize, GdprError> {
    schema
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| GdprError::UnknownColumn(name.to_string(), schema.name.clone()))
}
