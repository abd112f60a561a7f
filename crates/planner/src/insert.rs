use indexmap::IndexSet;
use k9db_codec::Value;
use k9db_schema::{DescriptorKind, OwnershipChain, ShardGraph};
use k9db_storage::TableSchema;

use crate::error::PlanError;
use crate::{default_shard, shard_name, ShardLookup};

/// Per spec.md §4.6: "for each chain rooted at a varowned table V, evaluate
/// V on the new row; for each other chain, follow the FK to retrieve the
/// owner's shard; for each resolved shard, write `(shard, pk) → row`; if a
/// chain yields no shard, write to default and mark row as dangling."
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    /// Every distinct shard this row must be written to, in chain order
    /// with duplicates removed.
    pub targets: Vec<String>,
    /// True iff no ownership chain resolved and the row fell back to the
    /// default shard (spec.md §3, "Lifecycle").
    pub dangling: bool,
    /// True iff `schema` declares at least one `Direct`/`Transitive` chain
    /// — i.e. a row of this table is actually supposed to resolve an
    /// owner on insert, so a `dangling` row here is a genuine compliance
    /// risk. A table reachable only through a `Variable` (`OWNS`/
    /// `ACCESSES`) chain, or with no ownership chain at all, is not: its
    /// placement is resolved (if ever) by a *different* row's insert
    /// (spec.md §8 "variable ownership copy explosion"), so sitting in
    /// the default shard after its own insert is not, by itself, a
    /// violation.
    pub requires_ownership: bool,
}

/// `columns` are the new row's values in declared column order.
pub fn compile_insert(
    graph: &ShardGraph,
    schema: &TableSchema,
    columns: &[Value],
    lookup: &dyn ShardLookup,
) -> Result<InsertPlan, PlanError> {
    let (targets, any_resolved) = resolve_targets(graph, schema, columns, lookup)?;
    let mut targets = targets;
    let dangling = !any_resolved;
    if dangling {
        targets.insert(default_shard());
    }
    let requires_ownership = requires_ownership(graph, &schema.name)?;
    Ok(InsertPlan { targets: targets.into_iter().collect(), dangling, requires_ownership })
}

/// True iff `table` declares at least one `Direct`/`Transitive` chain —
/// see [`InsertPlan::requires_ownership`].
pub fn requires_ownership(graph: &ShardGraph, table: &str) -> Result<bool, PlanError> {
    Ok(graph
        .chains_from(table)?
        .iter()
        .any(|c| c.first().is_some_and(|d| d.kind != DescriptorKind::Variable)))
}

/// Shared by insert and update: every shard this row's non-`Variable`
/// chains resolve to, plus whether at least one chain resolved at all.
/// `Variable` chains are skipped here — their target's placement is
/// evaluated by [`crate::varowned_links`] off the *owning* row, not by
/// walking the varowned table's own (empty) chain list.
///
/// A `CREATE DATA_SUBJECT TABLE` row always has a home in its own
/// `<kind>__<id>` shard (spec.md §3) rather than falling through to
/// `default` — but the subject can *also* declare `OWNED_BY`/`ACCESSED_BY`
/// against another data subject (spec.md §4.8 step 1, "user sharded by
/// another user"), in which case its row additionally lands in that
/// owner's shard just like any other table's chains below.
pub(crate) fn resolve_targets(
    graph: &ShardGraph,
    schema: &TableSchema,
    columns: &[Value],
    lookup: &dyn ShardLookup,
) -> Result<(IndexSet<String>, bool), PlanError> {
    let mut targets = IndexSet::new();
    let mut any_resolved = false;
    if graph.is_data_subject(&schema.name)? {
        let pk = &columns[schema.pk_column.0 as usize];
        targets.insert(shard_name(&schema.name, pk));
        any_resolved = true;
    }

    for chain in graph.chains_from(&schema.name)? {
        let Some(first) = chain.first() else { continue };
        if first.kind == DescriptorKind::Variable {
            continue;
        }
        for shard in resolve_chain(chain, columns, lookup)? {
            targets.insert(shard);
            any_resolved = true;
        }
    }
    Ok((targets, any_resolved))
}

/// Evaluate one ownership chain against a row's columns. A length-1 chain
/// ends at a data subject directly (`Direct`): the shard is named by the
/// FK's own value. A longer chain (`Transitive`) needs the immediate
/// ancestor's *current* shard placement, which only storage knows.
fn resolve_chain(
    chain: &OwnershipChain,
    columns: &[Value],
    lookup: &dyn ShardLookup,
) -> Result<Vec<String>, PlanError> {
    let first = chain.first().expect("chains are never empty");
    let idx = first.down_column.0 as usize;
    let Some(fk_value) = columns.get(idx) else {
        return Ok(Vec::new());
    };
    if fk_value.is_null() {
        return Ok(Vec::new());
    }
    if chain.len() == 1 {
        let kind = first
            .shard_kind
            .as_deref()
            .expect("a length-1 non-variable chain always terminates at a data subject");
        return Ok(vec![shard_name(kind, fk_value)]);
    }
    lookup.shards_of(&first.next_table_name, fk_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_primitives::{ColId, TableId};
    use k9db_schema::{FkAnnotation, Relation};
    use k9db_storage::ColumnSchema;
    use pretty_assertions::assert_eq;

    struct NullLookup;
    impl ShardLookup for NullLookup {
        fn shards_of(&self, _table: &str, _pk: &Value) -> Result<Vec<String>, PlanError> {
            Ok(Vec::new())
        }
    }

    fn user_schema() -> TableSchema {
        TableSchema {
            id: TableId(0),
            name: "user".into(),
            columns: vec![ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false }],
            pk_column: ColId(0),
            indices: vec![],
        }
    }

    fn msg_schema() -> TableSchema {
        TableSchema {
            id: TableId(1),
            name: "msg".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "sender".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "receiver".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
            ],
            pk_column: ColId(0),
            indices: vec![],
        }
    }

    fn two_owner_graph() -> ShardGraph {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "msg",
            ColId(0),
            "id",
            false,
            &[
                FkAnnotation {
                    column: ColId(1),
                    column_name: "sender".into(),
                    target_table: "user".into(),
                    target_column_name: "id".into(),
                    relation: Relation::OwnedBy,
                    nullable: false,
                },
                FkAnnotation {
                    column: ColId(2),
                    column_name: "receiver".into(),
                    target_table: "user".into(),
                    target_column_name: "id".into(),
                    relation: Relation::OwnedBy,
                    nullable: false,
                },
            ],
        )
        .unwrap();
        g
    }

    #[test]
    fn two_distinct_owners_fan_out_to_two_shards() {
        let g = two_owner_graph();
        let schema = msg_schema();
        let plan = compile_insert(
            &g,
            &schema,
            &[Value::Int(1), Value::Int(0), Value::Int(10)],
            &NullLookup,
        )
        .unwrap();
        assert_eq!(plan.targets, vec!["user__0".to_string(), "user__10".to_string()]);
        assert!(!plan.dangling);
    }

    #[test]
    fn the_same_owner_twice_collapses_to_one_shard() {
        let g = two_owner_graph();
        let schema = msg_schema();
        let plan = compile_insert(
            &g,
            &schema,
            &[Value::Int(2), Value::Int(0), Value::Int(0)],
            &NullLookup,
        )
        .unwrap();
        assert_eq!(plan.targets, vec!["user__0".to_string()]);
    }

    #[test]
    fn a_data_subject_shards_by_its_own_pk() {
        let g = two_owner_graph();
        let schema = user_schema();
        // `user` is the subject itself — it shards by its own pk, never
        // `default`, since it owns itself rather than following an FK.
        let plan = compile_insert(&g, &schema, &[Value::Int(5)], &NullLookup).unwrap();
        assert!(!plan.dangling);
        assert_eq!(plan.targets, vec!["user__5".to_string()]);
    }

    #[test]
    fn a_data_subject_owned_by_another_subject_unions_both_shards() {
        // `user` is itself a data subject, but also declares `OWNED_BY
        // admin(id)` — spec.md §4.8 step 1's "user sharded by another
        // user". Its row must land in both `user__<pk>` and `admin__<fk>`.
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "admin", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "user",
            ColId(0),
            "id",
            true,
            &[FkAnnotation {
                column: ColId(1),
                column_name: "admin_id".into(),
                target_table: "admin".into(),
                target_column_name: "id".into(),
                relation: Relation::OwnedBy,
                nullable: false,
            }],
        )
        .unwrap();
        let schema = TableSchema {
            id: TableId(1),
            name: "user".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "admin_id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
            ],
            pk_column: ColId(0),
            indices: vec![],
        };

        let plan = compile_insert(&g, &schema, &[Value::Int(5), Value::Int(9)], &NullLookup).unwrap();
        assert!(!plan.dangling);
        assert_eq!(plan.targets, vec!["user__5".to_string(), "admin__9".to_string()]);
    }
}
