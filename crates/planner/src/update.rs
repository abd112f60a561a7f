use k9db_codec::Value;
use k9db_schema::ShardGraph;
use k9db_storage::TableSchema;

use crate::error::PlanError;
use crate::insert::resolve_targets;
use crate::{default_shard, ShardLookup};

/// Per spec.md §4.6: "compute new row; for each chain, compare old vs new
/// shard assignment; issue `IndexDelete + Delete` for shards no longer
/// implied and `IndexAdd + Put` for new ones; in-place `Put` when the shard
/// is unchanged."
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

pub fn compile_update(
    graph: &ShardGraph,
    schema: &TableSchema,
    old_columns: &[Value],
    new_columns: &[Value],
    lookup: &dyn ShardLookup,
) -> Result<UpdatePlan, PlanError> {
    let (mut old_targets, old_resolved) = resolve_targets(graph, schema, old_columns, lookup)?;
    let (mut new_targets, new_resolved) = resolve_targets(graph, schema, new_columns, lookup)?;
    if !old_resolved {
        old_targets.insert(default_shard());
    }
    if !new_resolved {
        new_targets.insert(default_shard());
    }

    let added = new_targets.iter().filter(|s| !old_targets.contains(*s)).cloned().collect();
    let removed = old_targets.iter().filter(|s| !new_targets.contains(*s)).cloned().collect();
    let unchanged = new_targets.iter().filter(|s| old_targets.contains(*s)).cloned().collect();
    Ok(UpdatePlan { added, removed, unchanged })
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

    fn msg_schema() -> TableSchema {
        TableSchema {
            id: TableId(1),
            name: "msg".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "sender".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
            ],
            pk_column: ColId(0),
            indices: vec![],
        }
    }

    fn owned_by_user_graph() -> ShardGraph {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "msg",
            ColId(0),
            "id",
            false,
            &[FkAnnotation {
                column: ColId(1),
                column_name: "sender".into(),
                target_table: "user".into(),
                target_column_name: "id".into(),
                relation: Relation::OwnedBy,
                nullable: false,
            }],
        )
        .unwrap();
        g
    }

    #[test]
    fn reassigning_the_owner_moves_the_row_between_shards() {
        let g = owned_by_user_graph();
        let schema = msg_schema();
        let plan = compile_update(
            &g,
            &schema,
            &[Value::Int(1), Value::Int(0)],
            &[Value::Int(1), Value::Int(7)],
            &NullLookup,
        )
        .unwrap();
        assert_eq!(plan.added, vec!["user__7".to_string()]);
        assert_eq!(plan.removed, vec!["user__0".to_string()]);
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn an_unchanged_owner_is_an_in_place_put() {
        let g = owned_by_user_graph();
        let schema = msg_schema();
        let plan = compile_update(
            &g,
            &schema,
            &[Value::Int(1), Value::Int(0)],
            &[Value::Int(1), Value::Int(0)],
            &NullLookup,
        )
        .unwrap();
        assert!(plan.added.is_empty());
        assert!(plan.removed.is_empty());
        assert_eq!(plan.unchanged, vec!["user__0".to_string()]);
    }
}
