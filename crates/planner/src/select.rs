use k9db_codec::Value;
use k9db_primitives::ColId;
use k9db_schema::{DescriptorKind, ShardGraph};
use k9db_storage::{self, TableSchema};

use crate::error::PlanError;
use crate::shard_name;
use crate::ShardLookup;

/// Per spec.md §4.6: "if `WHERE` constrains any indexed column, use the
/// index; else scan all shards." A query constrained on a `Direct`/
/// `Transitive` chain's own FK column names its target shard exactly —
/// that's strictly cheaper than a cross-shard index scan, so it is tried
/// first.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectPlan {
    ShardScan { shard: String },
    Index(k9db_storage::IndexPlan),
}

pub fn compile_select(
    graph: &ShardGraph,
    schema: &TableSchema,
    equalities: &[(ColId, Value)],
    lookup: &dyn ShardLookup,
) -> Result<SelectPlan, PlanError> {
    for chain in graph.chains_from(&schema.name)? {
        let Some(first) = chain.first() else { continue };
        if first.kind == DescriptorKind::Variable {
            continue;
        }
        let Some((_, fk_value)) = equalities.iter().find(|(c, _)| *c == first.down_column) else {
            continue;
        };
        if fk_value.is_null() {
            continue;
        }
        if chain.len() == 1 {
            let kind = first
                .shard_kind
                .as_deref()
                .expect("a length-1 non-variable chain always terminates at a data subject");
            return Ok(SelectPlan::ShardScan { shard: shard_name(kind, fk_value) });
        }
        if let Some(shard) = lookup.shards_of(&first.next_table_name, fk_value)?.into_iter().next() {
            return Ok(SelectPlan::ShardScan { shard });
        }
    }

    Ok(SelectPlan::Index(k9db_storage::select_index(schema, equalities)))
}
