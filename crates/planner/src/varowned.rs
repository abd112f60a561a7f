use k9db_codec::Value;
use k9db_schema::ShardGraph;
use k9db_storage::TableSchema;

use crate::column_index;
use crate::error::PlanError;

/// The effect an `OWNS`/`ACCESSES` edge has on a *different* table's row
/// when `schema`'s row is written (spec.md §8 scenario 2, "variable
/// ownership copy explosion"): `target_table`'s row with PK `target_pk`
/// should now also live in every shard of `shards` — those being the
/// shards the owning row itself resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct VarownedLink {
    pub target_table: String,
    pub target_pk: Value,
    pub shards: Vec<String>,
}

/// Every `OWNS`/`ACCESSES` edge declared on `schema`'s table, evaluated
/// against one row. Used by `k9db-engine` on `INSERT` (to copy the target
/// row into the new shard(s)) and on `DELETE` (to find candidates whose
/// last reason to be in a shard may have just disappeared).
pub fn varowned_links(
    graph: &ShardGraph,
    schema: &TableSchema,
    columns: &[Value],
    resolved_shards: &[String],
) -> Result<Vec<VarownedLink>, PlanError> {
    let mut out = Vec::new();
    for (target_table, descriptor) in graph.varowned_by(&schema.name) {
        let col = column_index(schema, &descriptor.up_column_name)?;
        let Some(pk) = columns.get(col) else { continue };
        if pk.is_null() {
            continue;
        }
        out.push(VarownedLink {
            target_table,
            target_pk: pk.clone(),
            shards: resolved_shards.to_vec(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_primitives::{ColId, TableId};
    use k9db_schema::{FkAnnotation, Relation};
    use k9db_storage::ColumnSchema;
    use pretty_assertions::assert_eq;

    fn association_schema() -> TableSchema {
        TableSchema {
            id: TableId(2),
            name: "association".into(),
            columns: vec![
                ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "group_id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
                ColumnSchema { name: "user_id".into(), ty: k9db_codec::ColumnType::Int, nullable: false },
            ],
            pk_column: ColId(0),
            indices: vec![],
        }
    }

    fn group_owns_graph() -> ShardGraph {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(TableId(1), "grps", ColId(0), "gid", false, &[]).unwrap();
        g.add_table(
            TableId(2),
            "association",
            ColId(0),
            "id",
            false,
            &[
                FkAnnotation {
                    column: ColId(1),
                    column_name: "group_id".into(),
                    target_table: "grps".into(),
                    target_column_name: "gid".into(),
                    relation: Relation::Owns,
                    nullable: false,
                },
                FkAnnotation {
                    column: ColId(2),
                    column_name: "user_id".into(),
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
    fn an_owns_edge_copies_the_target_into_the_owning_rows_shards() {
        let g = group_owns_graph();
        let schema = association_schema();
        let links = varowned_links(
            &g,
            &schema,
            &[Value::Int(0), Value::Int(0), Value::Int(0)],
            &["user__0".to_string()],
        )
        .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_table, "grps");
        assert_eq!(links[0].target_pk, Value::Int(0));
        assert_eq!(links[0].shards, vec!["user__0".to_string()]);
    }

    #[test]
    fn a_table_with_no_owns_edges_has_no_links() {
        let g = group_owns_graph();
        let schema = TableSchema {
            id: TableId(0),
            name: "user".into(),
            columns: vec![ColumnSchema { name: "id".into(), ty: k9db_codec::ColumnType::Int, nullable: false }],
            pk_column: ColId(0),
            indices: vec![],
        };
        let links = varowned_links(&g, &schema, &[Value::Int(0)], &[]).unwrap();
        assert!(links.is_empty());
    }
}
