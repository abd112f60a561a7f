//! `EXPLAIN COMPLIANCE` (spec.md §6.1), supplemented per SPEC_FULL.md §G: a
//! static per-table sharding report plus the warning set
//! `original_source/k9db/explain.cc` emits (variable-ownership copy
//! explosion, multiple owner chains, excessive regular sharding, all-nullable
//! paths). Unlike the runtime statement path, this only reads the schema
//! graph — no transaction, no live shard occupancy.

use k9db_schema::{DescriptorKind, OwnershipChain, ShardGraph};

pub fn explain_compliance(graph: &ShardGraph) -> String {
    let mut out = String::new();
    out.push_str("############# EXPLAIN COMPLIANCE #############\n");
    for table in graph.table_names().map(str::to_string).collect::<Vec<_>>() {
        out.push_str("-----------------------------------------\n");
        let chains = graph.chains_from(&table).expect("table just listed by table_names");
        let is_subject = graph.is_data_subject(&table).expect("table just listed by table_names");
        let is_sharded = !chains.is_empty();

        out.push_str(&format!("{table}: "));
        if is_subject {
            out.push_str("DATASUBJECT");
            if is_sharded {
                out.push_str(" AND SHARDED");
            }
            out.push('\n');
        } else if is_sharded {
            out.push_str("SHARDED\n");
        } else {
            out.push_str("UNSHARDED\n");
            continue;
        }

        if !is_sharded {
            continue;
        }
        for chain in chains {
            describe_chain(&mut out, &table, chain);
        }
        warn_about_sharding(&mut out, chains);
    }
    out.push_str("############# END EXPLAIN COMPLIANCE #############\n");
    out
}

/// One line per ownership chain: `via T(col) -> T'(col') -> ...`, plus the
/// hop count for anything longer than a direct chain.
fn describe_chain(out: &mut String, table: &str, chain: &OwnershipChain) {
    let mut last = table.to_string();
    let mut hops = Vec::new();
    for d in chain {
        hops.push(format!("{last}({}) -> {}({})", d.down_column_name, d.next_table_name, d.up_column_name));
        last = d.next_table_name.clone();
    }
    out.push_str(&format!("  via {}\n", hops.join(" -> ")));
    if chain.len() > 1 {
        out.push_str(&format!("      total distance {}\n", chain.len()));
    }
}

fn warn_about_sharding(out: &mut String, chains: &[OwnershipChain]) {
    let mut varown_chain_lens = Vec::new();
    let mut all_nullable = true;
    for chain in chains {
        if chain.first().is_some_and(|d| d.kind == DescriptorKind::Variable) {
            varown_chain_lens.push(chain.len());
        }
        if !ShardGraph::is_nullable_chain(chain) {
            all_nullable = false;
        }
    }
    let varown_shardings = varown_chain_lens.len();
    let regular_shardings = chains.len() - varown_shardings;
    let longest_varown = varown_chain_lens.iter().copied().max().unwrap_or(0);

    if longest_varown > 1 {
        out.push_str(&format!(
            "  [SEVERE] variably sharded {longest_varown} times in sequence; this will create a copy explosion, review your OWNS/ACCESSES annotations.\n"
        ));
    }
    if varown_shardings > 1 {
        out.push_str("  [Warning] this table is variably owned in multiple ways; this may not be desired behavior.\n");
    } else if varown_shardings == 1 && longest_varown <= 1 {
        out.push_str("  [Info] this table is variably owned.\n");
    }
    if varown_shardings >= 1 && longest_varown <= 1 && regular_shardings > 1 {
        out.push_str(&format!(
            "  [Warning] this table is variably owned and also copied an additional {regular_shardings} times.\n"
        ));
    } else if regular_shardings > 5 {
        out.push_str(&format!(
            "  [Warning] this table is sharded {regular_shardings} times; this seems excessive, check your OWNED_BY annotations.\n"
        ));
    } else if regular_shardings > 2 {
        out.push_str(&format!("  [Info] this table is copied {regular_shardings} times.\n"));
    }
    if all_nullable {
        out.push_str(
            "  [Warning] this table is sharded, but every sharding path is nullable; a NULL foreign key falls to the default shard.\n",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_primitives::{ColId, TableId};
    use k9db_schema::{FkAnnotation, Relation};
    use pretty_assertions::assert_eq;

    fn ann(col: ColId, col_name: &str, target: &str, target_col: &str, rel: Relation) -> FkAnnotation {
        FkAnnotation { column: col, column_name: col_name.into(), target_table: target.into(), target_column_name: target_col.into(), relation: rel, nullable: false }
    }

    #[test]
    fn reports_datasubject_sharded_and_unsharded_tables() {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(TableId(1), "lookup", ColId(0), "code", false, &[]).unwrap();
        g.add_table(TableId(2), "msg", ColId(0), "id", false, &[ann(ColId(1), "sender", "user", "id", Relation::OwnedBy)]).unwrap();

        let report = explain_compliance(&g);
        assert!(report.contains("user: DATASUBJECT"));
        assert!(report.contains("lookup: UNSHARDED"));
        assert!(report.contains("msg: SHARDED"));
        assert!(report.contains("via msg(sender) -> user(id)"));
    }

    #[test]
    fn warns_about_variable_ownership() {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(TableId(1), "grps", ColId(0), "gid", false, &[]).unwrap();
        g.add_table(
            TableId(2),
            "association",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "group_id", "grps", "gid", Relation::Owns), ann(ColId(2), "user_id", "user", "id", Relation::OwnedBy)],
        )
        .unwrap();

        let report = explain_compliance(&g);
        assert!(report.contains("grps: SHARDED"));
        assert!(report.contains("[Info] this table is variably owned."));
    }
}
