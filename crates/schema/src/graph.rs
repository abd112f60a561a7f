use std::collections::HashSet;

use indexmap::IndexMap;
use k9db_primitives::{ColId, TableId};

use crate::error::SchemaError;
use crate::types::{
    chain_is_access_only, DescriptorKind, FkAnnotation, OwnershipChain, Relation, ShardDescriptor,
};

struct TableNode {
    id: TableId,
    name: String,
    pk_column: ColId,
    pk_column_name: String,
    is_data_subject: bool,
    /// Fully flattened chains, materialized at `CREATE TABLE` time per
    /// spec.md §4.5 ("Chains are derived once at `CREATE TABLE` time by
    /// DFS; a table may have many chains").
    chains: Vec<OwnershipChain>,
}

/// The shard descriptor graph and schema state (C5). Tables must be added in
/// an order consistent with their `FOREIGN KEY` references — the same
/// constraint ordinary SQL FK declarations already impose — except for
/// `OWNS`/`ACCESSES` edges, which reach backward to retroactively attach a
/// [`DescriptorKind::Variable`] chain onto an already-declared table.
#[derive(Default)]
pub struct ShardGraph {
    tables: IndexMap<String, TableNode>,
}

impl ShardGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_data_subject(&self, table: &str) -> Result<bool, SchemaError> {
        Ok(self.node(table)?.is_data_subject)
    }

    pub fn owners_of(&self, table: &str) -> Result<Vec<String>, SchemaError> {
        let node = self.node(table)?;
        Ok(node
            .chains
            .iter()
            .filter_map(|c| c.iter().find_map(|d| d.shard_kind.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect())
    }

    pub fn chains_from(&self, table: &str) -> Result<&[OwnershipChain], SchemaError> {
        Ok(&self.node(table)?.chains)
    }

    /// Every declared table, in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Tables `table` `OWNS`/`ACCESSES` — i.e. tables whose row moves into
    /// `table`'s resolved shard when `table` is inserted (spec.md §4.5,
    /// "OWNS"). Returns `(varowned_table, descriptor)` pairs;
    /// `descriptor.up_column_name` names the column of `table` whose value
    /// is `varowned_table`'s own PK.
    pub fn varowned_by(&self, table: &str) -> Vec<(String, ShardDescriptor)> {
        let mut out = Vec::new();
        for node in self.tables.values() {
            for chain in &node.chains {
                if let Some(first) = chain.first() {
                    if first.kind == DescriptorKind::Variable && first.next_table_name == table {
                        out.push((node.name.clone(), first.clone()));
                    }
                }
            }
        }
        out
    }

    pub fn is_nullable_chain(chain: &OwnershipChain) -> bool {
        !chain.is_empty() && chain.iter().all(|d| d.down_column_nullable)
    }

    pub fn is_access_only_chain(chain: &OwnershipChain) -> bool {
        chain_is_access_only(chain)
    }

    /// Tables whose rows can appear in a `kind`-shard: those whose
    /// non-`Variable` chains terminate at `kind` (mirrors [`Self::owners_of`]
    /// in reverse), plus every varowned table, since a `Variable` chain's
    /// placement is only known dynamically and any subject's shard is a
    /// candidate (spec.md §4.8, "push-down traversal").
    pub fn tables_sharing_subject(&self, kind: &str) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, node)| {
                node.chains.iter().any(|c| {
                    c.first().is_some_and(|d| {
                        d.shard_kind.as_deref() == Some(kind) || d.kind == DescriptorKind::Variable
                    })
                })
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn node(&self, table: &str) -> Result<&TableNode, SchemaError> {
        self.tables
            .get(table)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))
    }

    /// Register a new table and fold in its `FOREIGN KEY` annotations
    /// (spec.md §4.5). `annotations` covers `OWNED_BY`/`ACCESSED_BY` (which
    /// extend *this* table's own chains from an already-declared ancestor)
    /// and `OWNS`/`ACCESSES` (which reach back and extend the *referenced*
    /// table's chains with a `Variable` descriptor).
    pub fn add_table(
        &mut self,
        id: TableId,
        name: &str,
        pk_column: ColId,
        pk_column_name: &str,
        is_data_subject: bool,
        annotations: &[FkAnnotation],
    ) -> Result<(), SchemaError> {
        if self.tables.contains_key(name) {
            return Err(SchemaError::UnknownTable(format!("{name} (redeclared)")));
        }

        let mut own_chains = Vec::new();
        let mut retroactive: Vec<(String, OwnershipChain)> = Vec::new();

        for ann in annotations {
            if ann.relation.is_inverse() {
                // OWNS / ACCESSES: the edge belongs to the *referenced*
                // table, which must already exist.
                let target = self.node(&ann.target_table).cloned_summary()?;
                let descriptor = ShardDescriptor {
                    kind: DescriptorKind::Variable,
                    shard_kind: None,
                    down_column: target.pk_column,
                    down_column_name: target.pk_column_name.clone(),
                    next_table: id,
                    next_table_name: name.to_string(),
                    up_column_name: ann.column_name.clone(),
                    is_varowned: true,
                    is_transitive: false,
                    access_only: ann.relation.is_access_only(),
                    down_column_nullable: ann.nullable,
                };
                retroactive.push((ann.target_table.clone(), vec![descriptor]));
                continue;
            }

            // OWNED_BY / ACCESSED_BY: extend this table's own chains.
            let ancestor = self.node(&ann.target_table)?;
            if ancestor.is_data_subject {
                let descriptor = ShardDescriptor {
                    kind: DescriptorKind::Direct,
                    shard_kind: Some(ancestor.name.clone()),
                    down_column: ann.column,
                    down_column_name: ann.column_name.clone(),
                    next_table: ancestor.id,
                    next_table_name: ancestor.name.clone(),
                    up_column_name: ann.target_column_name.clone(),
                    is_varowned: false,
                    is_transitive: false,
                    access_only: ann.relation.is_access_only(),
                    down_column_nullable: ann.nullable,
                };
                own_chains.push(vec![descriptor]);
            } else {
                if ancestor.chains.is_empty() {
                    return Err(SchemaError::UnresolvableSelfReference {
                        table: name.to_string(),
                        col: ann.column_name.clone(),
                        kind: "transitively owned by a table with no ownership chain of its own",
                    });
                }
                let mut visited = HashSet::new();
                for chain in &ancestor.chains {
                    let Some(shard_kind) = chain.iter().find_map(|d| d.shard_kind.clone()) else {
                        continue; // ancestor chain is itself variable; not transitively composable here.
                    };
                    if !visited.insert((ancestor.id, shard_kind.clone())) {
                        return Err(SchemaError::Cycle(ancestor.id, shard_kind));
                    }
                    let descriptor = ShardDescriptor {
                        kind: DescriptorKind::Transitive,
                        shard_kind: Some(shard_kind),
                        down_column: ann.column,
                        down_column_name: ann.column_name.clone(),
                        next_table: ancestor.id,
                        next_table_name: ancestor.name.clone(),
                        up_column_name: ann.target_column_name.clone(),
                        is_varowned: false,
                        is_transitive: true,
                        access_only: ann.relation.is_access_only() || chain_is_access_only(chain),
                        down_column_nullable: ann.nullable,
                    };
                    let mut new_chain = vec![descriptor];
                    new_chain.extend(chain.iter().cloned());
                    own_chains.push(new_chain);
                }
            }
        }

        self.tables.insert(
            name.to_string(),
            TableNode {
                id,
                name: name.to_string(),
                pk_column,
                pk_column_name: pk_column_name.to_string(),
                is_data_subject,
                chains: own_chains,
            },
        );

        for (target, chain) in retroactive {
            let node = self
                .tables
                .get_mut(&target)
                .ok_or_else(|| SchemaError::UnknownTable(target.clone()))?;
            node.chains.push(chain);
        }

        Ok(())
    }
}

/// Tiny helper so `add_table` can read an ancestor's PK shape before it
/// releases the borrow, without cloning the whole `TableNode` (chains can be
/// large).
struct TableSummary {
    pk_column: ColId,
    pk_column_name: String,
}

trait NodeLookupExt {
    fn cloned_summary(self) -> Result<TableSummary, SchemaError>;
}

impl<'a> NodeLookupExt for Result<&'a TableNode, SchemaError> {
    fn cloned_summary(self) -> Result<TableSummary, SchemaError> {
        self.map(|n| TableSummary { pk_column: n.pk_column, pk_column_name: n.pk_column_name.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_primitives::{ColId, TableId};
    use pretty_assertions::assert_eq;

    fn ann(col: ColId, col_name: &str, target: &str, target_col: &str, rel: Relation) -> FkAnnotation {
        FkAnnotation {
            column: col,
            column_name: col_name.to_string(),
            target_table: target.to_string(),
            target_column_name: target_col.to_string(),
            relation: rel,
            nullable: false,
        }
    }

    #[test]
    fn direct_chain_to_a_data_subject() {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "posts",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "author_id", "user", "id", Relation::OwnedBy)],
        )
        .unwrap();

        let chains = g.chains_from("posts").unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 1);
        assert_eq!(chains[0][0].kind, DescriptorKind::Direct);
        assert_eq!(chains[0][0].shard_kind.as_deref(), Some("user"));
    }

    #[test]
    fn transitive_chain_through_a_non_subject_ancestor() {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "posts",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "author_id", "user", "id", Relation::OwnedBy)],
        )
        .unwrap();
        g.add_table(
            TableId(2),
            "comments",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "post_id", "posts", "id", Relation::OwnedBy)],
        )
        .unwrap();

        let chains = g.chains_from("comments").unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 2);
        assert_eq!(chains[0][0].kind, DescriptorKind::Transitive);
        assert_eq!(chains[0][1].kind, DescriptorKind::Direct);
        assert_eq!(chains[0][0].shard_kind.as_deref(), Some("user"));
    }

    #[test]
    fn owns_edge_retroactively_varowns_the_target_table() {
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
                ann(ColId(1), "group_id", "grps", "gid", Relation::Owns),
                ann(ColId(2), "user_id", "user", "id", Relation::OwnedBy),
            ],
        )
        .unwrap();

        let grps_chains = g.chains_from("grps").unwrap();
        assert_eq!(grps_chains.len(), 1);
        assert!(grps_chains[0][0].is_varowned);
        assert_eq!(grps_chains[0][0].shard_kind, None);
    }

    #[test]
    fn access_only_propagates_through_transitive_chains() {
        let mut g = ShardGraph::new();
        g.add_table(TableId(0), "user", ColId(0), "id", true, &[]).unwrap();
        g.add_table(
            TableId(1),
            "file",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "owner_id", "user", "id", Relation::OwnedBy)],
        )
        .unwrap();
        g.add_table(
            TableId(2),
            "fassoc",
            ColId(0),
            "id",
            false,
            &[ann(ColId(1), "file_id", "file", "id", Relation::AccessedBy)],
        )
        .unwrap();

        let chains = g.chains_from("fassoc").unwrap();
        assert!(ShardGraph::is_access_only_chain(&chains[0]));
    }
}
