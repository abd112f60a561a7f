use k9db_primitives::{ColId, ShardType, TableId};

/// spec.md §3, "Shard descriptor. Fields: `type`". Reuses
/// [`k9db_primitives::ShardType`] rather than redeclaring the same three
/// variants.
pub type DescriptorKind = ShardType;

/// How a `FOREIGN KEY` was annotated in `CREATE TABLE` (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    OwnedBy,
    AccessedBy,
    Owns,
    Accesses,
}

impl Relation {
    pub fn is_access_only(self) -> bool {
        matches!(self, Relation::AccessedBy | Relation::Accesses)
    }

    pub fn is_inverse(self) -> bool {
        matches!(self, Relation::Owns | Relation::Accesses)
    }
}

/// One declared `FOREIGN KEY ... <relation> target(target_column)` annotation,
/// as read off a `CREATE TABLE` statement before the graph is built.
#[derive(Debug, Clone)]
pub struct FkAnnotation {
    pub column: ColId,
    pub column_name: String,
    pub target_table: String,
    pub target_column_name: String,
    pub relation: Relation,
    pub nullable: bool,
}

/// One edge in the ownership graph (spec.md §3, "Shard descriptor").
#[derive(Debug, Clone)]
pub struct ShardDescriptor {
    pub kind: DescriptorKind,
    /// The data-subject table this path resolves to. `None` for `Variable`
    /// descriptors, whose shard is only known by evaluating the owning
    /// row's own chains at plan-compile/execution time.
    pub shard_kind: Option<String>,
    pub down_column: ColId,
    pub down_column_name: String,
    pub next_table: TableId,
    pub next_table_name: String,
    pub up_column_name: String,
    pub is_varowned: bool,
    pub is_transitive: bool,
    pub access_only: bool,
    /// Whether `down_column` is nullable — used by `IsNullableChain`.
    pub down_column_nullable: bool,
}

/// An ordered list of descriptors from a table to the data subject it is
/// (possibly transitively) owned by (spec.md §3, "Ownership chain").
pub type OwnershipChain = Vec<ShardDescriptor>;

pub fn chain_is_access_only(chain: &OwnershipChain) -> bool {
    chain.iter().any(|d| d.access_only)
}
