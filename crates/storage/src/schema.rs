use k9db_codec::ColumnType;
use k9db_primitives::{ColId, ColList, IndexId, TableId};

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

/// A secondary index, single-column or composite. The PK index is not
/// represented here — it is implicit on every [`TableSchema`] (spec.md §3,
/// "Every table has exactly one primary key... at least one index exists:
/// the implicit PK index").
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub id: IndexId,
    pub columns: ColList,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub pk_column: ColId,
    pub indices: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn pk_type(&self) -> ColumnType {
        self.columns[self.pk_column.0 as usize].ty
    }

    pub fn column_type(&self, col: ColId) -> ColumnType {
        self.columns[col.0 as usize].ty
    }

    pub fn rows_cf(&self) -> String {
        format!("tbl__{}", self.name)
    }

    pub fn pk_index_cf(&self) -> String {
        format!("idx__{}__pk", self.name)
    }

    pub fn index_cf(&self, index: &IndexSchema) -> String {
        format!("idx__{}__{}", self.name, index.id.0)
    }

    /// All column families this table owns, in creation order: rows, PK
    /// index, then each secondary index (spec.md §4.4, "Each table owns one
    /// column family for rows and one per index").
    pub fn column_families(&self) -> Vec<String> {
        let mut cfs = vec![self.rows_cf(), self.pk_index_cf()];
        cfs.extend(self.indices.iter().map(|idx| self.index_cf(idx)));
        cfs
    }

    /// Is `col` a single-column unique index (not counting the PK)?
    pub fn unique_index_over(&self, col: ColId) -> Option<&IndexSchema> {
        self.indices
            .iter()
            .find(|idx| idx.unique && idx.columns.as_slice() == [col])
    }
}
