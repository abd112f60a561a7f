//! Translates `k9db-sql`'s DDL AST into the schema types `k9db-storage`/
//! `k9db-schema` work with. Kept separate from [`crate::database`] so it can
//! run identically for a live `CREATE TABLE`/`CREATE INDEX` and for catalog
//! replay on `Initialize`.

use k9db_primitives::{ColId, IndexId, TableId};
use k9db_schema::{FkAnnotation, Relation};
use k9db_sql::{AnonRule, ColumnDef, CreateIndex, CreateTable, FkRelation};
use k9db_storage::{ColumnSchema, IndexSchema, TableSchema};

use crate::error::SqlError;

/// Everything `CREATE TABLE` produces, before it's registered with a
/// `Database`: the row schema (sans secondary indices — those get their own
/// `IndexId`s from the database's counter), the ownership annotations for
/// [`k9db_schema::ShardGraph::add_table`], and the table's `ON GET`/`ON DEL`
/// rules.
pub struct TableBlueprint {
    pub schema: TableSchema,
    pub annotations: Vec<FkAnnotation>,
    pub is_data_subject: bool,
    pub rules: Vec<AnonRule>,
    /// Columns declared `UNIQUE` (not the PK) — each needs its own
    /// single-column unique [`IndexSchema`], assigned an `IndexId` by the
    /// caller.
    pub unique_columns: Vec<(ColId, String)>,
}

fn relation_of(fk: FkRelation) -> Option<Relation> {
    match fk {
        FkRelation::References => None,
        FkRelation::OwnedBy => Some(Relation::OwnedBy),
        FkRelation::AccessedBy => Some(Relation::AccessedBy),
        FkRelation::Owns => Some(Relation::Owns),
        FkRelation::Accesses => Some(Relation::Accesses),
    }
}

pub fn build_table_blueprint(ct: &CreateTable, table_id: TableId) -> Result<TableBlueprint, SqlError> {
    let mut columns = Vec::with_capacity(ct.columns.len());
    let mut pk_column = None;
    let mut annotations = Vec::new();
    let mut unique_columns = Vec::new();

    for (i, col) in ct.columns.iter().enumerate() {
        let ColumnDef { name, ty, nullable, primary_key, unique, fk } = col;
        let col_id = ColId(i as u32);
        if *primary_key {
            if pk_column.is_some() {
                return Err(SqlError::Invalid(format!("table {:?} declares more than one PRIMARY KEY", ct.name)));
            }
            pk_column = Some(col_id);
        } else if *unique {
            unique_columns.push((col_id, name.clone()));
        }

        if let Some(fk) = fk {
            if let Some(relation) = relation_of(fk.relation) {
                annotations.push(FkAnnotation {
                    column: col_id,
                    column_name: name.clone(),
                    target_table: fk.target_table.clone(),
                    target_column_name: fk.target_column.clone(),
                    relation,
                    nullable: *nullable,
                });
            }
        }

        columns.push(ColumnSchema { name: name.clone(), ty: *ty, nullable: *nullable });
    }

    let pk_column = pk_column.ok_or_else(|| SqlError::Invalid(format!("table {:?} declares no PRIMARY KEY", ct.name)))?;

    let schema = TableSchema { id: table_id, name: ct.name.clone(), columns, pk_column, indices: Vec::new() };
    Ok(TableBlueprint {
        schema,
        annotations,
        is_data_subject: ct.is_data_subject,
        rules: ct.rules.clone(),
        unique_columns,
    })
}

pub fn build_index_schema(ci: &CreateIndex, schema: &TableSchema, index_id: IndexId) -> Result<IndexSchema, SqlError> {
    let columns = ci
        .columns
        .iter()
        .map(|name| {
            schema
                .columns
                .iter()
                .position(|c| &c.name == name)
                .map(|i| ColId(i as u32))
                .ok_or_else(|| SqlError::UnknownColumn(name.clone(), schema.name.clone()))
        })
        .collect::<Result<_, _>>()?;
    Ok(IndexSchema { id: index_id, columns, unique: ci.unique })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9db_codec::ColumnType;
    use k9db_sql::{ForeignKeyClause, RuleAction, RuleTarget, RuleWhen};
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_a_schema_and_ownership_annotation_from_a_foreign_key_column() {
        let ct = CreateTable {
            name: "msg".into(),
            is_data_subject: false,
            columns: vec![
                ColumnDef { name: "id".into(), ty: ColumnType::Int, nullable: false, primary_key: true, unique: false, fk: None },
                ColumnDef {
                    name: "sender".into(),
                    ty: ColumnType::Int,
                    nullable: false,
                    primary_key: false,
                    unique: false,
                    fk: Some(ForeignKeyClause {
                        relation: FkRelation::OwnedBy,
                        target_table: "user".into(),
                        target_column: "id".into(),
                    }),
                },
            ],
            rules: vec![AnonRule { when: RuleWhen::Del, target: RuleTarget::Column("sender".into()), action: RuleAction::DeleteRow }],
        };

        let bp = build_table_blueprint(&ct, TableId(1)).unwrap();
        assert_eq!(bp.schema.pk_column, ColId(0));
        assert_eq!(bp.annotations.len(), 1);
        assert_eq!(bp.annotations[0].relation, Relation::OwnedBy);
        assert_eq!(bp.rules.len(), 1);
    }

    #[test]
    fn a_table_with_no_primary_key_is_rejected() {
        let ct = CreateTable {
            name: "bad".into(),
            is_data_subject: false,
            columns: vec![ColumnDef { name: "a".into(), ty: ColumnType::Int, nullable: false, primary_key: false, unique: false, fk: None }],
            rules: vec![],
        };
        assert!(build_table_blueprint(&ct, TableId(0)).is_err());
    }
}
