//! The AST emitted by [`crate::parser::parse`] (spec.md §6.1).

pub use k9db_codec::{ColumnType, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    Insert(Insert),
    Replace(Insert),
    Update(Update),
    Delete(Delete),
    Select(Select),
    GdprGet { kind: String, id: Expr },
    GdprForget { kind: String, id: Expr },
    ExplainCompliance,
    Pragma(Pragma),
}

/// `OWNED_BY`/`ACCESSED_BY`/`OWNS`/`ACCESSES`/plain `REFERENCES` (spec.md
/// §4.5, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkRelation {
    References,
    OwnedBy,
    AccessedBy,
    Owns,
    Accesses,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyClause {
    pub relation: FkRelation,
    pub target_table: String,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub fk: Option<ForeignKeyClause>,
}

/// The `<col>` position of an `ON GET`/`ON DEL` clause can name a column of
/// this table directly, or reach through an inverse edge as
/// `<related_table>(<related_col>)` (spec.md §6.1).
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    Column(String),
    Related { table: String, column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Anon(Vec<String>),
    DeleteRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleWhen {
    Get,
    Del,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnonRule {
    pub when: RuleWhen,
    pub target: RuleTarget,
    pub action: RuleAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub is_data_subject: bool,
    pub columns: Vec<ColumnDef>,
    pub rules: Vec<AnonRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    /// `None` means the columns are every column of the table, in declared
    /// order (`INSERT INTO t VALUES (...)` with no column list).
    pub columns: Option<Vec<String>>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Placeholder,
    BinaryOp { left: Box<Expr>, op: BinOp, right: Box<Expr> },
    InList { column: String, list: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub table: String,
    pub selection: Option<Expr>,
}

/// Session pragmas of spec.md §6.1, dispatched by `k9db-engine`'s session
/// loop rather than the storage/planner layers.
#[derive(Debug, Clone, PartialEq)]
pub enum Pragma {
    SetEcho(bool),
    SetAutoCtx(bool),
    CtxStart,
    CtxCommit,
    CtxRollback,
    ShowView(String),
    ShowMemory,
    ShowShards,
    ShowPrepared,
    ShowIndices,
}
