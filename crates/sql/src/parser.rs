use k9db_codec::{ColumnType, Value};

use crate::ast::*;
use crate::error::ParseError;
use crate::token::{Lexer, Token};

pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let sql = sql.trim().trim_end_matches(';');
    if sql.is_empty() {
        return Err(ParseError::EmptyStatement);
    }
    let tokens = Lexer::new(sql).tokenize()?;
    Parser::new(tokens).parse_statement()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn is_kw(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(word))
    }

    fn eat_kw(&mut self, word: &str) -> bool {
        if self.is_kw(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, word: &'static str) -> Result<(), ParseError> {
        if self.eat_kw(word) {
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn expect_ident(&mut self, what: &'static str) -> Result<String, ParseError> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(self.unexpected_tok(other, what)),
        }
    }

    fn expect_tok(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        match self.bump() {
            Some(t) if t == expected => Ok(()),
            other => Err(self.unexpected_tok(other, what)),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        self.unexpected_tok(self.peek().cloned(), expected)
    }

    fn unexpected_tok(&self, found: Option<Token>, expected: &'static str) -> ParseError {
        match found {
            Some(t) => ParseError::UnexpectedToken { found: format!("{t:?}"), expected },
            None => ParseError::UnexpectedEof(expected),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.eat_kw("CREATE") {
            return self.parse_create();
        }
        if self.eat_kw("INSERT") {
            return self.parse_insert(false);
        }
        if self.eat_kw("REPLACE") {
            return self.parse_insert(true);
        }
        if self.eat_kw("UPDATE") {
            return self.parse_update();
        }
        if self.eat_kw("DELETE") {
            return self.parse_delete();
        }
        if self.eat_kw("SELECT") {
            return self.parse_select();
        }
        if self.eat_kw("GDPR") {
            return self.parse_gdpr();
        }
        if self.eat_kw("EXPLAIN") {
            self.expect_kw("COMPLIANCE")?;
            return Ok(Statement::ExplainCompliance);
        }
        if self.eat_kw("SET") || self.eat_kw("CTX") || self.eat_kw("SHOW") {
            // re-park: step back one so parse_pragma can dispatch uniformly.
            self.pos -= 1;
            return self.parse_pragma();
        }
        Err(self.unexpected("a statement keyword"))
    }

    // ---- CREATE TABLE / CREATE INDEX ----

    fn parse_create(&mut self) -> Result<Statement, ParseError> {
        if self.is_kw("UNIQUE") || self.is_kw("INDEX") {
            return self.parse_create_index();
        }
        let is_data_subject = self.eat_kw("DATA_SUBJECT");
        self.expect_kw("TABLE")?;
        let name = self.expect_ident("table name")?;
        self.expect_tok(Token::LParen, "(")?;

        let mut columns = Vec::new();
        let mut rules = Vec::new();
        loop {
            if self.is_kw("ON") {
                rules.push(self.parse_rule_clause()?);
            } else {
                columns.push(self.parse_column_def()?);
            }
            if !self.eat_tok(&Token::Comma) {
                break;
            }
        }
        self.expect_tok(Token::RParen, ")")?;
        Ok(Statement::CreateTable(CreateTable { name, is_data_subject, columns, rules }))
    }

    fn eat_tok(&mut self, t: &Token) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_ident("column name")?;
        let ty = self.parse_column_type()?;

        let mut nullable = true;
        let mut primary_key = false;
        let mut unique = false;
        let mut fk = None;

        loop {
            if self.eat_kw("NOT") {
                self.expect_kw("NULL")?;
                nullable = false;
            } else if self.eat_kw("PRIMARY") {
                self.expect_kw("KEY")?;
                primary_key = true;
                nullable = false;
            } else if self.eat_kw("UNIQUE") {
                unique = true;
            } else if let Some(relation) = self.try_relation_keyword() {
                let target_table = self.expect_ident("referenced table")?;
                self.expect_tok(Token::LParen, "(")?;
                let target_column = self.expect_ident("referenced column")?;
                self.expect_tok(Token::RParen, ")")?;
                fk = Some(ForeignKeyClause { relation, target_table, target_column });
            } else {
                break;
            }
        }
        Ok(ColumnDef { name, ty, nullable, primary_key, unique, fk })
    }

    fn try_relation_keyword(&mut self) -> Option<FkRelation> {
        for (word, rel) in [
            ("REFERENCES", FkRelation::References),
            ("OWNED_BY", FkRelation::OwnedBy),
            ("ACCESSED_BY", FkRelation::AccessedBy),
            ("OWNS", FkRelation::Owns),
            ("ACCESSES", FkRelation::Accesses),
        ] {
            if self.eat_kw(word) {
                return Some(rel);
            }
        }
        None
    }

    fn parse_column_type(&mut self) -> Result<ColumnType, ParseError> {
        let word = self.expect_ident("a column type")?;
        match word.to_ascii_uppercase().as_str() {
            "INT" => Ok(ColumnType::Int),
            "UINT" => Ok(ColumnType::UInt),
            "TEXT" | "VARCHAR" | "STRING" => Ok(ColumnType::Text),
            "DATETIME" => Ok(ColumnType::DateTime),
            _ => Err(ParseError::UnknownRelation(word)),
        }
    }

    /// `ON GET <col> ANON(c1,…) | DELETE_ROW` / `ON DEL <col> ...`, with
    /// `<col>` optionally `<related_table>(<related_col>)` (spec.md §6.1).
    fn parse_rule_clause(&mut self) -> Result<AnonRule, ParseError> {
        self.expect_kw("ON")?;
        let when = if self.eat_kw("GET") {
            RuleWhen::Get
        } else if self.eat_kw("DEL") {
            RuleWhen::Del
        } else {
            return Err(self.unexpected("GET or DEL"));
        };

        let first = self.expect_ident("rule target")?;
        let target = if self.eat_tok(&Token::LParen) {
            let column = self.expect_ident("related column")?;
            self.expect_tok(Token::RParen, ")")?;
            RuleTarget::Related { table: first, column }
        } else {
            RuleTarget::Column(first)
        };

        let action = if self.eat_kw("DELETE_ROW") {
            RuleAction::DeleteRow
        } else if self.eat_kw("ANON") {
            self.expect_tok(Token::LParen, "(")?;
            let mut cols = Vec::new();
            loop {
                cols.push(self.expect_ident("anonymized column")?);
                if !self.eat_tok(&Token::Comma) {
                    break;
                }
            }
            self.expect_tok(Token::RParen, ")")?;
            RuleAction::Anon(cols)
        } else {
            return Err(self.unexpected("ANON(...) or DELETE_ROW"));
        };

        Ok(AnonRule { when, target, action })
    }

    fn parse_create_index(&mut self) -> Result<Statement, ParseError> {
        let unique = self.eat_kw("UNIQUE");
        self.expect_kw("INDEX")?;
        let name = self.expect_ident("index name")?;
        self.expect_kw("ON")?;
        let table = self.expect_ident("table name")?;
        self.expect_tok(Token::LParen, "(")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expect_ident("indexed column")?);
            if !self.eat_tok(&Token::Comma) {
                break;
            }
        }
        self.expect_tok(Token::RParen, ")")?;
        Ok(Statement::CreateIndex(CreateIndex { name, table, columns, unique }))
    }

    // ---- INSERT / REPLACE ----

    fn parse_insert(&mut self, is_replace: bool) -> Result<Statement, ParseError> {
        self.expect_kw("INTO")?;
        let table = self.expect_ident("table name")?;

        let columns = if self.eat_tok(&Token::LParen) {
            let mut cols = Vec::new();
            loop {
                cols.push(self.expect_ident("column name")?);
                if !self.eat_tok(&Token::Comma) {
                    break;
                }
            }
            self.expect_tok(Token::RParen, ")")?;
            Some(cols)
        } else {
            None
        };

        self.expect_kw("VALUES")?;
        self.expect_tok(Token::LParen, "(")?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_scalar_expr()?);
            if !self.eat_tok(&Token::Comma) {
                break;
            }
        }
        self.expect_tok(Token::RParen, ")")?;

        let insert = Insert { table, columns, values };
        Ok(if is_replace { Statement::Replace(insert) } else { Statement::Insert(insert) })
    }

    fn parse_scalar_expr(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(Token::Placeholder) => Ok(Expr::Placeholder),
            Some(Token::StringLit(s)) => Ok(Expr::Literal(Value::Text(s))),
            Some(Token::IntLit(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => Ok(Expr::Literal(Value::Null)),
            other => Err(self.unexpected_tok(other, "a literal or ?")),
        }
    }

    // ---- UPDATE ----

    fn parse_update(&mut self) -> Result<Statement, ParseError> {
        let table = self.expect_ident("table name")?;
        self.expect_kw("SET")?;
        let mut assignments = Vec::new();
        loop {
            let col = self.expect_ident("assigned column")?;
            self.expect_tok(Token::Eq, "=")?;
            let value = self.parse_scalar_expr()?;
            assignments.push((col, value));
            if !self.eat_tok(&Token::Comma) {
                break;
            }
        }
        let selection = self.parse_opt_where()?;
        Ok(Statement::Update(Update { table, assignments, selection }))
    }

    // ---- DELETE ----

    fn parse_delete(&mut self) -> Result<Statement, ParseError> {
        self.expect_kw("FROM")?;
        let table = self.expect_ident("table name")?;
        let selection = self.parse_opt_where()?;
        Ok(Statement::Delete(Delete { table, selection }))
    }

    // ---- SELECT ----

    fn parse_select(&mut self) -> Result<Statement, ParseError> {
        let projection = if self.eat_tok(&Token::Star) {
            Projection::Star
        } else {
            let mut cols = Vec::new();
            loop {
                cols.push(self.expect_ident("projected column")?);
                if !self.eat_tok(&Token::Comma) {
                    break;
                }
            }
            Projection::Columns(cols)
        };
        self.expect_kw("FROM")?;
        let table = self.expect_ident("table name")?;
        let selection = self.parse_opt_where()?;
        Ok(Statement::Select(Select { projection, table, selection }))
    }

    fn parse_opt_where(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.eat_kw("WHERE") {
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    // ---- WHERE expression grammar: or_expr := and_expr (OR and_expr)* ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.eat_kw("OR") {
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.eat_kw("AND") {
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let column = self.expect_ident("a column name")?;
        if self.eat_kw("IN") {
            self.expect_tok(Token::LParen, "(")?;
            let mut list = Vec::new();
            loop {
                list.push(self.parse_scalar_expr()?);
                if !self.eat_tok(&Token::Comma) {
                    break;
                }
            }
            self.expect_tok(Token::RParen, ")")?;
            return Ok(Expr::InList { column, list });
        }

        let op = match self.bump() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::NotEq,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::LtEq) => BinOp::LtEq,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::GtEq) => BinOp::GtEq,
            other => return Err(self.unexpected_tok(other, "a comparison operator")),
        };
        let right = self.parse_scalar_expr()?;
        Ok(Expr::BinaryOp { left: Box::new(Expr::Column(column)), op, right: Box::new(right) })
    }

    // ---- GDPR GET/FORGET ----

    fn parse_gdpr(&mut self) -> Result<Statement, ParseError> {
        let forget = if self.eat_kw("FORGET") {
            true
        } else {
            self.expect_kw("GET")?;
            false
        };
        let kind = self.expect_ident("data subject kind")?;
        let id = self.parse_scalar_expr()?;
        Ok(if forget { Statement::GdprForget { kind, id } } else { Statement::GdprGet { kind, id } })
    }

    // ---- session pragmas ----

    fn parse_pragma(&mut self) -> Result<Statement, ParseError> {
        if self.eat_kw("SET") {
            if self.eat_kw("echo") {
                return Ok(Statement::Pragma(Pragma::SetEcho(self.parse_on_off()?)));
            }
            if self.eat_kw("AUTO_CTX") {
                return Ok(Statement::Pragma(Pragma::SetAutoCtx(self.parse_on_off()?)));
            }
            return Err(self.unexpected("echo or AUTO_CTX"));
        }
        if self.eat_kw("CTX") {
            if self.eat_kw("START") {
                return Ok(Statement::Pragma(Pragma::CtxStart));
            }
            if self.eat_kw("COMMIT") {
                return Ok(Statement::Pragma(Pragma::CtxCommit));
            }
            if self.eat_kw("ROLLBACK") {
                return Ok(Statement::Pragma(Pragma::CtxRollback));
            }
            return Err(self.unexpected("START, COMMIT or ROLLBACK"));
        }
        if self.eat_kw("SHOW") {
            if self.eat_kw("VIEW") {
                let name = self.expect_ident("view name")?;
                return Ok(Statement::Pragma(Pragma::ShowView(name)));
            }
            if self.eat_kw("MEMORY") {
                return Ok(Statement::Pragma(Pragma::ShowMemory));
            }
            if self.eat_kw("SHARDS") {
                return Ok(Statement::Pragma(Pragma::ShowShards));
            }
            if self.eat_kw("PREPARED") {
                return Ok(Statement::Pragma(Pragma::ShowPrepared));
            }
            if self.eat_kw("INDICES") {
                return Ok(Statement::Pragma(Pragma::ShowIndices));
            }
            return Err(self.unexpected("VIEW, MEMORY, SHARDS, PREPARED or INDICES"));
        }
        Err(self.unexpected("a session pragma"))
    }

    fn parse_on_off(&mut self) -> Result<bool, ParseError> {
        if self.eat_kw("ON") || self.eat_kw("TRUE") {
            Ok(true)
        } else if self.eat_kw("OFF") || self.eat_kw("FALSE") {
            Ok(false)
        } else {
            Err(self.unexpected("ON or OFF"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_data_subject_table() {
        let stmt = parse("CREATE DATA_SUBJECT TABLE user (id INT PRIMARY KEY, name TEXT)").unwrap();
        match stmt {
            Statement::CreateTable(t) => {
                assert!(t.is_data_subject);
                assert_eq!(t.name, "user");
                assert_eq!(t.columns.len(), 2);
                assert!(t.columns[0].primary_key);
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_owned_by_and_table_level_rules() {
        let stmt = parse(
            "CREATE TABLE msg (id INT PRIMARY KEY, sender INT OWNED_BY user(id), \
             receiver INT OWNED_BY user(id), ON DEL receiver ANON(receiver))",
        )
        .unwrap();
        match stmt {
            Statement::CreateTable(t) => {
                assert_eq!(t.columns[1].fk.as_ref().unwrap().relation, FkRelation::OwnedBy);
                assert_eq!(t.rules.len(), 1);
                assert_eq!(t.rules[0].when, RuleWhen::Del);
                assert_eq!(t.rules[0].action, RuleAction::Anon(vec!["receiver".into()]));
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_insert_with_placeholders() {
        let stmt = parse("INSERT INTO msg VALUES (?, 0, 10)").unwrap();
        match stmt {
            Statement::Insert(i) => {
                assert_eq!(i.table, "msg");
                assert_eq!(i.values, vec![Expr::Placeholder, Expr::Literal(Value::Int(0)), Expr::Literal(Value::Int(10))]);
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn parses_where_with_and_or_and_in() {
        let stmt = parse("SELECT * FROM msg WHERE sender = 0 OR receiver IN (1, 2, 3)").unwrap();
        match stmt {
            Statement::Select(s) => {
                assert_eq!(s.projection, Projection::Star);
                assert!(matches!(s.selection, Some(Expr::BinaryOp { op: BinOp::Or, .. })));
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn parses_gdpr_forget() {
        let stmt = parse("GDPR FORGET user 0").unwrap();
        assert_eq!(stmt, Statement::GdprForget { kind: "user".into(), id: Expr::Literal(Value::Int(0)) });
    }

    #[test]
    fn parses_session_pragmas() {
        assert_eq!(parse("SET echo ON").unwrap(), Statement::Pragma(Pragma::SetEcho(true)));
        assert_eq!(parse("CTX START").unwrap(), Statement::Pragma(Pragma::CtxStart));
        assert_eq!(parse("SHOW SHARDS").unwrap(), Statement::Pragma(Pragma::ShowShards));
    }

    #[test]
    fn parses_create_index() {
        let stmt = parse("CREATE UNIQUE INDEX idx_name ON user (name)").unwrap();
        match stmt {
            Statement::CreateIndex(i) => {
                assert!(i.unique);
                assert_eq!(i.columns, vec!["name".to_string()]);
            }
            other => panic!("expected CreateIndex, got {other:?}"),
        }
    }
}
