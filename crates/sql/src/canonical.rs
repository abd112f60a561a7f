//! C9: the prepared-statement canonicalizer (spec.md §4.9).
//!
//! Operates on raw SQL text, not the AST — the statements `NeedsFlow` routes
//! to the view subsystem (joins, aggregates, nested selects) are exactly the
//! ones this crate's hand-rolled parser does not build an AST for, so
//! canonicalization has to work at the token level.

use crate::error::ParseError;
use crate::token::{Lexer, Token};

#[derive(Debug, Clone, PartialEq)]
pub struct Canonical {
    pub text: String,
    /// One entry per `?` surviving in `text`, in left-to-right order; the
    /// value is 1 for a scalar placeholder, N for a collapsed `IN (?,…,?)`.
    pub arg_value_counts: Vec<usize>,
}

/// Collapse `col IN (?, ?, …)` runs to `col = ?`, normalize whitespace, strip
/// a trailing `;`. Case of identifiers and string literals is preserved.
pub fn canonicalize(raw: &str) -> Result<Canonical, ParseError> {
    let trimmed = raw.trim().trim_end_matches(';').trim();
    let tokens = Lexer::new(trimmed).tokenize()?;

    let mut out = Vec::with_capacity(tokens.len());
    let mut arg_value_counts = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if is_ident(&tokens, i, "IN") && tokens.get(i + 1) == Some(&Token::LParen) {
            if let Some((count, rparen_idx)) = try_collapse_in_list(&tokens, i + 2) {
                out.push(Token::Eq);
                out.push(Token::Placeholder);
                arg_value_counts.push(count);
                i = rparen_idx + 1;
                continue;
            }
        }
        if tokens[i] == Token::Placeholder {
            arg_value_counts.push(1);
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    Ok(Canonical { text: render(&out), arg_value_counts })
}

fn is_ident(tokens: &[Token], i: usize, word: &str) -> bool {
    matches!(tokens.get(i), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(word))
}

/// `tokens[start..]` looks like `?, ?, …, ? )`; returns `(count, index_of_rparen)`.
fn try_collapse_in_list(tokens: &[Token], mut i: usize) -> Option<(usize, usize)> {
    let mut count = 0;
    loop {
        match tokens.get(i)? {
            Token::Placeholder => {
                count += 1;
                i += 1;
            }
            _ => return None,
        }
        match tokens.get(i)? {
            Token::Comma => i += 1,
            Token::RParen => return (count > 0).then_some((count, i)),
            _ => return None,
        }
    }
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (idx, tok) in tokens.iter().enumerate() {
        if idx > 0 {
            let tight_before = matches!(tok, Token::Comma | Token::RParen | Token::Dot | Token::Semicolon);
            let tight_after_prev = matches!(tokens[idx - 1], Token::LParen | Token::Dot);
            if !tight_before && !tight_after_prev {
                out.push(' ');
            }
        }
        out.push_str(&render_one(tok));
    }
    out
}

fn render_one(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => s.clone(),
        Token::StringLit(s) => format!("'{}'", s.replace('\'', "''")),
        Token::IntLit(i) => i.to_string(),
        Token::Placeholder => "?".to_string(),
        Token::Comma => ",".to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Semicolon => ";".to_string(),
        Token::Star => "*".to_string(),
        Token::Dot => ".".to_string(),
        Token::Eq => "=".to_string(),
        Token::NotEq => "!=".to_string(),
        Token::Lt => "<".to_string(),
        Token::LtEq => "<=".to_string(),
        Token::Gt => ">".to_string(),
        Token::GtEq => ">=".to_string(),
    }
}

/// True iff `canonical` needs the view subsystem rather than direct storage
/// access (spec.md §4.9): joins, grouping/ordering, aggregates, nested
/// selects, arithmetic in the projection, or inequality comparisons (the
/// storage layer's index selection only serves equality constraints, §4.4).
pub fn needs_flow(canonical: &str) -> bool {
    let upper = canonical.to_ascii_uppercase();
    const KEYWORD_MARKERS: [&str; 8] =
        ["JOIN", "GROUP BY", "ORDER BY", "SUM(", "COUNT(", "AVG(", "MIN(", "MAX("];
    if KEYWORD_MARKERS.iter().any(|m| upper.contains(m)) {
        return true;
    }
    if upper.contains('<') || upper.contains('>') {
        return true;
    }
    if upper.matches("SELECT").count() > 1 {
        return true;
    }
    if has_arithmetic_in_projection(&upper) {
        return true;
    }
    false
}

fn has_arithmetic_in_projection(upper: &str) -> bool {
    let Some(from_idx) = upper.find(" FROM ") else { return false };
    let projection = &upper[..from_idx];
    projection.contains(" + ") || projection.contains(" - ") || projection.contains(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collapses_an_in_list_of_placeholders() {
        let c = canonicalize("SELECT * FROM msg WHERE sender IN (?, ?, ?)").unwrap();
        assert_eq!(c.text, "SELECT * FROM msg WHERE sender = ?");
        assert_eq!(c.arg_value_counts, vec![3]);
    }

    #[test]
    fn preserves_case_and_strips_trailing_semicolon_and_normalizes_whitespace() {
        let c = canonicalize("select  *  from Msg where Sender = ?  ;").unwrap();
        assert_eq!(c.text, "select * from Msg where Sender = ?");
        assert_eq!(c.arg_value_counts, vec![1]);
    }

    #[test]
    fn leaves_a_literal_in_list_uncollapsed() {
        let c = canonicalize("SELECT * FROM msg WHERE sender IN (1, 2, 3)").unwrap();
        assert_eq!(c.text, "SELECT * FROM msg WHERE sender IN (1, 2, 3)");
        assert!(c.arg_value_counts.is_empty());
    }

    #[test]
    fn needs_flow_detects_join_and_aggregates_and_inequalities() {
        assert!(needs_flow("SELECT * FROM a JOIN b ON a.id = b.id"));
        assert!(needs_flow("SELECT COUNT(*) FROM msg"));
        assert!(needs_flow("SELECT * FROM msg WHERE id > 5"));
        assert!(!needs_flow("SELECT * FROM msg WHERE id = 5"));
    }

    #[test]
    fn needs_flow_ignores_a_plain_equality_select() {
        assert!(!needs_flow("SELECT name FROM user WHERE id = ?"));
    }
}
