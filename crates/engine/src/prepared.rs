//! C9: the prepared-statement cache (spec.md §4.9). Keyed by the
//! canonicalized SQL text, so two statements differing only in their bound
//! literal values land on the same cache entry.

use std::collections::HashMap;

use k9db_sql::{canonicalize, needs_flow, parse, ParseError, Statement};

#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub canonical_text: String,
    pub statement: Statement,
    /// One entry per surviving placeholder, left-to-right; N > 1 marks a
    /// collapsed `IN (?, …)` run (spec.md §4.9).
    pub arg_value_counts: Vec<usize>,
    pub needs_flow: bool,
}

#[derive(Debug, Default)]
pub struct PreparedStatementCache {
    by_text: HashMap<String, PreparedStatement>,
}

impl PreparedStatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare(&mut self, raw: &str) -> Result<&PreparedStatement, ParseError> {
        let canonical = canonicalize(raw)?;
        if !self.by_text.contains_key(&canonical.text) {
            let statement = parse(&canonical.text)?;
            let flow = needs_flow(&canonical.text);
            self.by_text.insert(
                canonical.text.clone(),
                PreparedStatement {
                    canonical_text: canonical.text.clone(),
                    statement,
                    arg_value_counts: canonical.arg_value_counts,
                    needs_flow: flow,
                },
            );
        }
        Ok(self.by_text.get(&canonical.text).expect("just inserted"))
    }

    pub fn texts(&self) -> Vec<&str> {
        self.by_text.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preparing_the_same_canonical_text_twice_reuses_one_entry() {
        let mut cache = PreparedStatementCache::new();
        cache.prepare("SELECT * FROM msg WHERE sender = ?").unwrap();
        cache.prepare("select * from msg where sender = ?").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn an_in_list_is_collapsed_before_caching() {
        let mut cache = PreparedStatementCache::new();
        let p = cache.prepare("SELECT * FROM msg WHERE sender IN (?, ?)").unwrap();
        assert_eq!(p.arg_value_counts, vec![2]);
        assert_eq!(cache.len(), 1);
    }
}
