//! C11: the view bridge (spec.md §4.11).
//!
//! The storage layer emits one record delta per insert/update/delete to
//! every registered view; an update is a negative (old) delta followed by a
//! positive (new) one. This crate only knows the sink contract
//! (`push`/`query`) — it has no opinion on how a view's own query is
//! maintained incrementally, since the spec treats that subsystem as
//! opaque.

use std::collections::HashMap;

use k9db_codec::Value;

/// The result of querying a materialized view: column names plus rows, in
/// whatever order the sink happens to hold them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SqlResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }
}

/// A sink for view record deltas (spec.md §4.11). `push` records a signed
/// occurrence of `record` in `view_name`'s multiset; `query` reads back the
/// view's current contents.
pub trait ViewSink {
    fn push(&mut self, view_name: &str, record: &[Value], positive: bool);
    fn query(&self, view_name: &str) -> SqlResultSet;
}

/// A reference sink that keeps every view's rows as an in-memory multiset
/// (spec.md §4.11). Not meant to scale; `k9db-engine` may swap in a real
/// incremental-view-maintenance sink later without this trait changing.
#[derive(Debug, Default)]
pub struct InMemoryViewSink {
    views: HashMap<String, ViewState>,
}

#[derive(Debug, Default)]
struct ViewState {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl InMemoryViewSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a view's column names before any deltas arrive. Idempotent.
    pub fn declare(&mut self, view_name: &str, columns: Vec<String>) {
        self.views.entry(view_name.to_string()).or_default().columns = columns;
    }
}

impl ViewSink for InMemoryViewSink {
    fn push(&mut self, view_name: &str, record: &[Value], positive: bool) {
        let state = self.views.entry(view_name.to_string()).or_default();
        if positive {
            state.rows.push(record.to_vec());
        } else if let Some(pos) = state.rows.iter().position(|r| r.as_slice() == record) {
            state.rows.remove(pos);
        }
    }

    fn query(&self, view_name: &str) -> SqlResultSet {
        match self.views.get(view_name) {
            Some(state) => SqlResultSet::new(state.columns.clone(), state.rows.clone()),
            None => SqlResultSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positive_delta_adds_a_row() {
        let mut sink = InMemoryViewSink::new();
        sink.declare("active_users", vec!["id".into(), "name".into()]);
        sink.push("active_users", &[Value::Int(1), Value::Text("alice".into())], true);

        let result = sink.query("active_users");
        assert_eq!(result.rows, vec![vec![Value::Int(1), Value::Text("alice".into())]]);
    }

    #[test]
    fn update_is_a_negative_delta_then_a_positive_one() {
        let mut sink = InMemoryViewSink::new();
        sink.declare("active_users", vec!["id".into(), "name".into()]);
        sink.push("active_users", &[Value::Int(1), Value::Text("alice".into())], true);

        sink.push("active_users", &[Value::Int(1), Value::Text("alice".into())], false);
        sink.push("active_users", &[Value::Int(1), Value::Text("alicia".into())], true);

        let result = sink.query("active_users");
        assert_eq!(result.rows, vec![vec![Value::Int(1), Value::Text("alicia".into())]]);
    }

    #[test]
    fn querying_an_undeclared_view_returns_an_empty_result_set() {
        let sink = InMemoryViewSink::new();
        assert_eq!(sink.query("nope"), SqlResultSet::default());
    }
}
