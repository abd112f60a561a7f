//! C10: the per-session compliance transaction (spec.md §4.10).
//!
//! A session moves a row into the default shard whenever none of its
//! ownership chains currently resolve (e.g. the owning FK is `NULL`, or the
//! owner itself hasn't been inserted yet). That's allowed mid-transaction,
//! but a row must not still be stranded there when the transaction commits.
//! This crate only tracks the *candidate set* of such rows; actually asking
//! "is this row still in the default shard right now" is left to a
//! [`DefaultShardChecker`] so this crate stays free of `k9db-kv`/storage
//! plumbing, the same seam style as [`k9db_planner::ShardLookup`].

mod error;

use std::collections::HashSet;

use k9db_codec::Value;

pub use error::ComplianceError;

/// Asks whether a row is, right now, still stored under the default shard
/// key rather than a real ownership shard. Implemented by `k9db-engine`
/// against `k9db-storage`'s row index.
pub trait DefaultShardChecker {
    fn still_in_default(&self, table: &str, pk: &Value) -> Result<bool, k9db_storage::StorageError>;
}

/// Tracks rows a session has written to the default shard, so `Commit` can
/// catch the ones still stranded there (spec.md §4.10).
#[derive(Debug, Default)]
pub struct ComplianceTransaction {
    watched: HashSet<(String, Value)>,
}

impl ComplianceTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `(table, pk)` was just written to the default shard.
    pub fn observe_default_write(&mut self, table: &str, pk: Value) {
        self.watched.insert((table.to_string(), pk));
    }

    /// Record that `(table, pk)` has moved out of the default shard (a
    /// later statement in the same session resolved its ownership), so it
    /// no longer needs to be rechecked at commit.
    pub fn observe_left_default(&mut self, table: &str, pk: &Value) {
        self.watched.remove(&(table.to_string(), pk.clone()));
    }

    /// How many rows are still candidates for a compliance violation. Handy
    /// for tests and for a session to short-circuit the rescan.
    pub fn pending_count(&self) -> usize {
        self.watched.len()
    }

    /// Rescan every watched row; fail on the first one still stranded in
    /// the default shard (spec.md §4.10). The caller rolls back the
    /// underlying KV transaction on `Err`.
    pub fn commit(&self, checker: &dyn DefaultShardChecker) -> Result<(), ComplianceError> {
        for (table, pk) in &self.watched {
            if checker.still_in_default(table, pk)? {
                return Err(ComplianceError::Orphaned { table: table.clone(), pk: pk.clone() });
            }
        }
        Ok(())
    }

    /// `Discard`/`Rollback` always succeed (spec.md §4.10): just drop the
    /// watch list along with the transaction.
    pub fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct MockChecker {
        still_orphaned: Vec<(String, Value)>,
    }

    impl DefaultShardChecker for MockChecker {
        fn still_in_default(&self, table: &str, pk: &Value) -> Result<bool, k9db_storage::StorageError> {
            Ok(self.still_orphaned.iter().any(|(t, v)| t == table && v == pk))
        }
    }

    #[test]
    fn commit_succeeds_when_every_watched_row_resolved_a_shard() {
        let mut txn = ComplianceTransaction::new();
        txn.observe_default_write("msg", Value::Int(1));
        txn.observe_left_default("msg", &Value::Int(1));

        let checker = MockChecker { still_orphaned: vec![] };
        assert!(txn.commit(&checker).is_ok());
        assert_eq!(txn.pending_count(), 0);
    }

    #[test]
    fn commit_fails_when_a_row_is_still_stranded_in_the_default_shard() {
        let mut txn = ComplianceTransaction::new();
        txn.observe_default_write("msg", Value::Int(1));

        let checker = MockChecker { still_orphaned: vec![("msg".to_string(), Value::Int(1))] };
        let err = txn.commit(&checker).unwrap_err();
        assert!(matches!(err, ComplianceError::Orphaned { .. }));
    }

    #[test]
    fn a_row_that_left_the_default_shard_is_not_rechecked() {
        let mut txn = ComplianceTransaction::new();
        txn.observe_default_write("msg", Value::Int(1));
        txn.observe_left_default("msg", &Value::Int(1));

        // Even a checker that would report it as still-orphaned is never asked.
        let checker = MockChecker { still_orphaned: vec![("msg".to_string(), Value::Int(1))] };
        assert!(txn.commit(&checker).is_ok());
    }
}
