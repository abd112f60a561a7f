use std::collections::HashMap;

use k9db_sql::AnonRule;

/// The `ON GET`/`ON DEL` rules declared on every table (spec.md §4.7,
/// "Anonymization rules"), keyed by table name. Populated by `k9db-engine`
/// from each `CREATE TABLE`'s [`k9db_sql::CreateTable::rules`].
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    by_table: HashMap<String, Vec<AnonRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: &str, rules: Vec<AnonRule>) {
        self.by_table.insert(table.to_string(), rules);
    }

    pub fn rules_for(&self, table: &str) -> &[AnonRule] {
        self.by_table.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}
