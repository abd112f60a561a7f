//! Renders [`StatementResult`] the way a user or test driving the REPL
//! would see it: the literal row format of spec.md §6.3, one table line per
//! GDPR row, a one-line operation count for `FORGET`.

use k9db_engine::StatementResult;

pub fn render(result: &StatementResult) -> String {
    match result {
        StatementResult::Ack => "OK".to_string(),
        StatementResult::Rows(rows) => {
            if rows.rows.is_empty() {
                "(0 rows)".to_string()
            } else {
                rows.rows.iter().map(render_row).collect::<Vec<_>>().join("\n")
            }
        }
        StatementResult::GdprGet(outcome) => {
            if outcome.rows.is_empty() {
                "(0 rows)".to_string()
            } else {
                outcome
                    .rows
                    .iter()
                    .map(|r| format!("{}: {}", r.table, render_row(&r.columns)))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        StatementResult::GdprForget(outcome) => {
            format!("{} operation(s) applied", outcome.operations)
        }
        StatementResult::Text(text) => text.clone(),
    }
}

fn render_row(columns: &[k9db_codec::Value]) -> String {
    let mut out = String::from("|");
    for c in columns {
        out.push_str(&c.to_string());
        out.push('|');
    }
    out
}
