//! Evaluates the small expression language of `k9db-sql`'s AST against a
//! row and a prepared statement's bound arguments.

use k9db_codec::Value;
use k9db_sql::{BinOp, Expr};
use k9db_storage::TableSchema;

use crate::error::SqlError;

pub(crate) fn column_index(schema: &TableSchema, name: &str) -> Result<usize, SqlError> {
    schema
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| SqlError::UnknownColumn(name.to_string(), schema.name.clone()))
}

/// Consumes one bound argument per `Placeholder` encountered, in the order
/// the statement's `?`s were written (matches C9's `arg_value_counts`
/// left-to-right convention).
pub(crate) fn eval_scalar(
    expr: &Expr,
    schema: &TableSchema,
    row: Option<&[Value]>,
    args: &[Value],
    arg_idx: &mut usize,
) -> Result<Value, SqlError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => {
            let row = row.ok_or_else(|| SqlError::Invalid("column reference outside a row context".into()))?;
            Ok(row[column_index(schema, name)?].clone())
        }
        Expr::Placeholder => {
            let v = args.get(*arg_idx).cloned().ok_or(SqlError::ArgCountMismatch)?;
            *arg_idx += 1;
            Ok(v)
        }
        Expr::BinaryOp { .. } | Expr::InList { .. } => {
            Err(SqlError::Invalid("expected a scalar expression, found a predicate".into()))
        }
    }
}

fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, SqlError> {
    use std::cmp::Ordering;
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::UInt(a), Value::UInt(b)) => Ok(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        _ => Err(SqlError::Invalid(format!("cannot compare {l:?} and {r:?}"))),
    }
}

/// Evaluate a `WHERE`/selection predicate over one row.
pub(crate) fn eval_bool(
    expr: &Expr,
    schema: &TableSchema,
    row: &[Value],
    args: &[Value],
    arg_idx: &mut usize,
) -> Result<bool, SqlError> {
    match expr {
        Expr::BinaryOp { left, op: BinOp::And, right } => {
            Ok(eval_bool(left, schema, row, args, arg_idx)? && eval_bool(right, schema, row, args, arg_idx)?)
        }
        Expr::BinaryOp { left, op: BinOp::Or, right } => {
            Ok(eval_bool(left, schema, row, args, arg_idx)? || eval_bool(right, schema, row, args, arg_idx)?)
        }
        Expr::BinaryOp { left, op, right } => {
            let l = eval_scalar(left, schema, Some(row), args, arg_idx)?;
            let r = eval_scalar(right, schema, Some(row), args, arg_idx)?;
            Ok(match op {
                BinOp::Eq => l == r,
                BinOp::NotEq => l != r,
                BinOp::Lt => compare(&l, &r)? == std::cmp::Ordering::Less,
                BinOp::LtEq => compare(&l, &r)? != std::cmp::Ordering::Greater,
                BinOp::Gt => compare(&l, &r)? == std::cmp::Ordering::Greater,
                BinOp::GtEq => compare(&l, &r)? != std::cmp::Ordering::Less,
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            })
        }
        Expr::InList { column, list } => {
            let idx = column_index(schema, column)?;
            let value = &row[idx];
            for item in list {
                if &eval_scalar(item, schema, Some(row), args, arg_idx)? == value {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Column(_) | Expr::Literal(_) | Expr::Placeholder => {
            Err(SqlError::Invalid("expected a predicate, found a scalar expression".into()))
        }
    }
}

/// Reads off the top-level `AND`-chain of `expr` every `column = <scalar>`
/// equality, for the planner's `equalities` parameter (spec.md §4.6). Stops
/// descending into `OR` subtrees, since those can't be turned into an
/// equality constraint for every row the query matches.
pub(crate) fn collect_equalities(
    expr: &Expr,
    schema: &TableSchema,
    args: &[Value],
    arg_idx: &mut usize,
    out: &mut Vec<(k9db_primitives::ColId, Value)>,
) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op: BinOp::And, right } => {
            collect_equalities(left, schema, args, arg_idx, out)?;
            collect_equalities(right, schema, args, arg_idx, out)
        }
        Expr::BinaryOp { left, op: BinOp::Eq, right } => {
            if let Expr::Column(name) = left.as_ref() {
                let col = k9db_primitives::ColId(column_index(schema, name)? as u32);
                let value = eval_scalar(right, schema, None, args, arg_idx)?;
                out.push((col, value));
            } else {
                // Not `column = scalar`; still advance past any placeholders
                // on either side so later equalities see the right args.
                let _ = eval_scalar(left, schema, None, args, arg_idx);
                let _ = eval_scalar(right, schema, None, args, arg_idx);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
