//! SQL statement assembly.
//!
//! Every builder here is a pure function: it takes a table name and
//! column/value mappings and returns a [`Statement`] whose `?` placeholders
//! line up one to one with its arguments. Columns are emitted in the order
//! the caller inserted them.

use crate::conflict::{build_conflict_clause, ConflictAction};
use crate::error::{StoreResult, ValidationError};
use crate::predicate::{build_predicate, Combinator};
use crate::value::{Condition, Row, Value};

/// SQL text with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Number of `?` placeholders. Only meaningful for generated SQL, which
    /// never contains string literals.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    /// The same statement with its SQL passed through [`terminate`].
    pub fn terminated(self) -> StoreResult<Self> {
        Ok(Self {
            sql: terminate(&self.sql)?,
            args: self.args,
        })
    }
}

/// Trim `sql` and make sure it ends with `;`. Applying it twice changes
/// nothing. Blank SQL is rejected.
pub fn terminate(sql: &str) -> StoreResult<String> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(ValidationError::EmptyStatement.into());
    }
    if sql.ends_with(';') {
        Ok(sql.to_string())
    } else {
        Ok(format!("{sql};"))
    }
}

fn table_name(table: &str) -> StoreResult<&str> {
    let table = table.trim();
    if table.is_empty() {
        return Err(ValidationError::EmptyTableName.into());
    }
    Ok(table)
}

fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> StoreResult<String> {
    let columns: Vec<&str> = columns.into_iter().collect();
    if columns.iter().any(|column| column.trim().is_empty()) {
        return Err(ValidationError::EmptyColumnName.into());
    }
    Ok(columns.join(", "))
}

fn output_list(output_columns: &[&str]) -> StoreResult<String> {
    if output_columns.is_empty() {
        return Ok("*".to_string());
    }
    column_list(output_columns.iter().copied())
}

/// `INSERT INTO <table> (...) VALUES (...)`, plus the conflict clause for
/// `action` when one applies.
pub fn build_insert(
    table: &str,
    row: &Row,
    action: ConflictAction,
    conflict_keys: &[&str],
) -> StoreResult<Statement> {
    let table = table_name(table)?;
    if row.is_empty() {
        return Err(ValidationError::EmptyRow.into());
    }

    let columns = column_list(row.columns())?;
    let placeholders = vec!["?"; row.len()].join(", ");
    let mut sql = format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})");

    let conflict = build_conflict_clause(row, action, conflict_keys)?;
    if !conflict.is_empty() {
        sql.push(' ');
        sql.push_str(&conflict);
    }

    Ok(Statement::new(sql, row.values().cloned().collect()))
}

/// `SELECT <columns> FROM <table> WHERE ...`. No output columns selects `*`.
pub fn build_select(
    table: &str,
    condition: &Condition,
    combinator: Combinator,
    output_columns: &[&str],
) -> StoreResult<Statement> {
    let table = table_name(table)?;
    let columns = output_list(output_columns)?;
    let predicate = build_predicate(condition, combinator, None)?;

    Ok(Statement::new(
        format!("SELECT {columns} FROM {table} WHERE {}", predicate.clause),
        predicate.args,
    ))
}

/// `UPDATE <table> SET ... WHERE ...`. WHERE columns are qualified with the
/// table name; SET arguments come before WHERE arguments.
pub fn build_update(
    table: &str,
    set: &Row,
    condition: &Condition,
    combinator: Combinator,
) -> StoreResult<Statement> {
    let table = table_name(table)?;
    if set.is_empty() {
        return Err(ValidationError::EmptyRow.into());
    }

    let mut assignments = Vec::with_capacity(set.len());
    for column in set.columns() {
        if column.trim().is_empty() {
            return Err(ValidationError::EmptyColumnName.into());
        }
        assignments.push(format!("{column} = ?"));
    }

    let predicate = build_predicate(condition, combinator, Some(table))?;
    let mut args: Vec<Value> = set.values().cloned().collect();
    args.extend(predicate.args);

    Ok(Statement::new(
        format!(
            "UPDATE {table} SET {} WHERE {}",
            assignments.join(", "),
            predicate.clause
        ),
        args,
    ))
}

/// Single-column lookup: `SELECT <columns> FROM <table> WHERE <by> = ?`.
pub fn build_find(
    table: &str,
    by: &str,
    value: impl Into<Value>,
    output_columns: &[&str],
) -> StoreResult<Statement> {
    let condition = Condition::new().with_value(by, value);
    build_select(table, &condition, Combinator::And, output_columns)
}

/// `DROP TABLE IF EXISTS "<table>"`.
pub fn build_drop_table(table: &str) -> StoreResult<Statement> {
    let table = table_name(table)?;
    Ok(Statement::new(
        format!("DROP TABLE IF EXISTS {}", quote_identifier(table)),
        Vec::new(),
    ))
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
