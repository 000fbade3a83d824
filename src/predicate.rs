//! Shared WHERE clause builder for SELECT and UPDATE.

use crate::error::{StoreResult, ValidationError};
use crate::value::{Condition, Value};

/// How the equality tests of a condition are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn keyword(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

/// A WHERE clause body (without the `WHERE` keyword) and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub args: Vec<Value>,
}

/// Build `c1 = ? AND c2 = ?` (or `OR`) for every column of `condition`, in
/// order. With a `qualifier` each column is written as `qualifier.column`.
///
/// An empty condition is an error, so no caller can end up matching every
/// row of a table by accident.
pub fn build_predicate(
    condition: &Condition,
    combinator: Combinator,
    qualifier: Option<&str>,
) -> StoreResult<Predicate> {
    if condition.is_empty() {
        return Err(ValidationError::EmptyCondition.into());
    }

    let mut terms = Vec::with_capacity(condition.len());
    let mut args = Vec::with_capacity(condition.len());
    for (column, value) in condition.iter() {
        if column.trim().is_empty() {
            return Err(ValidationError::EmptyColumnName.into());
        }
        terms.push(match qualifier {
            Some(table) => format!("{table}.{column} = ?"),
            None => format!("{column} = ?"),
        });
        args.push(value.clone());
    }

    let separator = format!(" {} ", combinator.keyword());
    Ok(Predicate {
        clause: terms.join(&separator),
        args,
    })
}
