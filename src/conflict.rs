//! ON CONFLICT clause generation for inserts.

use crate::error::{StoreError, StoreResult, ValidationError};
use crate::value::Row;

/// What an insert does when it hits an existing uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAction {
    /// No conflict clause; the store reports the violation.
    #[default]
    Plain,
    /// Keep the existing record.
    DoNothing,
    /// Overwrite the non-key columns of the existing record.
    DoUpdate,
}

/// Build the `ON CONFLICT` clause for `row`.
///
/// Returns an empty string for [`ConflictAction::Plain`] or when no conflict
/// keys are given. Every key must be one of the row's columns. A `DoUpdate`
/// whose row consists only of key columns has nothing to set and is emitted
/// as `DO NOTHING`.
pub fn build_conflict_clause(
    row: &Row,
    action: ConflictAction,
    conflict_keys: &[&str],
) -> StoreResult<String> {
    if action == ConflictAction::Plain || conflict_keys.is_empty() {
        return Ok(String::new());
    }

    let mut keys: Vec<&str> = Vec::with_capacity(conflict_keys.len());
    for &key in conflict_keys {
        if key.trim().is_empty() {
            return Err(ValidationError::EmptyColumnName.into());
        }
        if !row.contains(key) {
            return Err(StoreError::conflict_spec(key));
        }
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    let target = format!("ON CONFLICT ({})", keys.join(", "));

    let assignments: Vec<String> = row
        .columns()
        .filter(|column| !keys.contains(column))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();

    match action {
        ConflictAction::DoUpdate if !assignments.is_empty() => Ok(format!(
            "{target} DO UPDATE SET {}",
            assignments.join(", ")
        )),
        _ => Ok(format!("{target} DO NOTHING")),
    }
}
