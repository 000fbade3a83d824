//! Schema declarations and `CREATE TABLE` rendering.

use crate::error::{StoreResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// One `CREATE TABLE IF NOT EXISTS` statement per table, in declared order.
    pub fn create_statements(&self) -> StoreResult<Vec<String>> {
        self.tables.iter().map(TableDefinition::create_sql).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Render `CREATE TABLE IF NOT EXISTS <name> (<columns>)`. Safe to run
    /// against a store that already has the table.
    pub fn create_sql(&self) -> StoreResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyTableName.into());
        }
        if self.columns.is_empty() {
            return Err(ValidationError::NoColumns(name.to_string()).into());
        }

        let columns = self
            .columns
            .iter()
            .map(ColumnDefinition::render)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {name} ({})",
            columns.join(", ")
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn with_default(mut self, default_value: DefaultValue) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn has(&self, constraint: ColumnConstraint) -> bool {
        self.constraints.contains(&constraint)
    }

    // PRIMARY KEY implies NOT NULL/UNIQUE in SQLite, so those are only written
    // for non-key columns. AUTOINCREMENT and DEFAULT are mutually exclusive.
    fn render(&self) -> StoreResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyColumnName.into());
        }

        let mut sql = format!("{name} {}", self.data_type);
        if self.has(ColumnConstraint::PrimaryKey) {
            sql.push_str(" PRIMARY KEY");
        } else {
            if self.has(ColumnConstraint::NotNull) {
                sql.push_str(" NOT NULL");
            }
            if self.has(ColumnConstraint::Unique) {
                sql.push_str(" UNIQUE");
            }
        }

        if self.has(ColumnConstraint::Autoincrement) {
            sql.push_str(" AUTOINCREMENT");
        } else if let Some(default_value) = &self.default_value {
            if matches!(default_value, DefaultValue::Real(f) if !f.is_finite()) {
                return Err(ValidationError::NonFiniteDefault(name.to_string()).into());
            }
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_value.literal());
        }
        Ok(sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Blob,
    Numeric,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
            DataType::Numeric => "NUMERIC",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
    Autoincrement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
    CurrentTimestamp,
    /// Written verbatim, e.g. `(strftime('%s','now'))`.
    Raw(String),
}

impl DefaultValue {
    pub fn literal(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Real(f) => f.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            DefaultValue::Raw(expr) => expr.clone(),
        }
    }
}
