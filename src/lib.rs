//! Dynamic SQL statement building and generic row access for SQLite.
//!
//! # Intention
//!
//! - Turn column/value mappings into parameterized `INSERT`, upsert,
//!   `SELECT` and `UPDATE` statements with `?` placeholders.
//! - Run those statements against an embedded SQLite store and hand back
//!   rows keyed by column name.
//!
//! # Architectural Boundaries
//!
//! - Statement builders are pure and never touch the store.
//! - Only SQLite/database code belongs here. No transactions, pooling,
//!   migrations or retries.

pub mod config;
pub mod conflict;
pub mod driver;
pub mod error;
pub mod predicate;
pub mod schema;
pub mod service;
pub mod statement;
pub mod value;

pub use config::SqliteConfig;
pub use conflict::{build_conflict_clause, ConflictAction};
pub use driver::{Deadline, SqliteDriver, StoreDriver};
pub use error::{StoreError, StoreResult, ValidationError};
pub use predicate::{build_predicate, Combinator, Predicate};
pub use schema::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, Schema, TableDefinition,
};
pub use service::SqliteService;
pub use statement::{build_insert, build_select, build_update, terminate, Statement};
pub use value::{Condition, Row, RowSet, Value};
