//! Row-level operations over a [`StoreDriver`].

use crate::config::{SqliteConfig, DEFAULT_QUERY_TIMEOUT, OPEN_TIMEOUT};
use crate::conflict::ConflictAction;
use crate::driver::{Deadline, SqliteDriver, StoreDriver};
use crate::error::StoreResult;
use crate::predicate::Combinator;
use crate::schema::Schema;
use crate::statement::{
    build_drop_table, build_find, build_insert, build_select, build_update, Statement,
};
use crate::value::{Condition, Row, RowSet, Value};
use std::time::Duration;
use tracing::info;

/// Builds statements from rows and conditions and runs them on a driver.
///
/// Every call gets its own [`Deadline`] from the configured timeout. Errors
/// come back wrapped in [`StoreError::Operation`](crate::StoreError::Operation)
/// with the operation name and table; nothing is retried.
pub struct SqliteService<D = SqliteDriver> {
    driver: D,
    timeout: Duration,
}

impl SqliteService<SqliteDriver> {
    /// Open the database file named by `config`, creating its directory,
    /// check that it answers, and apply the configured schema.
    pub async fn start(config: SqliteConfig) -> StoreResult<Self> {
        let open = || -> StoreResult<SqliteDriver> {
            if let Some(dir) = config.db_path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
            SqliteDriver::open(&config.db_path)
        };
        let driver = open().map_err(|err| err.during("open", None))?;
        driver
            .ping(Deadline::after(OPEN_TIMEOUT))
            .await
            .map_err(|err| err.during("ping", None))?;

        let service = Self::with_driver(driver).with_timeout(config.timeout);
        service.initialize_schema(&config.schema).await?;
        info!(path = %config.db_path.display(), "sqlite service started");
        Ok(service)
    }
}

impl<D: StoreDriver> SqliteService<D> {
    pub fn with_driver(driver: D) -> Self {
        Self {
            driver,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Budget for each subsequent call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    async fn run_exec(
        &self,
        operation: &'static str,
        table: Option<&str>,
        statement: StoreResult<Statement>,
    ) -> StoreResult<usize> {
        let result = match statement.and_then(Statement::terminated) {
            Ok(statement) => self.driver.exec(statement, self.deadline()).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| err.during(operation, table))
    }

    async fn run_query(
        &self,
        operation: &'static str,
        table: Option<&str>,
        statement: StoreResult<Statement>,
    ) -> StoreResult<RowSet> {
        let result = match statement.and_then(Statement::terminated) {
            Ok(statement) => self.driver.query(statement, self.deadline()).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| err.during(operation, table))
    }

    /// Create every table of `schema` that does not exist yet.
    pub async fn initialize_schema(&self, schema: &Schema) -> StoreResult<()> {
        for table in &schema.tables {
            let statement = table
                .create_sql()
                .map(|sql| Statement::new(sql, Vec::new()));
            self.run_exec("initialize_schema", Some(table.name.as_str()), statement)
                .await?;
            info!(table = %table.name, "table initialized");
        }
        Ok(())
    }

    /// Plain insert; a uniqueness violation is a driver error.
    pub async fn insert(&self, table: &str, row: &Row) -> StoreResult<usize> {
        let statement = build_insert(table, row, ConflictAction::Plain, &[]);
        self.run_exec("insert", Some(table), statement).await
    }

    /// Insert unless a record with the same `conflict_keys` exists. Returns 0
    /// when the row was skipped. No keys means a plain insert.
    pub async fn insert_if_not_exists(
        &self,
        table: &str,
        row: &Row,
        conflict_keys: &[&str],
    ) -> StoreResult<usize> {
        let statement = build_insert(table, row, ConflictAction::DoNothing, conflict_keys);
        self.run_exec("insert_if_not_exists", Some(table), statement)
            .await
    }

    /// Insert, or overwrite the non-key columns of the record matching
    /// `conflict_keys`. No keys means a plain insert.
    pub async fn insert_or_update(
        &self,
        table: &str,
        row: &Row,
        conflict_keys: &[&str],
    ) -> StoreResult<usize> {
        let statement = build_insert(table, row, ConflictAction::DoUpdate, conflict_keys);
        self.run_exec("insert_or_update", Some(table), statement)
            .await
    }

    /// Rows matching every column of `condition`.
    pub async fn select_by_all(
        &self,
        table: &str,
        condition: &Condition,
        output_columns: &[&str],
    ) -> StoreResult<RowSet> {
        let statement = build_select(table, condition, Combinator::And, output_columns);
        self.run_query("select_by_all", Some(table), statement)
            .await
    }

    /// Rows matching at least one column of `condition`.
    pub async fn select_by_any(
        &self,
        table: &str,
        condition: &Condition,
        output_columns: &[&str],
    ) -> StoreResult<RowSet> {
        let statement = build_select(table, condition, Combinator::Or, output_columns);
        self.run_query("select_by_any", Some(table), statement)
            .await
    }

    pub async fn update_by_all(
        &self,
        table: &str,
        set: &Row,
        condition: &Condition,
    ) -> StoreResult<usize> {
        let statement = build_update(table, set, condition, Combinator::And);
        self.run_exec("update_by_all", Some(table), statement).await
    }

    pub async fn update_by_any(
        &self,
        table: &str,
        set: &Row,
        condition: &Condition,
    ) -> StoreResult<usize> {
        let statement = build_update(table, set, condition, Combinator::Or);
        self.run_exec("update_by_any", Some(table), statement).await
    }

    /// Rows whose `by` column equals `value`.
    pub async fn find(
        &self,
        table: &str,
        by: &str,
        value: impl Into<Value> + Send,
        output_columns: &[&str],
    ) -> StoreResult<RowSet> {
        let statement = build_find(table, by, value, output_columns);
        self.run_query("find", Some(table), statement).await
    }

    pub async fn drop_table(&self, table: &str) -> StoreResult<()> {
        let statement = build_drop_table(table);
        self.run_exec("drop_table", Some(table), statement)
            .await
            .map(|_| ())
    }

    /// Run caller-written SQL that does not return rows.
    pub async fn execute(&self, sql: &str, args: Vec<Value>) -> StoreResult<usize> {
        self.run_exec("execute", None, Ok(Statement::new(sql, args)))
            .await
    }

    /// Run caller-written SQL that returns rows.
    pub async fn select(&self, sql: &str, args: Vec<Value>) -> StoreResult<RowSet> {
        self.run_query("select", None, Ok(Statement::new(sql, args)))
            .await
    }
}

