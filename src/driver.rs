//! Statement execution against the store.

use crate::error::{StoreError, StoreResult};
use crate::statement::Statement;
use crate::value::{RowSet, Value};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// SQLite VM instructions between deadline checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// A wall-clock time budget handed down to every driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// `None` when the budget reaches past what `Instant` can represent.
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    /// Expire `budget` from now. A budget too large to represent never
    /// expires.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget,
        }
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// The budget this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn exceeded(&self) -> StoreError {
        StoreError::DeadlineExceeded(self.budget)
    }
}

/// The store a service runs its statements against.
///
/// Arguments bind positionally to the statement's `?` placeholders. Both
/// calls must give up with [`StoreError::DeadlineExceeded`] once `deadline`
/// has passed.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    /// Run a statement that returns rows. Matching nothing is an empty set.
    async fn query(&self, statement: Statement, deadline: Deadline) -> StoreResult<RowSet>;

    /// Run a statement that does not return rows; yields the number of rows
    /// changed.
    async fn exec(&self, statement: Statement, deadline: Deadline) -> StoreResult<usize>;

    /// Check that the store answers.
    async fn ping(&self, deadline: Deadline) -> StoreResult<()> {
        self.query(Statement::new("SELECT 1", Vec::new()), deadline)
            .await
            .map(|_| ())
    }
}

/// [`StoreDriver`] backed by a single rusqlite connection.
///
/// Calls are serialized on the connection and run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteDriver {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening sqlite database");
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn run<T, F>(&self, deadline: Deadline, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        if deadline.is_expired() {
            return Err(deadline.exceeded());
        }

        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            if deadline.is_expired() {
                return Err(deadline.exceeded());
            }

            conn.progress_handler(PROGRESS_INTERVAL, Some(move || deadline.is_expired()));
            let result = work(&conn);
            conn.progress_handler(0, None::<fn() -> bool>);

            result.map_err(|err| match err.sqlite_error_code() {
                Some(ErrorCode::OperationInterrupted) => deadline.exceeded(),
                _ => StoreError::Driver(err),
            })
        });

        match tokio::time::timeout(deadline.remaining(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(StoreError::Task(err.to_string())),
            Err(_) => {
                warn!(budget = ?deadline.budget(), "statement deadline exceeded");
                Err(deadline.exceeded())
            }
        }
    }
}

fn read_rows(conn: &Connection, statement: &Statement) -> rusqlite::Result<RowSet> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(statement.args.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record: HashMap<String, Value> = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), Value::from_cell(row.get_ref(i)?));
        }
        out.push(record);
    }
    Ok(out)
}

// Steps the statement to completion, so writes that also return rows
// (`RETURNING`, some pragmas) count as successful writes.
fn write_rows(conn: &Connection, statement: &Statement) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let mut rows = stmt.query(params_from_iter(statement.args.iter()))?;
    while rows.next()?.is_some() {}
    drop(rows);
    Ok(usize::try_from(conn.changes()).unwrap_or(usize::MAX))
}

#[async_trait]
impl StoreDriver for SqliteDriver {
    // Rows are read by stepping the statement, so a query matching nothing
    // yields an empty vec rather than `QueryReturnedNoRows`.
    async fn query(&self, statement: Statement, deadline: Deadline) -> StoreResult<RowSet> {
        let statement = statement.terminated()?;
        debug!(sql = %statement.sql, args = statement.args.len(), "query");
        self.run(deadline, move |conn| read_rows(conn, &statement))
            .await
    }

    async fn exec(&self, statement: Statement, deadline: Deadline) -> StoreResult<usize> {
        let statement = statement.terminated()?;
        debug!(sql = %statement.sql, args = statement.args.len(), "exec");
        self.run(deadline, move |conn| write_rows(conn, &statement))
            .await
    }
}
