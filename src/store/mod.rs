//! Serialized asynchronous access to the statistics database.
//!
//! Every statement goes through a single worker task that owns the pool and runs
//! tasks strictly in submission order. Submitting never blocks; the caller gets a
//! future that resolves once the worker has run the task.

pub mod stats_table;

use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Sqlite, SqlitePool};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::core::error::PersistenceError;

pub use stats_table::StatsTable;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Integer(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Real(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    fn query(&self) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
        self.params
            .iter()
            .fold(sqlx::query(&self.sql), |query, param| match param {
                SqlParam::Integer(v) => query.bind(*v),
                SqlParam::Real(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.as_str()),
            })
    }
}

type RowsCallback = Box<dyn FnOnce(Result<Vec<SqliteRow>, sqlx::Error>) + Send>;

enum Task {
    Read {
        statement: Statement,
        deliver: RowsCallback,
    },
    Write {
        statement: Statement,
        response: oneshot::Sender<Result<u64, PersistenceError>>,
    },
    BulkWrite {
        statements: Vec<Statement>,
        response: oneshot::Sender<Result<Vec<u64>, PersistenceError>>,
    },
    Close {
        response: oneshot::Sender<()>,
    },
}

/// Handle to the persistence worker. Clones share the same worker.
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl PersistenceQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(pool: SqlitePool) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Worker { pool, receiver }.run());
        Self { sender }
    }

    /// Runs a query and maps every returned row.
    pub fn queue_read<T, F>(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlParam>,
        mapper: F,
    ) -> impl Future<Output = Result<Vec<T>, PersistenceError>> + Send + 'static
    where
        T: Send + 'static,
        F: Fn(&SqliteRow) -> Result<T, sqlx::Error> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let deliver: RowsCallback = Box::new(move |rows| {
            let mapped = rows.map_err(PersistenceError::from).and_then(|rows| {
                rows.iter()
                    .map(&mapper)
                    .collect::<Result<Vec<T>, _>>()
                    .map_err(|e| PersistenceError::RowMapping(e.to_string()))
            });
            let _ = tx.send(mapped);
        });
        self.submit(Task::Read {
            statement: Statement::new(sql, params),
            deliver,
        });
        async move { rx.await.map_err(|_| PersistenceError::WorkerStopped)? }
    }

    /// Runs one statement and resolves to the number of affected rows.
    pub fn queue_write(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlParam>,
    ) -> impl Future<Output = Result<u64, PersistenceError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.submit(Task::Write {
            statement: Statement::new(sql, params),
            response: tx,
        });
        async move { rx.await.map_err(|_| PersistenceError::WorkerStopped)? }
    }

    /// Runs all statements inside one transaction; any failure rolls back the batch.
    pub fn queue_bulk_write(
        &self,
        statements: Vec<Statement>,
    ) -> impl Future<Output = Result<Vec<u64>, PersistenceError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.submit(Task::BulkWrite {
            statements,
            response: tx,
        });
        async move { rx.await.map_err(|_| PersistenceError::WorkerStopped)? }
    }

    /// Lets previously queued tasks finish, then closes the pool and stops the worker.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(Task::Close { response: tx });
        let _ = rx.await;
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    fn submit(&self, task: Task) {
        // A rejected send drops the task and its response sender, which resolves the
        // caller's future to `WorkerStopped`.
        if self.sender.send(task).is_err() {
            warn!("Persistence worker stopped, task dropped");
        }
    }
}

struct Worker {
    pool: SqlitePool,
    receiver: mpsc::UnboundedReceiver<Task>,
}

impl Worker {
    async fn run(mut self) {
        debug!("Persistence worker started");
        while let Some(task) = self.receiver.recv().await {
            match task {
                Task::Read { statement, deliver } => {
                    debug!(sql = %statement.sql, "Running read");
                    deliver(statement.query().fetch_all(&self.pool).await);
                }
                Task::Write {
                    statement,
                    response,
                } => {
                    debug!(sql = %statement.sql, "Running write");
                    let result = statement
                        .query()
                        .execute(&self.pool)
                        .await
                        .map(|r| r.rows_affected())
                        .map_err(PersistenceError::from);
                    let _ = response.send(result);
                }
                Task::BulkWrite {
                    statements,
                    response,
                } => {
                    debug!(count = statements.len(), "Running bulk write");
                    let _ = response.send(self.bulk_write(&statements).await);
                }
                Task::Close { response } => {
                    self.receiver.close();
                    self.pool.close().await;
                    info!("Persistence worker closed");
                    let _ = response.send(());
                    return;
                }
            }
        }
        self.pool.close().await;
        debug!("Persistence worker exited");
    }

    async fn bulk_write(&self, statements: &[Statement]) -> Result<Vec<u64>, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            affected.push(statement.query().execute(&mut *tx).await?.rows_affected());
        }
        tx.commit().await?;
        Ok(affected)
    }
}

/// Waits for `task`, giving up after `secs` seconds.
pub async fn with_deadline<F: Future>(secs: u64, task: F) -> Result<F::Output, PersistenceError> {
    tokio::time::timeout(Duration::from_secs(secs), task)
        .await
        .map_err(|_| PersistenceError::TimedOut(secs))
}

/// Opens (creating if needed) the database file behind a single-connection pool.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::Database(sqlx::Error::Io(e)))?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    info!(path = %path.display(), "Opened statistics database");
    Ok(pool)
}

/// Private in-memory database. The single connection is never recycled, so the
/// data lives as long as the pool.
pub async fn open_in_memory() -> Result<SqlitePool, PersistenceError> {
    let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}
