use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::binder::BoundParams;
use crate::dialect::Dialect;
use crate::driver::{Driver, Executor, TxHandle};
use crate::error::SqlTemplateError;
use crate::results::ResultSet;

use super::config::SqliteOptions;
use super::params::Params;
use super::query::{execute_statement, query_statement};
use super::transaction::SqliteTx;

/// The single `rusqlite` connection, shared between the driver and its transactions.
pub type SharedSqliteConnection = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

pub(crate) type SqliteGuard = OwnedMutexGuard<rusqlite::Connection>;

/// How long a statement waits for the connection when no busy timeout is configured.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// `SQLite` driver over one `rusqlite` connection.
#[derive(Clone)]
pub struct SqliteDriver {
    conn: SharedSqliteConnection,
    db_path: Arc<str>,
    lock_wait: Duration,
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("db_path", &self.db_path)
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Open the database at `opts.db_path` and apply its pragmas.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::SqliteError` if opening fails, or
    /// `SqlTemplateError::ConnectionError` if the blocking task does not complete.
    pub async fn open(opts: SqliteOptions) -> Result<Self, SqlTemplateError> {
        let path = opts.db_path.clone();
        let lock_wait = opts.busy_timeout.unwrap_or(DEFAULT_LOCK_WAIT);
        let conn = spawn_blocking(move || -> Result<rusqlite::Connection, SqlTemplateError> {
            let conn = rusqlite::Connection::open(&opts.db_path)?;
            if let Some(timeout) = opts.busy_timeout {
                conn.busy_timeout(timeout)?;
            }
            if opts.wal {
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            }
            Ok(conn)
        })
        .await
        .map_err(|e| SqlTemplateError::ConnectionError(format!("sqlite open join error: {e}")))??;

        debug!(db_path = %path, "opened sqlite database");
        Ok(Self::from_connection(conn, &path).with_lock_wait(lock_wait))
    }

    /// Wrap an already open connection.
    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection, db_path: &str) -> Self {
        Self {
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
            db_path: Arc::from(db_path),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Bound how long a statement waits for the connection before failing.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Run a batch of statements outside any template, e.g. schema setup.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::SqliteError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlTemplateError> {
        let sql_owned = sql.to_owned();
        self.run(move |conn| {
            conn.execute_batch(&sql_owned)
                .map_err(SqlTemplateError::SqliteError)
        })
        .await
    }

    /// Take the connection, giving up after `lock_wait`. An open transaction holds it until
    /// it completes.
    async fn acquire(&self) -> Result<SqliteGuard, SqlTemplateError> {
        tokio::time::timeout(self.lock_wait, Arc::clone(&self.conn).lock_owned())
            .await
            .map_err(|_| {
                warn!(
                    db_path = %self.db_path,
                    wait = ?self.lock_wait,
                    "timed out waiting for the sqlite connection"
                );
                SqlTemplateError::ExecutionError(
                    "connection is held by an open transaction".into(),
                )
            })
    }

    /// Run `func` against the connection on the blocking pool.
    async fn run<F, R>(&self, func: F) -> Result<R, SqlTemplateError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlTemplateError> + Send + 'static,
        R: Send + 'static,
    {
        let guard = self.acquire().await?;
        let (_guard, res) = run_with_guard(guard, func).await?;
        res
    }
}

#[async_trait]
impl Executor for SqliteDriver {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        let sql = statement.to_owned();
        let params = Params::convert(params);
        self.run(move |conn| execute_statement(conn, &sql, params.as_values()))
            .await
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        let sql = statement.to_owned();
        let params = Params::convert(params);
        self.run(move |conn| query_statement(conn, &sql, params.as_values()))
            .await
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn begin(&self) -> Result<TxHandle, SqlTemplateError> {
        let guard = self.acquire().await?;
        let tx = SqliteTx::begin(guard).await?;
        Ok(Arc::new(tx))
    }
}

/// Run `func` on the blocking pool with a connection the caller already holds, handing
/// the guard back afterwards.
pub(crate) async fn run_with_guard<F, R>(
    mut guard: SqliteGuard,
    func: F,
) -> Result<(SqliteGuard, Result<R, SqlTemplateError>), SqlTemplateError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlTemplateError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let res = func(&mut guard);
        (guard, res)
    })
    .await
    .map_err(|e| SqlTemplateError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))
}
