use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::binder::BoundParams;
use crate::driver::{Executor, Transaction, tx_completed};
use crate::error::SqlTemplateError;
use crate::results::ResultSet;

use super::connection::{SqliteGuard, run_with_guard};
use super::params::Params;
use super::query::{execute_statement, query_statement};

/// Transaction that holds the `SQLite` connection until commit or rollback.
///
/// Dropping an open transaction rolls it back.
pub struct SqliteTx {
    conn: Mutex<Option<SqliteGuard>>,
}

impl SqliteTx {
    pub(crate) async fn begin(guard: SqliteGuard) -> Result<Self, SqlTemplateError> {
        let (guard, res) = run_with_guard(guard, |conn| {
            conn.execute_batch("BEGIN")
                .map_err(SqlTemplateError::SqliteError)
        })
        .await?;
        res?;
        debug!("sqlite transaction started");
        Ok(Self {
            conn: Mutex::new(Some(guard)),
        })
    }

    async fn run<F, R>(&self, func: F) -> Result<R, SqlTemplateError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlTemplateError> + Send + 'static,
        R: Send + 'static,
    {
        let mut slot = self.conn.lock().await;
        let guard = slot.take().ok_or_else(|| tx_completed("SQLite"))?;
        let (guard, res) = run_with_guard(guard, func).await?;
        *slot = Some(guard);
        res
    }
}

#[async_trait]
impl Executor for SqliteTx {
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
impl Transaction for SqliteTx {
    async fn commit(&self) -> Result<(), SqlTemplateError> {
        let mut slot = self.conn.lock().await;
        let guard = slot.take().ok_or_else(|| tx_completed("SQLite"))?;
        let (guard, res) = run_with_guard(guard, |conn| {
            conn.execute_batch("COMMIT")
                .map_err(SqlTemplateError::SqliteError)
        })
        .await?;
        if res.is_err() {
            // still open; rollback or drop releases it
            *slot = Some(guard);
        }
        res
    }

    async fn rollback(&self) -> Result<(), SqlTemplateError> {
        let mut slot = self.conn.lock().await;
        let guard = slot.take().ok_or_else(|| tx_completed("SQLite"))?;
        let (_guard, res) = run_with_guard(guard, |conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(SqlTemplateError::SqliteError)
        })
        .await?;
        res
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if let Some(guard) = self.conn.get_mut().take() {
            warn!("sqlite transaction dropped while open; rolling back");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || {
                        let _ = guard.execute_batch("ROLLBACK");
                    });
                }
                Err(_) => {
                    let _ = guard.execute_batch("ROLLBACK");
                }
            }
        }
    }
}
