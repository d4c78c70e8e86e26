use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, warn};

use crate::binder::BoundParams;
use crate::dialect::Dialect;
use crate::driver::{Driver, Executor, TxHandle};
use crate::error::SqlTemplateError;
use crate::results::ResultSet;

use super::config::PostgresOptions;
use super::params::Params;
use super::query::build_result_set_from_rows;
use super::transaction::PostgresTx;

/// How long a statement waits for the client unless the options say otherwise.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Postgres driver over one `tokio-postgres` client.
///
/// An open transaction holds the client, so ambient queries wait until it completes and
/// fail once `lock_wait` runs out.
#[derive(Clone)]
pub struct PostgresDriver {
    client: Arc<Mutex<Client>>,
    dialect: Dialect,
    lock_wait: Duration,
}

impl fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("dialect", &self.dialect)
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

impl PostgresDriver {
    /// Validate `opts`, connect, and drive the connection on a background task.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` for incomplete options or
    /// `SqlTemplateError::ConnectionError` if the server cannot be reached.
    pub async fn connect(opts: PostgresOptions) -> Result<Self, SqlTemplateError> {
        opts.validate()?;
        let (client, connection) = opts.config.connect(NoTls).await.map_err(|e| {
            SqlTemplateError::ConnectionError(format!("Failed to connect to Postgres: {e}"))
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection closed with error");
            }
        });
        debug!(dialect = %opts.dialect, "connected to postgres");
        Ok(Self::from_client(client, opts.dialect).with_lock_wait(opts.lock_wait))
    }

    /// Wrap a client whose connection is already being driven.
    #[must_use]
    pub fn from_client(client: Client, dialect: Dialect) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            dialect,
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, Client>, SqlTemplateError> {
        tokio::time::timeout(self.lock_wait, self.client.lock())
            .await
            .map_err(|_| lock_timeout(self.lock_wait))
    }

    /// Run a batch of statements outside any template, e.g. schema setup.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::PostgresError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlTemplateError> {
        let client = self.acquire().await?;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

fn lock_timeout(wait: Duration) -> SqlTemplateError {
    warn!(wait = ?wait, "timed out waiting for the postgres client");
    SqlTemplateError::ExecutionError("connection is held by an open transaction".into())
}

pub(crate) async fn execute_on(
    client: &Client,
    statement: &str,
    params: &BoundParams,
) -> Result<usize, SqlTemplateError> {
    let params = Params::convert(params);
    let stmt = client.prepare(statement).await?;
    let rows = client.execute(&stmt, &params.as_refs()).await?;
    usize::try_from(rows).map_err(|e| {
        SqlTemplateError::ExecutionError(format!("Invalid rows affected count: {e}"))
    })
}

pub(crate) async fn query_on(
    client: &Client,
    statement: &str,
    params: &BoundParams,
) -> Result<ResultSet, SqlTemplateError> {
    let params = Params::convert(params);
    let stmt = client.prepare(statement).await?;
    let rows = client.query(&stmt, &params.as_refs()).await?;
    build_result_set_from_rows(stmt.columns(), &rows)
}

#[async_trait]
impl Executor for PostgresDriver {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        let client = self.acquire().await?;
        execute_on(&client, statement, params).await
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        let client = self.acquire().await?;
        query_on(&client, statement, params).await
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn begin(&self) -> Result<TxHandle, SqlTemplateError> {
        let guard = tokio::time::timeout(self.lock_wait, Arc::clone(&self.client).lock_owned())
            .await
            .map_err(|_| lock_timeout(self.lock_wait))?;
        let tx = PostgresTx::begin(guard).await?;
        Ok(Arc::new(tx))
    }
}
