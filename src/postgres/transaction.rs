use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::Client;
use tracing::{debug, warn};

use crate::binder::BoundParams;
use crate::driver::{Executor, Transaction, tx_completed};
use crate::error::SqlTemplateError;
use crate::results::ResultSet;

use super::connection::{execute_on, query_on};

/// Transaction that holds the Postgres client until commit or rollback.
///
/// Dropping an open transaction rolls it back on a spawned task.
pub struct PostgresTx {
    client: Mutex<Option<OwnedMutexGuard<Client>>>,
}

impl PostgresTx {
    pub(crate) async fn begin(client: OwnedMutexGuard<Client>) -> Result<Self, SqlTemplateError> {
        client.batch_execute("BEGIN").await?;
        debug!("postgres transaction started");
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    async fn finish(&self, sql: &'static str) -> Result<(), SqlTemplateError> {
        let mut slot = self.client.lock().await;
        let client = slot.as_ref().ok_or_else(|| tx_completed("Postgres"))?;
        let res = client.batch_execute(sql).await;
        match res {
            Ok(()) => {
                slot.take();
                Ok(())
            }
            // a failed COMMIT leaves the client with the caller for rollback
            Err(e) if sql == "COMMIT" => Err(e.into()),
            Err(e) => {
                slot.take();
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Executor for PostgresTx {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        let slot = self.client.lock().await;
        let client = slot.as_ref().ok_or_else(|| tx_completed("Postgres"))?;
        execute_on(client, statement, params).await
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        let slot = self.client.lock().await;
        let client = slot.as_ref().ok_or_else(|| tx_completed("Postgres"))?;
        query_on(client, statement, params).await
    }
}

#[async_trait]
impl Transaction for PostgresTx {
    async fn commit(&self) -> Result<(), SqlTemplateError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), SqlTemplateError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresTx {
    fn drop(&mut self) {
        if let Some(client) = self.client.get_mut().take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            warn!("postgres transaction dropped while open; rolling back");
            handle.spawn(async move {
                let _ = client.batch_execute("ROLLBACK").await;
            });
        }
    }
}
