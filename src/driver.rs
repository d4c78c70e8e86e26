use std::sync::Arc;

use async_trait::async_trait;

use crate::binder::BoundParams;
use crate::dialect::Dialect;
use crate::error::SqlTemplateError;
use crate::results::{ResultSet, Row};

/// Issues compiled statements. Implemented by connections and by open transactions.
///
/// Statements arrive fully compiled and expanded; parameters are already in the order
/// (or under the names) the dialect expects.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement that returns no rows; yields the number of rows changed.
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError>;

    /// Run a statement and materialize every row.
    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError>;

    /// Run a statement and keep the first row, if any.
    async fn query_row(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<Option<Row>, SqlTemplateError> {
        Ok(self.query(statement, params).await?.into_first())
    }
}

/// The ambient connection queries run against when no transaction is bound.
#[async_trait]
pub trait Driver: Executor {
    /// Dialect of the backend behind this driver.
    fn dialect(&self) -> Dialect;

    /// Open a transaction. The returned handle is owned by the caller.
    async fn begin(&self) -> Result<TxHandle, SqlTemplateError>;
}

/// An open transaction. Once committed or rolled back, further calls fail.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(&self) -> Result<(), SqlTemplateError>;
    async fn rollback(&self) -> Result<(), SqlTemplateError>;
}

/// Shared handle to an open transaction; queries bound to it route through it.
pub type TxHandle = Arc<dyn Transaction>;

pub(crate) fn tx_completed(backend: &str) -> SqlTemplateError {
    SqlTemplateError::ExecutionError(format!("{backend} transaction already completed"))
}
