#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use sql_template::prelude::*;

static TRACING: Once = Once::new();

/// Send library traces to the test harness output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

/// One statement as a driver saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub statement: String,
    pub params: BoundParams,
    pub in_tx: bool,
}

#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<Call>,
    pub events: Vec<&'static str>,
}

pub type SharedLog = Arc<Mutex<Log>>;

/// Driver that records every statement and returns no rows.
#[derive(Clone)]
pub struct RecordingDriver {
    pub dialect: Dialect,
    pub log: SharedLog,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

impl RecordingDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            log: SharedLog::default(),
            fail_commit: false,
            fail_rollback: false,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().events.clone()
    }
}

fn record(log: &SharedLog, statement: &str, params: &BoundParams, in_tx: bool) {
    log.lock().unwrap().calls.push(Call {
        statement: statement.to_string(),
        params: params.clone(),
        in_tx,
    });
}

#[async_trait]
impl Executor for RecordingDriver {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        record(&self.log, statement, params, false);
        Ok(1)
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        record(&self.log, statement, params, false);
        Ok(ResultSet::with_capacity(0))
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn begin(&self) -> Result<TxHandle, SqlTemplateError> {
        self.log.lock().unwrap().events.push("begin");
        Ok(Arc::new(RecordingTx {
            driver: self.clone(),
        }))
    }
}

pub struct RecordingTx {
    driver: RecordingDriver,
}

#[async_trait]
impl Executor for RecordingTx {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        record(&self.driver.log, statement, params, true);
        Ok(1)
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        record(&self.driver.log, statement, params, true);
        Ok(ResultSet::with_capacity(0))
    }
}

#[async_trait]
impl Transaction for RecordingTx {
    async fn commit(&self) -> Result<(), SqlTemplateError> {
        self.driver.log.lock().unwrap().events.push("commit");
        if self.driver.fail_commit {
            return Err(SqlTemplateError::ConnectionError("commit lost".into()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), SqlTemplateError> {
        self.driver.log.lock().unwrap().events.push("rollback");
        if self.driver.fail_rollback {
            return Err(SqlTemplateError::ConnectionError("rollback lost".into()));
        }
        Ok(())
    }
}

/// Driver whose every statement fails as if the server went away.
pub struct FailingDriver {
    pub dialect: Dialect,
}

#[async_trait]
impl Executor for FailingDriver {
    async fn execute(&self, _: &str, _: &BoundParams) -> Result<usize, SqlTemplateError> {
        Err(SqlTemplateError::ConnectionError("connection refused".into()))
    }

    async fn query(&self, _: &str, _: &BoundParams) -> Result<ResultSet, SqlTemplateError> {
        Err(SqlTemplateError::ConnectionError("connection refused".into()))
    }
}

#[async_trait]
impl Driver for FailingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn begin(&self) -> Result<TxHandle, SqlTemplateError> {
        Err(SqlTemplateError::ConnectionError("connection refused".into()))
    }
}
