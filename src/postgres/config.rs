use std::time::Duration;

use tokio_postgres::Config;

use crate::dialect::Dialect;
use crate::error::SqlTemplateError;

use super::connection::{DEFAULT_LOCK_WAIT, PostgresDriver};

/// Options for connecting to a Postgres-protocol server.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: Config,
    /// `Dialect::Postgres` or `Dialect::Cockroachdb`.
    pub dialect: Dialect,
    /// How long a statement waits for the client held by an open transaction.
    pub lock_wait: Duration,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            dialect: Dialect::Postgres,
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Check that the options describe a server this driver can reach.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` naming the first missing field, or the
    /// dialect when it does not speak the Postgres protocol.
    pub fn validate(&self) -> Result<(), SqlTemplateError> {
        if !matches!(self.dialect, Dialect::Postgres | Dialect::Cockroachdb) {
            return Err(SqlTemplateError::ConfigError(format!(
                "postgres driver cannot serve the {} dialect",
                self.dialect
            )));
        }
        if self.config.get_dbname().is_none() {
            return Err(SqlTemplateError::ConfigError(
                "dbname is required".to_string(),
            ));
        }
        if self.config.get_hosts().is_empty() {
            return Err(SqlTemplateError::ConfigError(
                "host is required".to_string(),
            ));
        }
        if self.config.get_user().is_none() {
            return Err(SqlTemplateError::ConfigError(
                "user is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and connect.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` for incomplete options or
    /// `SqlTemplateError::ConnectionError` if the server cannot be reached.
    pub async fn connect(self) -> Result<PostgresDriver, SqlTemplateError> {
        PostgresDriver::connect(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_missing_fields() {
        let mut config = Config::new();
        let err = PostgresOptions::new(config.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("dbname is required"));

        config.dbname("app");
        let err = PostgresOptions::new(config.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("host is required"));

        config.host("localhost");
        let err = PostgresOptions::new(config.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("user is required"));

        config.user("app");
        let opts = PostgresOptions::new(config.clone());
        assert!(opts.validate().is_ok());
        assert_eq!(opts.lock_wait, DEFAULT_LOCK_WAIT);
        assert_eq!(
            opts.with_lock_wait(std::time::Duration::from_millis(50)).lock_wait,
            std::time::Duration::from_millis(50)
        );
        assert!(
            PostgresOptions::new(config)
                .with_dialect(Dialect::Mysql)
                .validate()
                .is_err()
        );
    }
}
