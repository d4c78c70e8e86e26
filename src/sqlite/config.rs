use std::time::Duration;

use crate::error::SqlTemplateError;

use super::connection::SqliteDriver;

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Switch the journal to write-ahead logging on open.
    pub wal: bool,
    /// `SQLite` busy timeout; also bounds how long a statement waits for the connection.
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            wal: false,
            busy_timeout: None,
        }
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Open the database described by these options.
    ///
    /// # Errors
    /// Returns `SqlTemplateError` if the file cannot be opened or a pragma fails.
    pub async fn build(self) -> Result<SqliteDriver, SqlTemplateError> {
        SqliteDriver::open(self).await
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the database.
    ///
    /// # Errors
    /// Returns `SqlTemplateError` if the file cannot be opened or a pragma fails.
    pub async fn build(self) -> Result<SqliteDriver, SqlTemplateError> {
        SqliteDriver::open(self.finish()).await
    }
}

impl SqliteDriver {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }
}
