use thiserror::Error;

/// Errors surfaced by template compilation, binding and execution.
///
/// Configuration faults (`ConfigError`, `TemplateError`) point at a defect in the
/// declaring code and are meant to stop startup. `NotFound` is the only condition a
/// single-row fetch passes through unwrapped; every other driver failure reaches the
/// caller as [`SqlTemplateError::Statement`] with the compiled statement attached.
#[derive(Debug, Error)]
pub enum SqlTemplateError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("no rows returned")]
    NotFound,

    #[error("Executing query: \n{statement}\n: {source}")]
    Statement {
        statement: String,
        #[source]
        source: Box<SqlTemplateError>,
    },

    #[error("Error committing transaction: {0}")]
    CommitFailed(#[source] Box<SqlTemplateError>),

    #[error("Error rolling back transaction. Rollback error {rollback}, Original error {original}")]
    RollbackFailed {
        rollback: Box<SqlTemplateError>,
        original: Box<SqlTemplateError>,
    },

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlTemplateError {
    /// Wrap a driver failure with the statement that produced it.
    ///
    /// `NotFound` is returned untouched so optional lookups stay distinguishable.
    #[must_use]
    pub fn in_statement(self, statement: &str) -> Self {
        match self {
            SqlTemplateError::NotFound => SqlTemplateError::NotFound,
            other => SqlTemplateError::Statement {
                statement: statement.to_owned(),
                source: Box::new(other),
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SqlTemplateError::NotFound)
    }

    /// True for faults that indicate a defect in the calling code rather than a
    /// runtime condition.
    #[must_use]
    pub fn is_config_fault(&self) -> bool {
        matches!(
            self,
            SqlTemplateError::ConfigError(_) | SqlTemplateError::TemplateError(_)
        )
    }

    /// The compiled statement attached to an execution fault, if any.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            SqlTemplateError::Statement { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
