use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use tracing::{debug, error, warn};

use crate::dialect::{Dialect, DialectRegistry};
use crate::driver::{Driver, TxHandle};
use crate::error::SqlTemplateError;
use crate::query::{Declared, Query};
use crate::template::Template;

/// State shared by a [`Database`] and every query declared through it.
#[derive(Default)]
pub(crate) struct Shared {
    dialect: DialectRegistry,
    driver: OnceLock<Arc<dyn Driver>>,
    queue: BuildQueue,
}

impl Shared {
    pub(crate) fn driver(&self) -> Result<&Arc<dyn Driver>, SqlTemplateError> {
        self.driver.get().ok_or_else(|| {
            SqlTemplateError::ConfigError(
                "no database connection established; call Database::connect first".into(),
            )
        })
    }
}

/// Templates declared before the dialect is known.
#[derive(Default)]
struct BuildQueue {
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<Weak<Declared>>,
    flushed: bool,
}

impl BuildQueue {
    /// Queue `declared`, or build it right away if the queue was already flushed.
    fn enqueue(
        &self,
        declared: &Arc<Declared>,
        dialect: &DialectRegistry,
    ) -> Result<(), SqlTemplateError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.flushed {
            // flushed is only set after the dialect is established
            let dialect = dialect.get().ok_or_else(|| {
                SqlTemplateError::ConfigError("build queue flushed without a dialect".into())
            })?;
            drop(state);
            return declared.build(dialect);
        }
        state.pending.push(Arc::downgrade(declared));
        Ok(())
    }

    fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Build everything queued so far. Runs once; later calls find nothing to do.
    fn flush(&self, dialect: Dialect) -> Result<usize, SqlTemplateError> {
        let pending = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.flushed = true;
            std::mem::take(&mut state.pending)
        };

        let mut built = 0;
        let mut failures = Vec::new();
        for declared in pending.iter().filter_map(Weak::upgrade) {
            match declared.build(dialect) {
                Ok(()) => built += 1,
                Err(err) => {
                    error!(%dialect, error = %err, "failed to build query template");
                    failures.push(err);
                }
            }
        }

        match failures.len() {
            0 => Ok(built),
            1 => Err(failures.remove(0)),
            n => Err(SqlTemplateError::TemplateError(format!(
                "{n} query templates failed to build:\n\n{}",
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            ))),
        }
    }
}

/// Entry point for declaring and running templated queries.
///
/// Queries may be declared before the dialect is known; they queue and are all compiled
/// when [`establish_dialect`](Database::establish_dialect) or
/// [`connect`](Database::connect) fixes it. Clones share the same state.
///
/// ```rust,no_run
/// # #[cfg(feature = "sqlite")]
/// # async fn demo() -> Result<(), sql_template::SqlTemplateError> {
/// use sql_template::prelude::*;
///
/// let db = Database::new();
/// let by_name = db.declare(r#"select id from users where name = {{arg "name"}}"#)?;
///
/// let driver = SqliteOptions::new(":memory:".into()).build().await?;
/// db.connect(driver)?;
///
/// let row = by_name.query_one(&[Arg::new("name", "alice")]).await?;
/// # let _ = row;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A database whose dialect is fixed from the start; queries compile on declaration.
    #[must_use]
    pub fn with_dialect(dialect: Dialect) -> Self {
        let db = Self::new();
        // a fresh registry and an empty queue cannot fail
        let _ = db.establish_dialect(dialect);
        db
    }

    #[must_use]
    pub fn dialect(&self) -> Option<Dialect> {
        self.shared.dialect.get()
    }

    /// Number of declared queries still waiting for a dialect.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Declare a query template.
    ///
    /// The template is parsed immediately. It is compiled now if the dialect is known,
    /// otherwise when the dialect is established.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::TemplateError` if the template is malformed or, when the
    /// dialect is already known, declares an argument twice.
    pub fn declare(&self, source: &str) -> Result<Query, SqlTemplateError> {
        let template = Template::parse(source)?;
        let declared = Arc::new(Declared::new(template, Arc::clone(&self.shared)));
        self.shared
            .queue
            .enqueue(&declared, &self.shared.dialect)?;
        Ok(Query::from_declared(declared))
    }

    /// Fix the dialect and compile every queued template.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` if a different dialect was already established,
    /// or the `TemplateError`s of queued templates that fail to compile.
    pub fn establish_dialect(&self, dialect: Dialect) -> Result<(), SqlTemplateError> {
        if self.shared.dialect.establish(dialect)? {
            debug!(%dialect, "dialect established");
        }
        let built = self.shared.queue.flush(dialect)?;
        if built > 0 {
            debug!(%dialect, built, "built queued query templates");
        }
        Ok(())
    }

    /// Install the ambient connection, establishing its dialect.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` if a connection is already installed or the
    /// driver's dialect conflicts with the established one, and any template failures from
    /// [`establish_dialect`](Database::establish_dialect).
    pub fn connect(&self, driver: impl Driver + 'static) -> Result<(), SqlTemplateError> {
        self.connect_shared(Arc::new(driver))
    }

    /// [`connect`](Database::connect) for a driver that is already shared.
    ///
    /// # Errors
    /// Same as [`connect`](Database::connect).
    pub fn connect_shared(&self, driver: Arc<dyn Driver>) -> Result<(), SqlTemplateError> {
        self.establish_dialect(driver.dialect())?;
        self.shared.driver.set(driver).map_err(|_| {
            SqlTemplateError::ConfigError("a database connection is already established".into())
        })
    }

    /// The ambient connection.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` before [`connect`](Database::connect).
    pub fn driver(&self) -> Result<&Arc<dyn Driver>, SqlTemplateError> {
        self.shared.driver()
    }

    /// Open a transaction on the ambient connection. The caller commits or rolls back.
    ///
    /// # Errors
    /// Returns the driver's error if the transaction cannot be started.
    pub async fn begin(&self) -> Result<TxHandle, SqlTemplateError> {
        self.driver()?.begin().await
    }

    /// Run `work` inside a transaction.
    ///
    /// Commits when `work` succeeds. When it fails the transaction is rolled back and the
    /// error returned; if the rollback fails too, both errors are reported together.
    ///
    /// ```rust,no_run
    /// # use sql_template::prelude::*;
    /// # async fn demo(db: Database, insert: Query) -> Result<(), SqlTemplateError> {
    /// db.in_transaction(|tx| async move {
    ///     let insert = insert.with_transaction(Some(&tx));
    ///     insert.execute(&[Arg::new("name", "a")]).await?;
    ///     insert.execute(&[Arg::new("name", "b")]).await?;
    ///     Ok(())
    /// })
    /// .await
    /// # }
    /// ```
    ///
    /// # Errors
    /// The error from `work`, `SqlTemplateError::CommitFailed`, or
    /// `SqlTemplateError::RollbackFailed`.
    pub async fn in_transaction<F, Fut, T>(&self, work: F) -> Result<T, SqlTemplateError>
    where
        F: FnOnce(TxHandle) -> Fut,
        Fut: Future<Output = Result<T, SqlTemplateError>>,
    {
        let tx = self.begin().await?;

        match work(Arc::clone(&tx)).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|err| SqlTemplateError::CommitFailed(Box::new(err)))?;
                Ok(value)
            }
            Err(original) => match tx.rollback().await {
                Ok(()) => Err(original),
                Err(rollback) => {
                    warn!(error = %rollback, original = %original, "transaction rollback failed");
                    Err(SqlTemplateError::RollbackFailed {
                        rollback: Box::new(rollback),
                        original: Box::new(original),
                    })
                }
            },
        }
    }
}
