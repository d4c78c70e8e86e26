use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::binder::{Arg, BoundParams, bind};
use crate::database::Shared;
use crate::dialect::Dialect;
use crate::driver::{Driver, TxHandle};
use crate::error::SqlTemplateError;
use crate::expand::expand;
use crate::results::{ResultSet, Row};
use crate::template::{Compiled, Template};

/// Padding used by [`Query::debug`].
const DEBUG_PADDING: usize = 25;

/// A declared template and, once the dialect is known, its compiled form.
pub(crate) struct Declared {
    template: Template,
    compiled: OnceLock<Compiled>,
    shared: Arc<Shared>,
}

impl Declared {
    pub(crate) fn new(template: Template, shared: Arc<Shared>) -> Self {
        Self {
            template,
            compiled: OnceLock::new(),
            shared,
        }
    }

    /// Compile for `dialect` unless already compiled.
    pub(crate) fn build(&self, dialect: Dialect) -> Result<(), SqlTemplateError> {
        if self.compiled.get().is_none() {
            let compiled = self.template.compile(dialect)?;
            trace!(%dialect, statement = compiled.statement(), "compiled query template");
            // a concurrent build of the same template produced the same text
            let _ = self.compiled.set(compiled);
        }
        Ok(())
    }

    pub(crate) fn source(&self) -> &str {
        self.template.source()
    }
}

/// A templated statement that runs on whichever dialect the [`Database`] was set up for.
///
/// `Query` is a cheap handle: clones share the compiled text, and
/// [`with_transaction`](Query::with_transaction) returns a new handle instead of changing
/// this one, so a single declared query can be used from many tasks at once.
///
/// [`Database`]: crate::Database
#[derive(Clone)]
pub struct Query {
    declared: Arc<Declared>,
    tx: Option<TxHandle>,
}

/// A statement expanded and bound for one call, ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement<'q> {
    pub statement: Cow<'q, str>,
    pub arg_names: Cow<'q, [String]>,
    pub params: BoundParams,
}

enum Target<'a> {
    Tx(&'a TxHandle),
    Conn(&'a Arc<dyn Driver>),
}

impl Target<'_> {
    async fn execute(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<usize, SqlTemplateError> {
        match self {
            Target::Tx(tx) => tx.execute(statement, params).await,
            Target::Conn(conn) => conn.execute(statement, params).await,
        }
    }

    async fn query(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<ResultSet, SqlTemplateError> {
        match self {
            Target::Tx(tx) => tx.query(statement, params).await,
            Target::Conn(conn) => conn.query(statement, params).await,
        }
    }

    async fn query_row(
        &self,
        statement: &str,
        params: &BoundParams,
    ) -> Result<Option<Row>, SqlTemplateError> {
        match self {
            Target::Tx(tx) => tx.query_row(statement, params).await,
            Target::Conn(conn) => conn.query_row(statement, params).await,
        }
    }
}

impl Query {
    pub(crate) fn from_declared(declared: Arc<Declared>) -> Self {
        Self { declared, tx: None }
    }

    /// Compiled form of the template.
    ///
    /// # Panics
    /// Panics if the dialect was never established, which means no statement can be correct.
    fn compiled(&self) -> &Compiled {
        match self.declared.compiled.get() {
            Some(compiled) => compiled,
            None => panic!(
                "query template hasn't been built yet; establish the dialect before using it:\n{}",
                self.declared.source().trim()
            ),
        }
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.declared.compiled.get().is_some()
    }

    /// The compiled statement text.
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    #[must_use]
    pub fn statement(&self) -> &str {
        self.compiled().statement()
    }

    /// Argument names in the order the statement expects them.
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    #[must_use]
    pub fn arg_names(&self) -> &[String] {
        self.compiled().arg_names()
    }

    /// # Panics
    /// Panics if the dialect was never established.
    #[must_use]
    pub fn has_list(&self) -> bool {
        self.compiled().has_list()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        self.declared.source()
    }

    /// A copy of this query that runs inside `tx`; `None` returns an unbound copy of `self`.
    #[must_use]
    pub fn with_transaction(&self, tx: Option<&TxHandle>) -> Query {
        match tx {
            Some(tx) => Query {
                declared: Arc::clone(&self.declared),
                tx: Some(Arc::clone(tx)),
            },
            None => self.clone(),
        }
    }

    #[must_use]
    pub fn transaction(&self) -> Option<&TxHandle> {
        self.tx.as_ref()
    }

    /// The bound transaction, for operations that must not run outside one.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` if no transaction is bound.
    pub fn require_transaction(&self) -> Result<&TxHandle, SqlTemplateError> {
        self.tx.as_ref().ok_or_else(|| {
            SqlTemplateError::ConfigError(format!(
                "query requires a transaction but none is bound:\n{}",
                self.declared.source().trim()
            ))
        })
    }

    /// Expand list placeholders and order `args` for this call without executing.
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    #[must_use]
    pub fn bind(&self, args: &[Arg]) -> BoundStatement<'_> {
        let compiled = self.compiled();
        let (statement, arg_names) = if compiled.has_list() {
            let expanded = expand(compiled, args);
            (
                Cow::Owned(expanded.statement),
                Cow::Owned(expanded.arg_names),
            )
        } else {
            (
                Cow::Borrowed(compiled.statement()),
                Cow::Borrowed(compiled.arg_names()),
            )
        };
        let params = bind(&arg_names, args, compiled.dialect());
        BoundStatement {
            statement,
            arg_names,
            params,
        }
    }

    fn target(&self) -> Result<Target<'_>, SqlTemplateError> {
        match &self.tx {
            Some(tx) => Ok(Target::Tx(tx)),
            None => self.declared.shared.driver().map(Target::Conn),
        }
    }

    /// Run a statement that returns no rows.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::Statement` wrapping the driver error, or
    /// `SqlTemplateError::ConfigError` if there is neither a bound transaction nor a
    /// connection.
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    pub async fn execute(&self, args: &[Arg]) -> Result<usize, SqlTemplateError> {
        let bound = self.bind(args);
        let target = self.target()?;
        trace!(statement = %bound.statement, params = bound.params.len(), in_tx = self.tx.is_some(), "execute");
        target
            .execute(&bound.statement, &bound.params)
            .await
            .map_err(|err| err.in_statement(&bound.statement))
    }

    /// Run a statement and return every row.
    ///
    /// # Errors
    /// Same as [`execute`](Query::execute).
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    pub async fn query_many(&self, args: &[Arg]) -> Result<ResultSet, SqlTemplateError> {
        let bound = self.bind(args);
        let target = self.target()?;
        trace!(statement = %bound.statement, params = bound.params.len(), in_tx = self.tx.is_some(), "query");
        target
            .query(&bound.statement, &bound.params)
            .await
            .map_err(|err| err.in_statement(&bound.statement))
    }

    /// Run a statement and return its first row.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::NotFound`, unwrapped, when no row matches; any other
    /// failure is wrapped as in [`execute`](Query::execute).
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    pub async fn query_one(&self, args: &[Arg]) -> Result<Row, SqlTemplateError> {
        let bound = self.bind(args);
        let target = self.target()?;
        trace!(statement = %bound.statement, params = bound.params.len(), in_tx = self.tx.is_some(), "query one");
        match target.query_row(&bound.statement, &bound.params).await {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(SqlTemplateError::NotFound),
            Err(err) => Err(err.in_statement(&bound.statement)),
        }
    }

    /// Like [`query_one`](Query::query_one), with "no row" as `None`.
    ///
    /// # Errors
    /// Any failure other than a missing row.
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    pub async fn query_optional(&self, args: &[Arg]) -> Result<Option<Row>, SqlTemplateError> {
        match self.query_one(args).await {
            Ok(row) => Ok(Some(row)),
            Err(SqlTemplateError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Run the query and render its rows as a text table.
    ///
    /// # Errors
    /// Same as [`query_many`](Query::query_many).
    ///
    /// # Panics
    /// Panics if the dialect was never established.
    pub async fn debug(&self, args: &[Arg]) -> Result<String, SqlTemplateError> {
        Ok(self.query_many(args).await?.to_table_string(DEBUG_PADDING))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.statement())
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("source", &self.declared.source())
            .field(
                "statement",
                &self.declared.compiled.get().map(Compiled::statement),
            )
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}
