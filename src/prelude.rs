//! Convenient imports for common functionality.

pub use crate::binder::{Arg, BoundParams};
pub use crate::database::Database;
pub use crate::dialect::{ColumnType, Dialect, PlaceholderStyle};
pub use crate::driver::{Driver, Executor, Transaction, TxHandle};
pub use crate::error::SqlTemplateError;
pub use crate::query::{BoundStatement, Query};
pub use crate::results::{ResultSet, Row};
pub use crate::template::Template;
pub use crate::types::Value;

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresDriver, PostgresOptions};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDriver, SqliteOptions, SqliteOptionsBuilder};
