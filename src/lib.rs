//! Dialect-portable SQL templates.
//!
//! A query is declared once as a template with named arguments and a few portable
//! directives (column types, `NOW`, booleans, dialect conditionals). When the process
//! learns which database it talks to, every declared template compiles to that dialect's
//! SQL with the right placeholder style. At call time named arguments are put in
//! placeholder order, list arguments are expanded, and the statement runs on the ambient
//! connection or on a transaction bound to the query.
//!
//! ```rust
//! use sql_template::prelude::*;
//!
//! let db = Database::with_dialect(Dialect::Postgres);
//! let q = db.declare(
//!     r#"select id from docs where owner = {{arg "owner"}} and id in ({{arg "...ids"}})"#,
//! )?;
//!
//! let mut args = vec![Arg::new("owner", 7)];
//! args.extend(Arg::list("ids", [1, 2, 3]));
//! let bound = q.bind(&args);
//! assert_eq!(
//!     bound.statement,
//!     "select id from docs where owner = $1 and id in ($2, $3, $4)"
//! );
//! # Ok::<(), SqlTemplateError>(())
//! ```

pub mod binder;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod expand;
pub mod prelude;
pub mod query;
pub mod results;
pub mod template;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use binder::{Arg, BoundParams};
pub use database::Database;
pub use dialect::{ColumnType, Dialect, DialectRegistry, PlaceholderStyle};
pub use driver::{Driver, Executor, Transaction, TxHandle};
pub use error::SqlTemplateError;
pub use query::{BoundStatement, Query};
pub use results::{ResultSet, Row};
pub use template::{Compiled, Template};
pub use types::Value;
