//! `SQLite` backend on `rusqlite`.
//!
//! One connection serves the whole process. Calls run on the blocking pool; an open
//! transaction holds the connection until it commits or rolls back, so ambient queries
//! issued meanwhile wait for it, and fail with an execution error once the lock wait
//! (the configured busy timeout, or [`connection::DEFAULT_LOCK_WAIT`]) runs out. Run
//! statements that belong to the transaction through a query bound with [`Query::with_transaction`](crate::Query::with_transaction).

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteDriver;
pub use params::Params as SqliteParams;
pub use transaction::SqliteTx;
