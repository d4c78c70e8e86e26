//! Postgres backend on `tokio-postgres`; also serves `CockroachDB`.
//!
//! Sub-modules:
//! - config: connection options and validation
//! - params: `Value` to Postgres wire conversion
//! - query: row extraction
//! - connection: the driver
//! - transaction: explicit `BEGIN` / `COMMIT` / `ROLLBACK` over the held client

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::PostgresOptions;
pub use connection::PostgresDriver;
pub use transaction::PostgresTx;
