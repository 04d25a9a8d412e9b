//! Persistence layer for the zentri webhook subsystem.
//!
//! Provides the connection pool, embedded SQL migrations, and the sqlx-backed
//! models for webhook subscribers and their delivery records.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::connect;
