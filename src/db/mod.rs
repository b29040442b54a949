//! Database layer
//!
//! Persistence for the Palaver forum. Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The driver is selected at startup from configuration; repositories
//! dispatch on the driver through the `DatabasePool` trait.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool};
