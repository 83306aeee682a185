//! Domain store: SQLite pool, migrations and CRUD for users, payments, questions and FAQ

pub mod db;
pub mod migrations;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
