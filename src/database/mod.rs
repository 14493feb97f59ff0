pub mod bootstrap;
pub mod manager;
pub mod models;
pub mod pg_store;

pub use manager::{DatabaseError, DatabaseManager};
pub use pg_store::PgStore;
