pub mod pool;
pub mod schema;
pub mod sent;
pub mod tracking;
pub mod users;

// Re-export the pool type so callers can do `use crate::adapters::sqlite::DbPool`
pub use pool::DbPool;
