//! Rally Persistence - SQLite storage and transactional reward mutations

pub mod sqlite;

pub use sqlite::Database;
