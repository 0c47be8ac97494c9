//! Persistent state backends.

mod sqlite;

pub use sqlite::SqliteStore;
