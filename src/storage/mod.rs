pub mod config;
pub mod slot;
pub mod sqlite;

pub use slot::{KeyValueStore, MemoryStorage, StorageError};
pub use sqlite::SqliteStorage;
