//! Conversation persistence backends for inklink.

pub mod noop;
pub mod in_memory;
pub mod file_backend;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use noop::NoopPersistence;
pub use in_memory::InMemoryPersistence;
pub use file_backend::FilePersistence;

#[cfg(feature = "sqlite")]
pub use sqlite::SqlitePersistence;
