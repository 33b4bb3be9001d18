//! Storage layer.
//!
//! [`KnowledgeStore`] and [`StoreTx`] define the interface the operations
//! use; [`SqliteStore`] is the SQLite-backed implementation.

#[cfg(test)]
mod faulty;
mod sqlite;
mod traits;

#[cfg(test)]
pub(crate) use faulty::FaultyStore;
pub use sqlite::SqliteStore;
pub use traits::{KnowledgeStore, StorageError, StoreTx};
