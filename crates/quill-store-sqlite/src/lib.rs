//! SQLite backend for the Quill recording store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each mutation is one SQLite
//! transaction covering the subject swap, its timeline event, counter
//! adjustments and the search index; broadcasts leave only after commit.

mod access;
mod counter;
mod discard;
mod encode;
mod outbox;
mod publish;
mod schema;
mod search;
mod store;
mod tagging;
mod timeline;
mod tree;

pub mod config;
pub mod error;

pub use config::StoreConfig;
pub use discard::CASCADED_FROM;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
