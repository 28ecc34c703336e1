//! chatvault-store - SQLite storage layer with FTS5
//!
//! This crate provides persistent storage for conversations and messages
//! using SQLite, with an FTS5 inverted index kept in sync with message
//! content.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
