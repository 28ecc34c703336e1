//! chatvault-query - Search engine and snippet generation
//!
//! This crate turns a keyword plus optional filters into an FTS5 query
//! against the storage layer and post-processes the matched rows into
//! highlighted, bounded-length snippets.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatvault_query::SearchEngine;
//! use std::sync::Arc;
//!
//! let engine = SearchEngine::new(Arc::new(store), Arc::new(tokenizer));
//! let results = engine.search(&query).await;
//! ```

mod engine;
mod snippet;

pub use engine::SearchEngine;
pub use snippet::{generate_snippet, DEFAULT_MAX_LENGTH, HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};

// Re-export for convenience
pub use chatvault_core::{SearchHit, SearchQuery, SearchResults};
