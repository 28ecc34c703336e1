//! chatvault-core - Core types and traits for the conversation store
//!
//! This crate provides the foundational types, traits, and error handling
//! used throughout the chatvault system.

pub mod config;
pub mod error;
pub mod tokenize;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, VaultError};
pub use tokenize::SimpleTokenizer;
pub use traits::*;
pub use types::*;
