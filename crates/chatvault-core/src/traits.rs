//! Core traits defining the interfaces between components.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Conversation, MessageMatch, SearchFilters, StorageStats};

/// Storage layer trait for conversations, messages, and the full-text
/// index kept in sync with them.
///
/// All multi-row mutations (`save_conversation`, `reindex_messages`,
/// `clear_all_data`) are single atomic transactions: either fully
/// applied or fully rolled back.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Upsert a conversation and its messages in one transaction.
    ///
    /// On conflict the conversation's `title`, `url`, `updated_at`, and
    /// `message_count` are updated; each message's `content`,
    /// `thinking`, `position`, and `updated_at` are updated. Index
    /// entries are written for newly inserted messages only.
    async fn save_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Fetch a conversation with its messages ordered by `position`.
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    /// Look up a conversation by origin URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<Conversation>>;

    /// Delete a conversation; messages and index entries cascade.
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Header-only listing for one platform, newest first.
    async fn get_conversations_by_platform(
        &self,
        platform: &str,
        limit: u32,
    ) -> Result<Vec<Conversation>>;

    /// Header-only listing across platforms, newest first.
    async fn get_recent_conversations(&self, limit: u32) -> Result<Vec<Conversation>>;

    /// Conversation counts grouped by platform.
    async fn get_conversation_count_by_platform(&self) -> Result<HashMap<String, u64>>;

    /// Execute a full-text match joined back to source rows.
    ///
    /// `match_expr` is a prebuilt FTS5 match expression; filters are
    /// appended conjunctively with bound parameters.
    async fn search_messages(
        &self,
        match_expr: &str,
        filters: &SearchFilters,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageMatch>>;

    /// Row counts and on-disk size of the backing store.
    async fn get_storage_stats(&self) -> Result<StorageStats>;

    /// Full logical dump: every conversation, newest first, with its
    /// position-ordered messages.
    async fn export_conversations(&self) -> Result<Vec<Conversation>>;

    /// Remove all messages then all conversations.
    async fn clear_all_data(&self) -> Result<()>;

    /// Rebuild the full-text index from scratch.
    ///
    /// The only path that corrects index entries left stale by
    /// content-changing upserts. Returns the number of messages
    /// actually indexed; per-message tokenization failures are skipped.
    async fn reindex_messages(&self) -> Result<u64>;
}

/// Black-box tokenizer contract.
///
/// Produces a space-delimited token string; empty input yields an
/// empty string, which callers must treat as "no searchable terms."
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<String>;
}
