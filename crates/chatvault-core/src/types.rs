//! Core domain types for the conversation store.

use serde::{Deserialize, Serialize};

/// A conversation captured from a chat platform.
///
/// Ids and timestamps are caller-supplied; the store never generates
/// them. Timestamps are string-encoded (RFC 3339 style) and compared
/// lexically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable unique identifier.
    pub id: String,

    /// Source platform tag (e.g. "chatgpt", "claude").
    pub platform: String,

    /// Conversation title, if any.
    pub title: Option<String>,

    /// Origin URL, used for lookup-by-origin.
    pub url: Option<String>,

    /// Creation timestamp.
    pub created_at: String,

    /// Last update timestamp.
    pub updated_at: String,

    /// Cached message list length, recomputed on every save.
    #[serde(default)]
    pub message_count: u32,

    /// Messages belonging to this conversation.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A single message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: String,

    /// Parent conversation id.
    pub conversation_id: String,

    /// Message sender ("user", "assistant", ...).
    pub sender: String,

    /// Text body; the only indexed field.
    pub content: String,

    /// Optional auxiliary reasoning text, not indexed.
    #[serde(default)]
    pub thinking: Option<String>,

    /// Display order within the conversation. Not assumed contiguous.
    pub position: i64,

    /// Creation timestamp.
    pub created_at: String,

    /// Last update timestamp.
    pub updated_at: String,
}

/// A full-text search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search text; tokenized before matching.
    pub keyword: String,

    /// Optional conjunctive filters.
    #[serde(default)]
    pub filters: SearchFilters,

    /// Pagination options.
    #[serde(default)]
    pub options: SearchOptions,
}

/// Optional filters applied on top of the keyword match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Allowed platform tags. `None` (or empty) means no constraint.
    #[serde(default)]
    pub platform: Option<Vec<String>>,

    /// Inclusive bounds on message `created_at`.
    #[serde(default)]
    pub date_range: Option<DateRange>,

    /// Exact sender match.
    #[serde(default)]
    pub sender: Option<String>,
}

/// Inclusive timestamp range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Pagination options for search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum hits to return (default 20, clamped by config).
    #[serde(default)]
    pub limit: Option<u32>,

    /// Number of hits to skip (default 0).
    #[serde(default)]
    pub offset: Option<u32>,
}

/// A raw matched message row joined with its conversation, as returned
/// by the storage layer before snippet generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMatch {
    pub message_id: String,
    pub conversation_id: String,
    pub conversation_title: Option<String>,
    pub platform: String,
    pub sender: String,
    pub content: String,
    pub created_at: String,
}

/// A single search hit with its highlighted snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub message_id: String,
    pub conversation_id: String,
    pub conversation_title: Option<String>,
    pub platform: String,
    pub sender: String,
    pub content: String,
    pub snippet: String,
    pub created_at: String,
}

/// Search results container.
///
/// `degraded` distinguishes "query failed, fell back to empty" from an
/// empty-but-successful search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original keyword.
    pub keyword: String,

    /// Total hits returned.
    pub total: usize,

    /// Search latency in milliseconds.
    pub latency_ms: u64,

    /// Failure reason when the search degraded to an empty result.
    pub degraded: Option<String>,

    /// Individual hits.
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    /// An empty, successful result for the given keyword.
    pub fn empty(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            total: 0,
            latency_ms: 0,
            degraded: None,
            hits: Vec::new(),
        }
    }

    /// An empty result marking the search as failed.
    pub fn degraded(keyword: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            total: 0,
            latency_ms: 0,
            degraded: Some(reason.into()),
            hits: Vec::new(),
        }
    }
}

/// Statistics about the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of conversations.
    pub conversations: u64,

    /// Number of messages.
    pub messages: u64,

    /// Database size in bytes.
    pub size_bytes: u64,

    /// Database size in megabytes, rounded to two decimals.
    pub size_mb: f64,
}
