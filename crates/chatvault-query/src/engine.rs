//! Search engine over the full-text index.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use chatvault_core::{
    ConversationStore, SearchConfig, SearchHit, SearchQuery, SearchResults, Tokenizer,
};

use crate::snippet::generate_snippet;

/// Filtered, paginated full-text search with highlighted snippets.
///
/// Search never returns an error to the caller: failures degrade to an
/// empty result set with the reason recorded on
/// [`SearchResults::degraded`], so callers and telemetry can still
/// observe them.
pub struct SearchEngine<S> {
    /// Storage backend.
    store: Arc<S>,

    /// Tokenizer shared with the indexing side.
    tokenizer: Arc<dyn Tokenizer>,

    /// Limits and snippet sizing.
    config: SearchConfig,
}

impl<S> SearchEngine<S>
where
    S: ConversationStore,
{
    /// Create a new search engine with default configuration.
    pub fn new(store: Arc<S>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::with_config(store, tokenizer, SearchConfig::default())
    }

    /// Create a new search engine with explicit configuration.
    pub fn with_config(store: Arc<S>, tokenizer: Arc<dyn Tokenizer>, config: SearchConfig) -> Self {
        Self {
            store,
            tokenizer,
            config,
        }
    }

    /// Execute a search request.
    pub async fn search(&self, query: &SearchQuery) -> SearchResults {
        let start = Instant::now();

        let tokens = match self.tokenizer.tokenize(&query.keyword) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Keyword tokenization failed: {}", e);
                return SearchResults::degraded(&query.keyword, e.to_string());
            }
        };

        let tokens: Vec<String> = tokens.split_whitespace().map(String::from).collect();
        if tokens.is_empty() {
            // Nothing searchable; an empty result, not an error, and
            // storage is never touched.
            debug!("Keyword {:?} produced no tokens", query.keyword);
            return SearchResults::empty(&query.keyword);
        }

        let match_expr = build_match_expr(&tokens);
        let limit = query
            .options
            .limit
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit);
        let offset = query.options.offset.unwrap_or(0);

        debug!("FTS match expression: {}", match_expr);

        let rows = match self
            .store
            .search_messages(&match_expr, &query.filters, limit, offset)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Search query failed: {}", e);
                return SearchResults::degraded(&query.keyword, e.to_string());
            }
        };

        let keywords: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| SearchHit {
                snippet: generate_snippet(&row.content, &keywords, self.config.snippet_max_length),
                message_id: row.message_id,
                conversation_id: row.conversation_id,
                conversation_title: row.conversation_title,
                platform: row.platform,
                sender: row.sender,
                content: row.content,
                created_at: row.created_at,
            })
            .collect();

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            "Search for {:?} returned {} hits in {}ms",
            query.keyword,
            hits.len(),
            latency_ms
        );

        SearchResults {
            keyword: query.keyword.clone(),
            total: hits.len(),
            latency_ms,
            degraded: None,
            hits,
        }
    }
}

/// Build an FTS5 match expression from tokens.
///
/// Each token becomes a quoted prefix term; terms are OR'd so any
/// matching token surfaces a candidate (recall over precision).
fn build_match_expr(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}
