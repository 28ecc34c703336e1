//! SQLite-based storage implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, ToSql};
use tracing::{debug, info, warn};

use chatvault_core::{
    Conversation, ConversationStore, Message, MessageMatch, Result, SearchFilters, StorageStats,
    Tokenizer, VaultError,
};

use crate::schema::SCHEMA;

const CONVERSATION_COLUMNS: &str =
    "id, platform, title, url, created_at, updated_at, message_count";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender, content, thinking, position, created_at, updated_at";

/// SQLite-based conversation store.
///
/// Owns its connection behind a blocking Mutex; the mutex serializes
/// writes while WAL mode keeps concurrent readers unblocked.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,

    /// Tokenizer used for index writes.
    tokenizer: Arc<dyn Tokenizer>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| VaultError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, tokenizer, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory(tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VaultError::database(format!("Failed to open in-memory database: {}", e)))?;

        Self::init(conn, tokenizer, Path::new(":memory:"))
    }

    /// Initialize the store with a connection.
    fn init(conn: Connection, tokenizer: Arc<dyn Tokenizer>, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| VaultError::database(format!("Failed to initialize schema: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tokenizer,
        })
    }

    /// Configure SQLite for durability and concurrent reads.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| VaultError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VaultError::database(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| VaultError::database(e.to_string()))?;
        f(&mut conn)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conversation = conversation.clone();
        let tokenizer = Arc::clone(&self.tokenizer);

        self.with_conn_mut(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| VaultError::database(e.to_string()))?;

            // Conversation upsert: platform and created_at are immutable
            // after creation; message_count is recomputed every save.
            tx.execute(
                r#"
                INSERT INTO conversations (id, platform, title, url, created_at, updated_at, message_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    url = excluded.url,
                    updated_at = excluded.updated_at,
                    message_count = excluded.message_count
                "#,
                params![
                    conversation.id,
                    conversation.platform,
                    conversation.title,
                    conversation.url,
                    conversation.created_at,
                    conversation.updated_at,
                    conversation.messages.len() as i64,
                ],
            )
            .map_err(|e| VaultError::database(format!("Failed to upsert conversation: {}", e)))?;

            for message in &conversation.messages {
                let exists: bool = tx
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
                        params![message.id],
                        |row| row.get(0),
                    )
                    .map_err(|e| VaultError::database(e.to_string()))?;

                // Message upsert: sender, conversation_id, and created_at
                // are immutable after creation.
                tx.execute(
                    r#"
                    INSERT INTO messages (id, conversation_id, sender, content, thinking, position, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO UPDATE SET
                        content = excluded.content,
                        thinking = excluded.thinking,
                        position = excluded.position,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        message.id,
                        message.conversation_id,
                        message.sender,
                        message.content,
                        message.thinking,
                        message.position,
                        message.created_at,
                        message.updated_at,
                    ],
                )
                .map_err(|e| VaultError::database(format!("Failed to upsert message: {}", e)))?;

                // Index entries are written once, at first insert. A
                // content-changing update leaves the entry stale until
                // the next full reindex.
                if !exists {
                    let tokens = tokenizer.tokenize(&message.content)?;
                    tx.execute(
                        "INSERT INTO messages_fts (message_id, content) VALUES (?1, ?2)",
                        params![message.id, tokens],
                    )
                    .map_err(|e| {
                        VaultError::database(format!("Failed to index message: {}", e))
                    })?;
                }
            }

            tx.commit()
                .map_err(|e| VaultError::database(e.to_string()))?;

            debug!(
                "Saved conversation {} with {} messages",
                conversation.id,
                conversation.messages.len()
            );
            Ok(())
        })
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations WHERE id = ?1",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| VaultError::database(e.to_string()))?;

            let conversation = stmt
                .query_row(params![id], Self::row_to_conversation)
                .optional()
                .map_err(|e| VaultError::database(e.to_string()))?;

            match conversation {
                Some(mut conversation) => {
                    conversation.messages = Self::messages_for(conn, &conversation.id)?;
                    Ok(Some(conversation))
                }
                None => Ok(None),
            }
        })
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Conversation>> {
        let url_owned = url.to_string();
        let id = self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id FROM conversations WHERE url = ?1 LIMIT 1",
                params![url_owned],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| VaultError::database(e.to_string()))
        })?;

        match id {
            Some(id) => self.get_conversation(&id).await,
            None => Ok(None),
        }
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            // Messages and their index entries go with the conversation:
            // FK cascade removes the rows, the delete trigger the index.
            let deleted = conn
                .execute("DELETE FROM conversations WHERE id = ?1", params![id])
                .map_err(|e| VaultError::database(e.to_string()))?;

            if deleted == 0 {
                return Err(VaultError::ConversationNotFound { id });
            }

            debug!("Deleted conversation: {}", id);
            Ok(())
        })
    }

    async fn get_conversations_by_platform(
        &self,
        platform: &str,
        limit: u32,
    ) -> Result<Vec<Conversation>> {
        let platform = platform.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {} FROM conversations
                    WHERE platform = ?1
                    ORDER BY updated_at DESC
                    LIMIT ?2
                    "#,
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| VaultError::database(e.to_string()))?;

            let conversations = stmt
                .query_map(params![platform, limit], Self::row_to_conversation)
                .map_err(|e| VaultError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VaultError::database(e.to_string()))?;

            Ok(conversations)
        })
    }

    async fn get_recent_conversations(&self, limit: u32) -> Result<Vec<Conversation>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations ORDER BY updated_at DESC LIMIT ?1",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| VaultError::database(e.to_string()))?;

            let conversations = stmt
                .query_map(params![limit], Self::row_to_conversation)
                .map_err(|e| VaultError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VaultError::database(e.to_string()))?;

            Ok(conversations)
        })
    }

    async fn get_conversation_count_by_platform(&self) -> Result<HashMap<String, u64>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT platform, COUNT(*) FROM conversations GROUP BY platform")
                .map_err(|e| VaultError::database(e.to_string()))?;

            let counts = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
                })
                .map_err(|e| VaultError::database(e.to_string()))?
                .collect::<std::result::Result<HashMap<_, _>, _>>()
                .map_err(|e| VaultError::database(e.to_string()))?;

            Ok(counts)
        })
    }

    async fn search_messages(
        &self,
        match_expr: &str,
        filters: &SearchFilters,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageMatch>> {
        let match_expr = match_expr.to_string();
        let filters = filters.clone();

        self.with_conn(move |conn| {
            let mut sql = String::from(
                r#"
                SELECT m.id, m.conversation_id, c.title, c.platform, m.sender, m.content, m.created_at
                FROM messages_fts
                JOIN messages m ON m.id = messages_fts.message_id
                JOIN conversations c ON c.id = m.conversation_id
                WHERE messages_fts MATCH ?
                "#,
            );
            let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(match_expr)];

            // Filters are conjunctive and always bound as parameters,
            // one placeholder per platform value.
            if let Some(platforms) = &filters.platform {
                if !platforms.is_empty() {
                    let placeholders = vec!["?"; platforms.len()].join(", ");
                    sql.push_str(&format!(" AND c.platform IN ({})", placeholders));
                    for platform in platforms {
                        values.push(Box::new(platform.clone()));
                    }
                }
            }

            if let Some(range) = &filters.date_range {
                sql.push_str(" AND m.created_at >= ? AND m.created_at <= ?");
                values.push(Box::new(range.start.clone()));
                values.push(Box::new(range.end.clone()));
            }

            if let Some(sender) = &filters.sender {
                sql.push_str(" AND m.sender = ?");
                values.push(Box::new(sender.clone()));
            }

            sql.push_str(" ORDER BY m.created_at DESC LIMIT ? OFFSET ?");
            values.push(Box::new(limit));
            values.push(Box::new(offset));

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| VaultError::database(e.to_string()))?;

            let bound: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let mut rows = stmt
                .query(bound.as_slice())
                .map_err(|e| VaultError::database(e.to_string()))?;

            let mut matches = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| VaultError::database(e.to_string()))?
            {
                let matched =
                    Self::row_to_match(row).map_err(|e| VaultError::database(e.to_string()))?;
                matches.push(matched);
            }

            debug!("FTS query returned {} rows", matches.len());
            Ok(matches)
        })
    }

    async fn get_storage_stats(&self) -> Result<StorageStats> {
        self.with_conn(|conn| {
            let conversations: u64 = conn
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
                .map_err(|e| VaultError::database(e.to_string()))?;

            let messages: u64 = conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| VaultError::database(e.to_string()))?;

            // Page count and page size give the on-disk size without
            // touching the filesystem.
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            let size_bytes = page_count * page_size;
            let size_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

            Ok(StorageStats {
                conversations,
                messages,
                size_bytes,
                size_mb,
            })
        })
    }

    async fn export_conversations(&self) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations ORDER BY updated_at DESC",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| VaultError::database(e.to_string()))?;

            let mut conversations = stmt
                .query_map([], Self::row_to_conversation)
                .map_err(|e| VaultError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VaultError::database(e.to_string()))?;

            for conversation in &mut conversations {
                conversation.messages = Self::messages_for(conn, &conversation.id)?;
            }

            info!("Exported {} conversations", conversations.len());
            Ok(conversations)
        })
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| VaultError::database(e.to_string()))?;

            // Messages first for referential cleanliness; the cascade
            // rule would cover them, but being explicit costs nothing.
            tx.execute("DELETE FROM messages", [])
                .map_err(|e| VaultError::database(e.to_string()))?;
            tx.execute("DELETE FROM conversations", [])
                .map_err(|e| VaultError::database(e.to_string()))?;

            tx.commit()
                .map_err(|e| VaultError::database(e.to_string()))?;

            warn!("Cleared all conversations and messages");
            Ok(())
        })
    }

    async fn reindex_messages(&self) -> Result<u64> {
        let tokenizer = Arc::clone(&self.tokenizer);

        self.with_conn_mut(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| VaultError::database(e.to_string()))?;

            tx.execute("DELETE FROM messages_fts", [])
                .map_err(|e| VaultError::database(e.to_string()))?;

            let mut indexed: u64 = 0;
            {
                let mut select = tx
                    .prepare("SELECT id, content FROM messages")
                    .map_err(|e| VaultError::database(e.to_string()))?;
                let mut insert = tx
                    .prepare("INSERT INTO messages_fts (message_id, content) VALUES (?1, ?2)")
                    .map_err(|e| VaultError::database(e.to_string()))?;

                let mut rows = select
                    .query([])
                    .map_err(|e| VaultError::database(e.to_string()))?;

                while let Some(row) = rows
                    .next()
                    .map_err(|e| VaultError::database(e.to_string()))?
                {
                    let id: String = row.get(0).map_err(|e| VaultError::database(e.to_string()))?;
                    let content: String =
                        row.get(1).map_err(|e| VaultError::database(e.to_string()))?;

                    // Per-row tokenization failures are skippable here,
                    // unlike the single-message path inside a save.
                    match tokenizer.tokenize(&content) {
                        Ok(tokens) => {
                            insert
                                .execute(params![id, tokens])
                                .map_err(|e| VaultError::database(e.to_string()))?;
                            indexed += 1;
                        }
                        Err(e) => {
                            warn!("Skipping message {} during reindex: {}", id, e);
                        }
                    }
                }
            }

            tx.commit()
                .map_err(|e| VaultError::database(e.to_string()))?;

            info!("Reindexed {} messages", indexed);
            Ok(indexed)
        })
    }
}

// Helper methods
impl SqliteStore {
    /// Convert a row to a Conversation header (no messages).
    fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
        Ok(Conversation {
            id: row.get(0)?,
            platform: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            message_count: row.get(6)?,
            messages: Vec::new(),
        })
    }

    /// Convert a row to a Message.
    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender: row.get(2)?,
            content: row.get(3)?,
            thinking: row.get(4)?,
            position: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Convert a joined FTS result row to a MessageMatch.
    fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageMatch> {
        Ok(MessageMatch {
            message_id: row.get(0)?,
            conversation_id: row.get(1)?,
            conversation_title: row.get(2)?,
            platform: row.get(3)?,
            sender: row.get(4)?,
            content: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    /// Load a conversation's messages ordered by position.
    fn messages_for(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY position ASC",
                MESSAGE_COLUMNS
            ))
            .map_err(|e| VaultError::database(e.to_string()))?;

        let messages = stmt
            .query_map(params![conversation_id], Self::row_to_message)
            .map_err(|e| VaultError::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VaultError::database(e.to_string()))?;

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatvault_core::{DateRange, SimpleTokenizer};

    /// Tokenizer that refuses content containing "poison".
    struct FlakyTokenizer;

    impl Tokenizer for FlakyTokenizer {
        fn tokenize(&self, text: &str) -> Result<String> {
            if text.contains("poison") {
                return Err(VaultError::tokenization("poisoned content"));
            }
            SimpleTokenizer.tokenize(text)
        }
    }

    fn store() -> SqliteStore {
        SqliteStore::open_memory(Arc::new(SimpleTokenizer)).unwrap()
    }

    fn message(id: &str, conversation_id: &str, sender: &str, content: &str, position: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            thinking: None,
            position,
            created_at: format!("2026-08-0{}T12:00:00Z", (position % 9) + 1),
            updated_at: format!("2026-08-0{}T12:00:00Z", (position % 9) + 1),
        }
    }

    fn conversation(id: &str, platform: &str, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: id.to_string(),
            platform: platform.to_string(),
            title: Some(format!("Title of {}", id)),
            url: Some(format!("https://{}.example/c/{}", platform, id)),
            created_at: "2026-08-01T00:00:00Z".to_string(),
            updated_at: "2026-08-01T00:00:00Z".to_string(),
            message_count: 0,
            messages,
        }
    }

    fn no_filters() -> SearchFilters {
        SearchFilters::default()
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = store();
        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversations, 0);
        assert_eq!(stats.messages, 0);
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let store = store();
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "hello there", 0),
                message("m2", "c1", "assistant", "hi, how can I help?", 1),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(loaded.platform, "chatgpt");
        assert_eq!(loaded.message_count, 2);
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].content, "hello there");
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = store();
        assert!(store.get_conversation("nope").await.unwrap().is_none());
        assert!(store.find_by_url("https://nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_ordered_by_position() {
        let store = store();
        // Insert out of order; positions are not contiguous.
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m3", "c1", "user", "third", 7),
                message("m1", "c1", "user", "first", 0),
                message("m2", "c1", "assistant", "second", 3),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        let contents: Vec<&str> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_upsert_idempotence() {
        let store = store();
        let mut conv = conversation(
            "c1",
            "chatgpt",
            vec![message("m1", "c1", "user", "original", 0)],
        );
        store.save_conversation(&conv).await.unwrap();

        conv.title = Some("Renamed".to_string());
        conv.messages[0].content = "edited".to_string();
        store.save_conversation(&conv).await.unwrap();

        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversations, 1);
        assert_eq!(stats.messages, 1);

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("Renamed"));
        assert_eq!(loaded.messages[0].content, "edited");
    }

    #[tokio::test]
    async fn test_sender_and_created_at_immutable_on_upsert() {
        let store = store();
        let mut conv = conversation(
            "c1",
            "chatgpt",
            vec![message("m1", "c1", "user", "hello", 0)],
        );
        store.save_conversation(&conv).await.unwrap();

        conv.messages[0].sender = "assistant".to_string();
        conv.messages[0].created_at = "2030-01-01T00:00:00Z".to_string();
        store.save_conversation(&conv).await.unwrap();

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(loaded.messages[0].sender, "user");
        assert!(loaded.messages[0].created_at.starts_with("2026"));
    }

    #[tokio::test]
    async fn test_message_count_reflects_last_save() {
        let store = store();
        let mut conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "one", 0),
                message("m2", "c1", "assistant", "two", 1),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        // Saving with a shorter list updates the cache, not a live count.
        conv.messages.truncate(1);
        store.save_conversation(&conv).await.unwrap();

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(loaded.message_count, 1);
        assert_eq!(loaded.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let store = store();
        let conv = conversation("c1", "claude", vec![message("m1", "c1", "user", "hey", 0)]);
        let url = conv.url.clone().unwrap();
        store.save_conversation(&conv).await.unwrap();

        let found = store.find_by_url(&url).await.unwrap().unwrap();
        assert_eq!(found.id, "c1");
        assert_eq!(found.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_messages_and_index() {
        let store = store();
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![message("m1", "c1", "user", "unique zanzibar keyword", 0)],
        );
        store.save_conversation(&conv).await.unwrap();

        let hits = store
            .search_messages("\"zanzibar\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        store.delete_conversation("c1").await.unwrap();

        assert!(store.get_conversation("c1").await.unwrap().is_none());
        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.messages, 0);

        let hits = store
            .search_messages("\"zanzibar\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_conversation_errors() {
        let store = store();
        let err = store.delete_conversation("ghost").await.unwrap_err();
        assert!(matches!(err, VaultError::ConversationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_listings_by_platform_and_recency() {
        let store = store();
        for (id, platform, updated) in [
            ("c1", "chatgpt", "2026-08-01T00:00:00Z"),
            ("c2", "claude", "2026-08-02T00:00:00Z"),
            ("c3", "chatgpt", "2026-08-03T00:00:00Z"),
        ] {
            let mut conv = conversation(id, platform, vec![]);
            conv.updated_at = updated.to_string();
            store.save_conversation(&conv).await.unwrap();
        }

        let chatgpt = store
            .get_conversations_by_platform("chatgpt", 10)
            .await
            .unwrap();
        let ids: Vec<&str> = chatgpt.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c1"]);

        let recent = store.get_recent_conversations(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c2"]);
    }

    #[tokio::test]
    async fn test_count_by_platform() {
        let store = store();
        for (id, platform) in [("c1", "chatgpt"), ("c2", "claude"), ("c3", "chatgpt")] {
            store
                .save_conversation(&conversation(id, platform, vec![]))
                .await
                .unwrap();
        }

        let counts = store.get_conversation_count_by_platform().await.unwrap();
        assert_eq!(counts.get("chatgpt"), Some(&2));
        assert_eq!(counts.get("claude"), Some(&1));
    }

    #[tokio::test]
    async fn test_storage_stats_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            SqliteStore::open(dir.path().join("vault.db"), Arc::new(SimpleTokenizer)).unwrap();

        store
            .save_conversation(&conversation(
                "c1",
                "chatgpt",
                vec![message("m1", "c1", "user", "hello disk", 0)],
            ))
            .await
            .unwrap();

        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversations, 1);
        assert_eq!(stats.messages, 1);
        assert!(stats.size_bytes > 0);
        assert!(stats.size_mb >= 0.0);
    }

    #[tokio::test]
    async fn test_export_conversations() {
        let store = store();
        let mut older = conversation("c1", "chatgpt", vec![message("m1", "c1", "user", "a", 0)]);
        older.updated_at = "2026-08-01T00:00:00Z".to_string();
        let mut newer = conversation("c2", "claude", vec![message("m2", "c2", "user", "b", 0)]);
        newer.updated_at = "2026-08-05T00:00:00Z".to_string();
        store.save_conversation(&older).await.unwrap();
        store.save_conversation(&newer).await.unwrap();

        let exported = store.export_conversations().await.unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].id, "c2");
        assert_eq!(exported[0].messages.len(), 1);
        assert_eq!(exported[1].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_data() {
        let store = store();
        store
            .save_conversation(&conversation(
                "c1",
                "chatgpt",
                vec![message("m1", "c1", "user", "wiped soon", 0)],
            ))
            .await
            .unwrap();

        store.clear_all_data().await.unwrap();

        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversations, 0);
        assert_eq!(stats.messages, 0);
        let hits = store
            .search_messages("\"wiped\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_index_once_then_reindex_corrects_staleness() {
        let store = store();
        let mut conv = conversation(
            "c1",
            "chatgpt",
            vec![message("m1", "c1", "user", "original quicksilver text", 0)],
        );
        store.save_conversation(&conv).await.unwrap();

        // Content edit on upsert leaves the index entry untouched.
        conv.messages[0].content = "replacement nightingale text".to_string();
        store.save_conversation(&conv).await.unwrap();

        let old = store
            .search_messages("\"quicksilver\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert_eq!(old.len(), 1);
        // The joined row carries the current content even while the
        // index is stale.
        assert_eq!(old[0].content, "replacement nightingale text");

        let new = store
            .search_messages("\"nightingale\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert!(new.is_empty());

        let count = store.reindex_messages().await.unwrap();
        assert_eq!(count, 1);

        assert!(store
            .search_messages("\"quicksilver\"*", &no_filters(), 10, 0)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .search_messages("\"nightingale\"*", &no_filters(), 10, 0)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_reindex_skips_untokenizable_rows() {
        let store = SqliteStore::open_memory(Arc::new(FlakyTokenizer)).unwrap();
        let mut conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "clean content", 0),
                message("m2", "c1", "assistant", "also clean", 1),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        // Poison one row via the update path, which never tokenizes.
        conv.messages[1].content = "now poison".to_string();
        store.save_conversation(&conv).await.unwrap();

        let count = store.reindex_messages().await.unwrap();
        assert_eq!(count, 1);

        let hits = store
            .search_messages("\"clean\"*", &no_filters(), 10, 0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_save_atomicity_under_failure() {
        let store = SqliteStore::open_memory(Arc::new(FlakyTokenizer)).unwrap();
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "one", 0),
                message("m2", "c1", "assistant", "two", 1),
                message("m3", "c1", "user", "three poison", 2),
                message("m4", "c1", "assistant", "four", 3),
                message("m5", "c1", "user", "five", 4),
            ],
        );

        let err = store.save_conversation(&conv).await.unwrap_err();
        assert!(matches!(err, VaultError::Tokenization { .. }));

        // Nothing from the failed save is observable.
        assert!(store.get_conversation("c1").await.unwrap().is_none());
        let stats = store.get_storage_stats().await.unwrap();
        assert_eq!(stats.conversations, 0);
        assert_eq!(stats.messages, 0);
    }

    #[tokio::test]
    async fn test_search_filter_composition() {
        let store = store();
        let mut gpt = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "rust borrow checker", 0),
                message("m2", "c1", "assistant", "rust lifetimes explained", 1),
            ],
        );
        gpt.updated_at = "2026-08-02T00:00:00Z".to_string();
        let claude = conversation(
            "c2",
            "claude",
            vec![message("m3", "c2", "user", "rust async pitfalls", 0)],
        );
        store.save_conversation(&gpt).await.unwrap();
        store.save_conversation(&claude).await.unwrap();

        let filters = SearchFilters {
            platform: Some(vec!["chatgpt".to_string()]),
            date_range: None,
            sender: Some("user".to_string()),
        };
        let hits = store
            .search_messages("\"rust\"*", &filters, 10, 0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "m1");
        assert_eq!(hits[0].platform, "chatgpt");
    }

    #[tokio::test]
    async fn test_search_date_range_inclusive() {
        let store = store();
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "alpha report", 1),
                message("m2", "c1", "user", "alpha report", 4),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        let filters = SearchFilters {
            platform: None,
            date_range: Some(DateRange {
                start: "2026-08-02T12:00:00Z".to_string(),
                end: "2026-08-05T12:00:00Z".to_string(),
            }),
            sender: None,
        };
        let hits = store
            .search_messages("\"alpha\"*", &filters, 10, 0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_search_pagination_and_order() {
        let store = store();
        let conv = conversation(
            "c1",
            "chatgpt",
            vec![
                message("m1", "c1", "user", "pagination subject", 1),
                message("m2", "c1", "user", "pagination subject", 2),
                message("m3", "c1", "user", "pagination subject", 3),
            ],
        );
        store.save_conversation(&conv).await.unwrap();

        let page = store
            .search_messages("\"pagination\"*", &no_filters(), 2, 0)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        // Newest first.
        assert_eq!(page[0].message_id, "m3");

        let rest = store
            .search_messages("\"pagination\"*", &no_filters(), 2, 2)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message_id, "m1");
    }
}
