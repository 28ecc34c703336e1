//! chatvault CLI - Command-line interface for the conversation store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use chatvault_core::{
    Conversation, ConversationStore, DateRange, SearchQuery, SimpleTokenizer,
};
use chatvault_query::SearchEngine;
use chatvault_store::SqliteStore;

/// chatvault - Searchable archive for chat conversations
#[derive(Parser)]
#[command(name = "chatvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (default: ~/.chatvault/chatvault.db)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Save conversations from a JSON file (single object or array)
    Save {
        /// Path to the JSON file
        path: PathBuf,
    },

    /// Print one conversation with its messages
    Get {
        /// Conversation id
        id: String,
    },

    /// Look up a conversation by its origin URL
    FindUrl {
        /// Origin URL
        url: String,
    },

    /// Delete a conversation and its messages
    Delete {
        /// Conversation id
        id: String,
    },

    /// List recent conversations
    Recent {
        /// Maximum number of conversations
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Restrict to one platform
        #[arg(short, long)]
        platform: Option<String>,
    },

    /// Show conversation counts per platform
    Platforms,

    /// Full-text search across message content
    Search {
        /// Search keyword(s)
        keyword: String,

        /// Restrict to these platforms (repeatable)
        #[arg(short, long)]
        platform: Vec<String>,

        /// Restrict to one sender ("user", "assistant", ...)
        #[arg(short, long)]
        sender: Option<String>,

        /// Inclusive lower bound on message timestamp
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper bound on message timestamp
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of hits
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Number of hits to skip
        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Show storage statistics
    Stats,

    /// Dump every conversation as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild the full-text index from message content
    Reindex,

    /// Delete all conversations and messages
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn get_db_path(db: Option<PathBuf>) -> PathBuf {
    if let Some(path) = db {
        return path;
    }

    // Default to ~/.chatvault/chatvault.db
    let home = dirs::home_dir().expect("Could not determine home directory");
    home.join(".chatvault").join("chatvault.db")
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn open_store(db_path: &PathBuf) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let store = SqliteStore::open(db_path, Arc::new(SimpleTokenizer))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let db_path = get_db_path(cli.database);

    match cli.command {
        Commands::Init => {
            let _store = open_store(&db_path)?;
            println!("Initialized database at: {}", db_path.display());
        }
        Commands::Save { path } => {
            let store = open_store(&db_path)?;
            save(store.as_ref(), &path).await?;
        }
        Commands::Get { id } => {
            let store = open_store(&db_path)?;
            match store.get_conversation(&id).await? {
                Some(conversation) => print_json(&conversation)?,
                None => {
                    eprintln!("No conversation with id: {}", id);
                    std::process::exit(1);
                }
            }
        }
        Commands::FindUrl { url } => {
            let store = open_store(&db_path)?;
            match store.find_by_url(&url).await? {
                Some(conversation) => print_json(&conversation)?,
                None => {
                    eprintln!("No conversation with url: {}", url);
                    std::process::exit(1);
                }
            }
        }
        Commands::Delete { id } => {
            let store = open_store(&db_path)?;
            store.delete_conversation(&id).await?;
            println!("Deleted conversation: {}", id);
        }
        Commands::Recent { limit, platform } => {
            let store = open_store(&db_path)?;
            let conversations = match platform {
                Some(platform) => {
                    store
                        .get_conversations_by_platform(&platform, limit)
                        .await?
                }
                None => store.get_recent_conversations(limit).await?,
            };
            for conversation in &conversations {
                println!(
                    "{}  [{}]  {}  ({} messages)",
                    conversation.updated_at,
                    conversation.platform,
                    conversation.title.as_deref().unwrap_or("(untitled)"),
                    conversation.message_count
                );
            }
        }
        Commands::Platforms => {
            let store = open_store(&db_path)?;
            let counts = store.get_conversation_count_by_platform().await?;
            let mut counts: Vec<_> = counts.into_iter().collect();
            counts.sort();
            for (platform, count) in counts {
                println!("{}: {}", platform, count);
            }
        }
        Commands::Search {
            keyword,
            platform,
            sender,
            from,
            to,
            limit,
            offset,
        } => {
            let store = open_store(&db_path)?;
            search(store, keyword, platform, sender, from, to, limit, offset).await;
        }
        Commands::Stats => {
            let store = open_store(&db_path)?;
            let stats = store.get_storage_stats().await?;
            println!("Conversations: {}", stats.conversations);
            println!("Messages:      {}", stats.messages);
            println!("Size:          {} bytes ({} MB)", stats.size_bytes, stats.size_mb);
        }
        Commands::Export { output } => {
            let store = open_store(&db_path)?;
            let conversations = store.export_conversations().await?;
            let json = serde_json::to_string_pretty(&conversations)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    println!(
                        "Exported {} conversations to {}",
                        conversations.len(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
        }
        Commands::Reindex => {
            let store = open_store(&db_path)?;
            let count = store.reindex_messages().await?;
            println!("Reindexed {} messages", count);
        }
        Commands::Clear { yes } => {
            if !yes {
                eprintln!("This deletes every conversation. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            let store = open_store(&db_path)?;
            store.clear_all_data().await?;
            println!("All data cleared");
        }
    }

    Ok(())
}

async fn save(store: &SqliteStore, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;

    // Accept either one conversation or an array of them.
    let conversations: Vec<Conversation> = match serde_json::from_str(&content) {
        Ok(list) => list,
        Err(_) => vec![serde_json::from_str::<Conversation>(&content)?],
    };

    for conversation in &conversations {
        store.save_conversation(conversation).await?;
        println!(
            "Saved {} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn search(
    store: Arc<SqliteStore>,
    keyword: String,
    platform: Vec<String>,
    sender: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: u32,
    offset: u32,
) {
    let engine = SearchEngine::new(store, Arc::new(SimpleTokenizer));

    let mut query = SearchQuery {
        keyword,
        ..Default::default()
    };
    if !platform.is_empty() {
        query.filters.platform = Some(platform);
    }
    query.filters.sender = sender;
    if let (Some(start), Some(end)) = (from, to) {
        query.filters.date_range = Some(DateRange { start, end });
    }
    query.options.limit = Some(limit);
    query.options.offset = Some(offset);

    let results = engine.search(&query).await;

    if let Some(reason) = &results.degraded {
        eprintln!("Search degraded: {}", reason);
        std::process::exit(1);
    }

    for hit in &results.hits {
        println!(
            "{}  [{}]  {}  ({})",
            hit.created_at,
            hit.platform,
            hit.conversation_title.as_deref().unwrap_or("(untitled)"),
            hit.sender
        );
        println!("    {}", hit.snippet);
    }
    println!(
        "\n{} hit(s) in {}ms",
        results.total, results.latency_ms
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
