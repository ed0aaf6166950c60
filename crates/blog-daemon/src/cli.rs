//! CLI argument parsing for blogctl.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Blog engine control tool
///
/// Manages users and posts, runs full-text searches and background exports.
#[derive(Parser, Debug)]
#[command(name = "blogctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (layered over ~/.config/blog/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Override search index directory
    #[arg(long, global = true)]
    pub search_index_path: Option<String>,

    /// Run without a text index
    #[arg(long, global = true)]
    pub no_search: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Write, edit and delete posts
    #[command(subcommand)]
    Post(PostCommands),

    /// Full-text search over posts
    Search {
        /// Query text
        query: String,

        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u64,

        /// Results per page (default from config)
        #[arg(long)]
        per_page: Option<u64>,
    },

    /// Rebuild the post index from the database
    Reindex {
        /// Stop at the first failing post
        #[arg(long)]
        fail_fast: bool,
    },

    /// Export a user's posts as JSON
    Export {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Poll interval while waiting for the job (milliseconds)
        #[arg(long, default_value = "200")]
        poll_ms: u64,
    },

    /// List a user's unfinished tasks
    Tasks {
        /// Username
        #[arg(short, long)]
        user: String,
    },

    /// Show database statistics
    Stats,
}

/// User subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommands {
    /// Register a user
    Add {
        username: String,
        email: String,

        #[arg(long)]
        about_me: Option<String>,
    },
}

/// Post subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PostCommands {
    /// Write a new post
    Add {
        /// Author username
        #[arg(short, long)]
        user: String,

        body: String,

        /// Language code of the post
        #[arg(long)]
        language: Option<String>,
    },

    /// Replace the body of a post
    Edit { id: u64, body: String },

    /// Delete a post
    Delete { id: u64 },
}
