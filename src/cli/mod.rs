pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::fetcher::{CacheMode, StoryFilter};

#[derive(Parser)]
#[command(name = "storyline")]
#[command(about = "An offline-first Hacker News reader", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/storyline/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (default: <data dir>/storyline/storyline.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show an item, optionally with its comment tree
    Item {
        id: String,

        /// Fetch policy: default, cache or network
        #[arg(short, long, default_value_t = CacheMode::Default)]
        mode: CacheMode,

        /// Fetch and print the whole comment tree
        #[arg(long)]
        comments: bool,
    },
    /// List stories: top, new, ask, show, jobs or best
    Stories {
        #[arg(default_value_t = StoryFilter::Top)]
        filter: StoryFilter,

        #[arg(short, long, default_value_t = CacheMode::Default)]
        mode: CacheMode,

        #[arg(short, long, default_value_t = 30)]
        limit: usize,
    },
    /// Sync an item for offline reading, or replay the queue if no id is given
    Sync {
        id: Option<String>,

        /// Skip the article download
        #[arg(long)]
        no_article: bool,

        /// Skip the comment tree
        #[arg(long)]
        no_comments: bool,

        /// Extract readable text from the article
        #[arg(long)]
        readability: bool,
    },
    /// List pending sync jobs
    Queue,
    /// Manage favorites
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },
    /// Mark an item as viewed and print it
    View { id: String },
    /// Open an item in the browser
    Open {
        id: String,

        /// Open the discussion page instead of the article
        #[arg(long)]
        comments: bool,
    },
    /// Ad host list
    Adblock {
        #[command(subcommand)]
        action: AdblockAction,
    },
    /// Background daemon for periodic sync
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum FavoriteAction {
    /// Save an item and queue it for offline sync
    Add { id: String },
    /// Remove an item from favorites
    Remove { id: String },
    /// List favorites, optionally filtered by title
    List { query: Option<String> },
    /// Write favorites to a text file
    Export {
        path: PathBuf,

        /// Only export favorites whose title matches
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Remove all favorites, optionally only those matching a title filter
    Clear { query: Option<String> },
}

#[derive(Subcommand)]
pub enum AdblockAction {
    /// Check whether a host or URL is blocked
    Check {
        target: String,

        /// Host list to check against instead of the configured one
        #[arg(long)]
        hosts: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the background daemon
    Start {
        /// Sync interval (e.g., "30m", "1h", "1d")
        #[arg(short, long, default_value = "30m")]
        interval: String,

        /// Skip initial sync on start
        #[arg(long)]
        no_initial_update: bool,

        /// Log file path (default: stdout)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Run in foreground (don't detach)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
