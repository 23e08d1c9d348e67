//! # Storyline
//!
//! An offline-first Hacker News client core.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Normalizer → Item model → Tree reconciler
//!                 ↓                         ↓
//!           Response cache          Sync orchestrator → Sync queue
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Top stories, served from cache when possible
//! storyline stories top --mode cache
//!
//! # A story with its whole comment tree
//! storyline item 8863 --comments
//!
//! # Favorite a story; it is synced for offline reading
//! storyline favorite add 8863
//!
//! # Retry everything still queued
//! storyline sync
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, content client, reconciler, sync orchestrator, ad blocker.
pub mod app;

/// Configuration loaded from `~/.config/storyline/config.toml`.
pub mod config;

/// Background daemon that replays the sync queue on an interval.
///
/// - `storyline daemon start` - Start the background syncer
/// - `storyline daemon stop` - Stop the daemon
/// - `storyline daemon status` - Check if daemon is running
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`Item`](domain::Item): revisioned node with disjoint remote/local state
/// - [`ItemTree`](domain::ItemTree): in-memory materialized content tree
/// - [`SavedStory`](domain::SavedStory): favorite record
pub mod domain;

/// Fetching with conditional requests and cache modes.
///
/// - [`Fetcher`](fetcher::Fetcher): raw conditional GET
/// - [`HackerNewsClient`](fetcher::client::HackerNewsClient): cache-mode aware content source
/// - [`TreeReconciler`](fetcher::reconciler::TreeReconciler): bounded-concurrency tree fetch
/// - [`HttpArticleLoader`](fetcher::article::HttpArticleLoader): article download with progress
pub mod fetcher;

/// API payload decoding.
pub mod normalizer;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Readability extraction with headless Chrome.
pub mod scraper;

/// Sync jobs, their durable queue and the orchestrator driving them.
pub mod sync;

/// Host-name ad blocking with a suffix trie.
pub mod adblock;

/// Favorites and read markers.
pub mod local;
