use std::path::Path;
use std::sync::Arc;

use crate::adblock::AdBlocker;
use crate::app::{AppContext, Result, StorylineError};
use crate::daemon::{daemon_status, stop_daemon, Daemon, DaemonConfig};
use crate::domain::Item;
use crate::fetcher::reconciler::Depth;
use crate::fetcher::{CacheMode, ContentSource, StoryFilter};
use crate::sync::{ChannelListener, SyncEvent, SyncJob, SyncOutcome};

pub async fn show_item(ctx: &AppContext, id: &str, mode: CacheMode, comments: bool) -> Result<()> {
    let item = ctx.load_item(id, mode).await?;
    print_item(&item);

    if !comments {
        return Ok(());
    }

    let report = ctx
        .reconciler
        .reconcile(&ctx.tree, id, Depth::Unlimited, mode, |_, _| {})
        .await?;

    let tree = ctx.tree.lock().await;
    for comment in tree.flatten(id) {
        let indent = "  ".repeat(comment.level.saturating_sub(1));
        if let Some(ref error) = comment.fetch_error {
            println!("{}[failed to load: {}]", indent, error);
            continue;
        }
        let remote = comment.remote();
        if remote.deleted || remote.dead {
            println!("{}[deleted]", indent);
            continue;
        }
        println!(
            "{}{}:",
            indent,
            remote.by.as_deref().unwrap_or("[unknown]")
        );
        let text = html_escape::decode_html_entities(remote.text.as_deref().unwrap_or(""))
            .replace("<p>", "\n");
        for line in text.lines() {
            println!("{}  {}", indent, line);
        }
    }

    if report.failed > 0 {
        eprintln!("{} of {} comments failed to load", report.failed, report.total);
    }
    Ok(())
}

pub async fn list_stories(
    ctx: &AppContext,
    filter: StoryFilter,
    mode: CacheMode,
    limit: usize,
) -> Result<()> {
    let ids = ctx.client.fetch_story_ids(filter, mode).await?;
    if ids.is_empty() {
        println!("No {} stories", filter);
        return Ok(());
    }

    let ids: Vec<String> = ids.into_iter().take(limit).collect();
    let stories = ctx.client.fetch_items(&ids, mode).await;

    for (rank, story) in stories.iter().enumerate() {
        let marker = if story.local().viewed { " " } else { "●" };
        let star = if story.local().favorite { "★" } else { " " };
        println!(
            "{:>3}. {}{} {} ({})",
            rank + 1,
            marker,
            star,
            story.display_title(),
            story.source().unwrap_or_else(|| "self".to_string())
        );
        println!(
            "        {} points by {} | {} comments | id {}",
            story.remote().score,
            story.remote().by.as_deref().unwrap_or("?"),
            story.remote().descendants.unwrap_or(0),
            story.id()
        );
    }
    Ok(())
}

pub async fn sync(
    ctx: &AppContext,
    id: Option<String>,
    no_article: bool,
    no_comments: bool,
    readability: bool,
) -> Result<()> {
    let settings = &ctx.config.sync;
    let mut job = SyncJob::from_settings(id, settings);
    if no_article {
        job = job.with_article(false);
    }
    if no_comments {
        job = job.with_comments(false);
    }
    if readability {
        job = job.with_readability(true);
    }

    let (listener, mut events) = ChannelListener::channel();
    ctx.sync.add_listener(Arc::new(listener));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SyncEvent::Progress { job_id, percent } => {
                    tracing::debug!("{}: {}%", job_id, percent)
                }
                SyncEvent::Done { job_id } => println!("  ✓ {}", job_id),
            }
        }
    });

    let outcomes = ctx.sync.perform_sync(job).await?;
    if outcomes.is_empty() {
        println!("Sync queue is empty");
    }
    for (id, outcome) in &outcomes {
        match outcome {
            SyncOutcome::Completed => {}
            SyncOutcome::Abandoned => println!("  - {} skipped (offline), still queued", id),
            SyncOutcome::Incomplete => println!("  ! {} incomplete, still queued", id),
            SyncOutcome::Dropped => println!("  x {} could not be synced, removed", id),
        }
    }

    // Dropping the sender lets the printer drain and exit
    ctx.sync.clear_listeners();
    if let Err(e) = printer.await {
        tracing::error!("Progress printer failed: {}", e);
    }

    let completed = outcomes
        .iter()
        .filter(|(_, o)| *o == SyncOutcome::Completed)
        .count();
    println!("Synced {} of {} items", completed, outcomes.len());
    Ok(())
}

pub fn list_queue(ctx: &AppContext) -> Result<()> {
    let ids = ctx.sync.queue().list_all()?;
    if ids.is_empty() {
        println!("Sync queue is empty");
        return Ok(());
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub async fn add_favorite(ctx: &AppContext, id: &str) -> Result<()> {
    let handle = ctx.add_favorite(id).await?;
    println!("Added {} to favorites", id);

    match handle.await {
        Ok(SyncOutcome::Completed) => println!("Synced for offline reading"),
        Ok(outcome) if outcome.is_queued() => println!("Queued for offline reading"),
        Ok(_) => {}
        Err(e) => tracing::error!("Sync task failed: {}", e),
    }
    Ok(())
}

pub async fn remove_favorite(ctx: &AppContext, id: &str) -> Result<()> {
    if ctx.remove_favorite(id).await? {
        println!("Removed {} from favorites", id);
    } else {
        println!("{} is not a favorite", id);
    }
    Ok(())
}

pub fn list_favorites(ctx: &AppContext, query: Option<&str>) -> Result<()> {
    let stories = ctx.favorites.list(query)?;
    if stories.is_empty() {
        println!("No favorites");
        return Ok(());
    }
    for story in stories {
        println!(
            "{} {}\n  {}",
            story.time.format("%Y-%m-%d"),
            story.title,
            story.url
        );
    }
    Ok(())
}

pub fn export_favorites(ctx: &AppContext, path: &Path, query: Option<&str>) -> Result<()> {
    let count = ctx.favorites.export(path, query)?;
    println!("Exported {} favorites to {}", count, path.display());
    Ok(())
}

pub fn clear_favorites(ctx: &AppContext, query: Option<&str>) -> Result<()> {
    let count = ctx.favorites.clear(query)?;
    println!("Removed {} favorites", count);
    Ok(())
}

pub async fn view_item(ctx: &AppContext, id: &str) -> Result<()> {
    let item = ctx.view(id, CacheMode::CacheOnly).await?;
    print_item(&item);
    if let Some(text) = ctx.readable(id)? {
        println!("\n{}", text);
    }
    Ok(())
}

pub async fn open_item(ctx: &AppContext, id: &str, comments: bool) -> Result<()> {
    let item = ctx.view(id, CacheMode::CacheOnly).await?;
    let url = if comments { item.web_url() } else { item.url() };
    open::that(&url)?;
    println!("Opened {}", url);
    Ok(())
}

pub fn check_adblock(ctx: &AppContext, target: &str, hosts: Option<&Path>) -> Result<()> {
    let loaded;
    let blocker = match hosts {
        Some(path) => {
            loaded = AdBlocker::load(path)?;
            &loaded
        }
        None => ctx.adblock.as_ref(),
    };

    let blocked = if target.contains("://") {
        blocker.is_ad(target)
    } else {
        blocker.is_ad_host(target)
    };
    println!("{}: {}", target, if blocked { "blocked" } else { "allowed" });
    Ok(())
}

pub async fn start_daemon(
    ctx: Arc<AppContext>,
    interval: &str,
    no_initial_update: bool,
    log: Option<std::path::PathBuf>,
    foreground: bool,
) -> Result<()> {
    let update_interval_secs =
        DaemonConfig::parse_interval(interval).map_err(StorylineError::Config)?;

    if !foreground {
        return spawn_detached();
    }

    let daemon = Daemon::new(
        ctx,
        DaemonConfig {
            update_interval_secs,
            update_on_start: !no_initial_update,
            log_file: log,
        },
    );
    daemon.run().await
}

/// Re-launch this binary with the same arguments plus `--foreground`,
/// with no terminal attached.
fn spawn_detached() -> Result<()> {
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;
    let child = Command::new(exe)
        .args(std::env::args_os().skip(1))
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    println!("Daemon started (PID: {})", child.id());
    Ok(())
}

pub fn stop() -> Result<()> {
    stop_daemon().map_err(StorylineError::Other)?;
    println!("Daemon stopped");
    Ok(())
}

pub fn status() {
    println!("{}", daemon_status());
}

fn print_item(item: &Item) {
    let remote = item.remote();
    println!("{}", item.display_title());
    if let Some(ref url) = remote.url {
        println!("  {}", url);
    }
    println!(
        "  {} | {} points by {} | {} comments{}",
        item.created_at()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        remote.score,
        remote.by.as_deref().unwrap_or("?"),
        remote.descendants.unwrap_or(item.kid_count() as i64),
        if item.local().favorite { " | ★" } else { "" }
    );
    if let Some(ref text) = remote.text {
        println!("\n{}", html_escape::decode_html_entities(text).replace("<p>", "\n\n"));
    }
}
