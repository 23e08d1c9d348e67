use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyline::app::AppContext;
use storyline::cli::{commands, AdblockAction, Cli, Commands, DaemonAction, FavoriteAction};
use storyline::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Daemon control does not need a database
    if let Commands::Daemon { action } = &cli.command {
        match action {
            DaemonAction::Stop => return Ok(commands::stop()?),
            DaemonAction::Status => {
                commands::status();
                return Ok(());
            }
            DaemonAction::Start { .. } => {}
        }
    }

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config, cli.db.clone())?;

    match cli.command {
        Commands::Item { id, mode, comments } => {
            commands::show_item(&ctx, &id, mode, comments).await?;
        }
        Commands::Stories {
            filter,
            mode,
            limit,
        } => {
            commands::list_stories(&ctx, filter, mode, limit).await?;
        }
        Commands::Sync {
            id,
            no_article,
            no_comments,
            readability,
        } => {
            commands::sync(&ctx, id, no_article, no_comments, readability).await?;
        }
        Commands::Queue => {
            commands::list_queue(&ctx)?;
        }
        Commands::Favorite { action } => match action {
            FavoriteAction::Add { id } => commands::add_favorite(&ctx, &id).await?,
            FavoriteAction::Remove { id } => commands::remove_favorite(&ctx, &id).await?,
            FavoriteAction::List { query } => commands::list_favorites(&ctx, query.as_deref())?,
            FavoriteAction::Export { path, query } => {
                commands::export_favorites(&ctx, &path, query.as_deref())?
            }
            FavoriteAction::Clear { query } => commands::clear_favorites(&ctx, query.as_deref())?,
        },
        Commands::View { id } => {
            commands::view_item(&ctx, &id).await?;
        }
        Commands::Open { id, comments } => {
            commands::open_item(&ctx, &id, comments).await?;
        }
        Commands::Adblock { action } => match action {
            AdblockAction::Check { target, hosts } => {
                commands::check_adblock(&ctx, &target, hosts.as_deref())?
            }
        },
        Commands::Daemon { action } => {
            if let DaemonAction::Start {
                interval,
                no_initial_update,
                log,
                foreground,
            } = action
            {
                commands::start_daemon(Arc::new(ctx), &interval, no_initial_update, log, foreground)
                    .await?;
            }
        }
    }

    Ok(())
}
