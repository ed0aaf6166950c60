//! Command implementations for blogctl.
//!
//! Every command runs against an [`AppContext`]; writes go through a store
//! session so the registered search listener keeps the index in sync.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use blog_indexing::{reindex, LoggingProgressCallback, ReindexConfig};
use blog_types::{Post, Settings, TaskKind, User};

use crate::cli::{Cli, Commands, PostCommands, UserCommands};
use crate::context::AppContext;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(db_path) = &cli.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(path) = &cli.search_index_path {
        settings.search_index_path = path.clone();
    }
    if cli.no_search {
        settings.search_enabled = false;
    }
    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Dispatch one command.
pub async fn run_command(context: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::User(cmd) => handle_user(context, cmd),
        Commands::Post(cmd) => handle_post(context, cmd),
        Commands::Search {
            query,
            page,
            per_page,
        } => {
            let per_page = per_page.unwrap_or(context.settings.posts_per_page);
            print_json(&search_posts(context, &query, page, per_page)?)
        }
        Commands::Reindex { fail_fast } => handle_reindex(context, fail_fast),
        Commands::Export { user, poll_ms } => {
            handle_export(context, &user, Duration::from_millis(poll_ms)).await
        }
        Commands::Tasks { user } => handle_tasks(context, &user),
        Commands::Stats => handle_stats(context),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find_user(context: &AppContext, username: &str) -> Result<User> {
    context
        .storage
        .find_user_by_username(username)?
        .with_context(|| format!("No such user: {}", username))
}

fn handle_user(context: &AppContext, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add {
            username,
            email,
            about_me,
        } => {
            let mut user = User::new(username, email);
            user.about_me = about_me;

            let mut session = context.storage.session();
            let id = session.add(user.clone())?;
            session.commit().context("Failed to add user")?;

            info!(id, username = %user.username, "User added");
            println!("Added user {} (id {})", user.username, id);
        }
    }
    Ok(())
}

fn handle_post(context: &AppContext, cmd: PostCommands) -> Result<()> {
    match cmd {
        PostCommands::Add {
            user,
            body,
            language,
        } => {
            let author = find_user(context, &user)?;
            let mut post = Post::new(author.id, body, Utc::now());
            post.language = language;

            let mut session = context.storage.session();
            let id = session.add(post)?;
            session.commit().context("Failed to add post")?;
            println!("Added post {}", id);
        }
        PostCommands::Edit { id, body } => {
            let mut post = context
                .storage
                .get::<Post>(id)?
                .with_context(|| format!("No such post: {}", id))?;
            post.body = body;

            let mut session = context.storage.session();
            session.update(post)?;
            session.commit().context("Failed to update post")?;
            println!("Updated post {}", id);
        }
        PostCommands::Delete { id } => {
            let post = context
                .storage
                .get::<Post>(id)?
                .with_context(|| format!("No such post: {}", id))?;

            let mut session = context.storage.session();
            session.delete(post)?;
            session.commit().context("Failed to delete post")?;
            println!("Deleted post {}", id);
        }
    }
    Ok(())
}

/// Run a post search and wrap it in the pagination envelope.
pub fn search_posts(
    context: &AppContext,
    query: &str,
    page: u64,
    per_page: u64,
) -> Result<blog_types::Page<Post>> {
    let results = context
        .engine
        .search::<Post>(query, page, per_page)
        .context("Search failed")?;
    Ok(results.into_page("/search"))
}

fn handle_reindex(context: &AppContext, fail_fast: bool) -> Result<()> {
    if !context.synchronizer.is_enabled() {
        bail!("Search is disabled; nothing to reindex");
    }
    let config = ReindexConfig::default().with_continue_on_error(!fail_fast);
    let progress = reindex::<Post, _>(
        &context.storage,
        &context.synchronizer,
        &config,
        &LoggingProgressCallback,
    )
    .context("Reindex failed")?;

    println!(
        "Reindexed {} of {} posts ({} errors)",
        progress.indexed, progress.total, progress.errors
    );
    Ok(())
}

async fn handle_export(context: &AppContext, username: &str, poll: Duration) -> Result<()> {
    let user = find_user(context, username)?;
    context.start_workers()?;

    let (task, ticket) = context
        .tasks
        .launch_task(user.id, TaskKind::ExportPosts, "Exporting posts...")
        .context("Failed to launch export")?;
    println!("Started export job {}", task.job_id);

    loop {
        let progress = context.tasks.get_progress(&task.job_id);
        println!("Progress: {}%", progress);
        if progress >= 100 {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    let outcome = ticket.wait().await.context("Export job was dropped")?;
    if !outcome.is_success() {
        bail!("Export failed: {:?}", outcome);
    }
    println!(
        "Export written to {}",
        context
            .settings
            .expanded_export_dir()
            .join(format!("{}-posts.json", user.username))
            .display()
    );
    Ok(())
}

fn handle_tasks(context: &AppContext, username: &str) -> Result<()> {
    let user = find_user(context, username)?;
    let tasks = context.tasks.tasks_in_progress(user.id)?;
    if tasks.is_empty() {
        println!("No tasks in progress for {}", user.username);
        return Ok(());
    }
    for task in tasks {
        println!(
            "{}  {}  {}  {}%",
            task.job_id,
            task.name,
            task.description,
            context.tasks.get_progress(&task.job_id)
        );
    }
    Ok(())
}

fn handle_stats(context: &AppContext) -> Result<()> {
    let stats = context.storage.get_stats()?;
    println!("Users:         {}", stats.user_count);
    println!("Posts:         {}", stats.post_count);
    println!("Tasks:         {}", stats.task_count);
    println!("Notifications: {}", stats.notification_count);
    println!("Disk usage:    {} bytes", stats.disk_usage_bytes);
    println!(
        "Search:        {}",
        if context.synchronizer.is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}
