//! blogctl
//!
//! Command-line front end for the blog search and task engine.
//!
//! # Usage
//!
//! ```bash
//! blogctl user add susan susan@example.com
//! blogctl post add --user susan "hello world"
//! blogctl search hello --page 1
//! blogctl export --user susan
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/blog/config.toml)
//! 3. File given with --config
//! 4. Environment variables (BLOG_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use blog_daemon::{init_logging, load_settings, run_command, AppContext, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level)?;

    let context = AppContext::open(settings)?;
    let result = run_command(&context, cli.command).await;
    context.shutdown().await?;
    result
}
