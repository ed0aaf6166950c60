//! Blog engine command-line library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `context`: Process-wide wiring of store, index, listener and workers
//! - `commands`: Command implementations

pub mod cli;
pub mod commands;
pub mod context;

pub use cli::{Cli, Commands, PostCommands, UserCommands};
pub use commands::{init_logging, load_settings, run_command};
pub use context::AppContext;
