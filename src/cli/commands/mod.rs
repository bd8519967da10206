//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod config;
pub mod decide;
pub mod events;
pub mod history;
pub mod init;
pub mod list;
pub mod metrics;
pub mod record;
pub mod restore;
pub mod show;
pub mod stats;
pub mod sweep;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Init(args) => init::run(ctx, args),
        Commands::Decide(args) => decide::run(ctx, args),
        Commands::Record(args) => record::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
        Commands::Show(args) => show::run(ctx, args),
        Commands::History(args) => history::run(ctx, args),
        Commands::Events(args) => events::run(ctx, args),
        Commands::Restore(args) => restore::run(ctx, args),
        Commands::Sweep(args) => sweep::run(ctx, args),
        Commands::Stats(args) => stats::run(ctx, args),
        Commands::Metrics(args) => metrics::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}
