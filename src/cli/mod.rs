//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Dynamic skill reuse: fingerprint contexts, reuse fresh skills, archive idle ones
#[derive(Parser, Debug)]
#[command(name = "dsr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: <root>/config.toml layered over ~/.config/dsr/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a dsr root in the current directory or globally
    Init(commands::init::InitArgs),

    /// Decide whether a stored skill can serve a context
    Decide(commands::decide::DecideArgs),

    /// Record a freshly generated skill
    Record(commands::record::RecordArgs),

    /// List stored skills
    List(commands::list::ListArgs),

    /// Show one skill
    Show(commands::show::ShowArgs),

    /// Show the generation chain of a skill, newest first
    History(commands::history::HistoryArgs),

    /// Show the audit log of a skill
    Events(commands::events::EventsArgs),

    /// Restore an archived skill
    Restore(commands::restore::RestoreArgs),

    /// Archive skills idle past the inactivity threshold
    Sweep(commands::sweep::SweepArgs),

    /// Store statistics
    Stats(commands::stats::StatsArgs),

    /// Lifetime reuse metrics
    Metrics(commands::metrics::MetricsArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}
