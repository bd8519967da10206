//! dsr sweep - Archive skills idle past the inactivity threshold

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Keep sweeping on the configured interval until stdin closes
    #[arg(long)]
    pub watch: bool,

    /// Override the sweep interval in seconds (with --watch)
    #[arg(long, requires = "watch")]
    pub interval: Option<u64>,
}

pub fn run(ctx: &AppContext, args: &SweepArgs) -> Result<()> {
    if args.watch {
        return watch(ctx, args);
    }

    let report = ctx.archival().sweep()?;
    if ctx.robot_mode {
        return output::emit_ok(json!({ "report": report }));
    }

    println!(
        "{} Examined {}, archived {}, skipped {}",
        "✓".green().bold(),
        report.examined,
        report.archived.to_string().bold(),
        report.skipped_due_to_race
    );
    Ok(())
}

fn watch(ctx: &AppContext, args: &SweepArgs) -> Result<()> {
    let interval = args
        .interval
        .map_or_else(|| ctx.config.archival.sweep_interval(), Duration::from_secs);
    let manager = Arc::new(ctx.archival());
    let handle = manager.spawn(interval, ctx.config.archival.sweep_on_start)?;
    info!(interval_secs = interval.as_secs(), "sweeper running; close stdin to stop");

    std::io::copy(&mut std::io::stdin().lock(), &mut std::io::sink())?;
    handle.shutdown();

    let snapshot = ctx.metrics.snapshot();
    if ctx.robot_mode {
        return output::emit_ok(json!({
            "archived": snapshot.archive_count,
            "skipped_due_to_race": snapshot.sweep_skipped_count,
        }));
    }
    println!(
        "{} Sweeper stopped; archived {}",
        "✓".green().bold(),
        snapshot.archive_count
    );
    Ok(())
}
