//! dsr metrics - Lifetime reuse metrics

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;
use crate::metrics::MetricsSnapshot;

#[derive(Args, Debug)]
pub struct MetricsArgs {}

pub fn run(ctx: &AppContext, _args: &MetricsArgs) -> Result<()> {
    let totals = MetricsSnapshot::from_totals(&ctx.db.metric_totals()?);
    let decisions = totals.reuse_count + totals.regenerate_count + totals.restore_then_reuse_count;
    let reuse_rate = if decisions == 0 {
        0.0
    } else {
        totals.reuse_count as f64 / decisions as f64
    };

    if ctx.robot_mode {
        return output::emit_ok(json!({
            "metrics": totals,
            "reuse_rate": reuse_rate,
        }));
    }

    println!("{}", "Reuse metrics (lifetime)".bold());
    println!("  {}: {}", "Reused".dimmed(), totals.reuse_count);
    println!("  {}: {}", "Regenerated".dimmed(), totals.regenerate_count);
    println!(
        "  {}: {}",
        "Restore suggested".dimmed(),
        totals.restore_then_reuse_count
    );
    println!("  {}: {:.1}%", "Reuse rate".dimmed(), reuse_rate * 100.0);
    println!("  {}: {}", "Archived".dimmed(), totals.archive_count);
    println!("  {}: {}", "Restored".dimmed(), totals.restore_count);
    println!("  {}: {}", "Sweep skips".dimmed(), totals.sweep_skipped_count);
    println!("  {}: {}", "Staleness checks".dimmed(), totals.staleness_checks);
    println!("  {}: {}", "Check failures".dimmed(), totals.check_failure_count);
    println!(
        "  {}: {:.2} ms",
        "Avg check latency".dimmed(),
        totals.avg_check_latency_ms
    );
    Ok(())
}
