//! dsr stats - Store statistics

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;
use crate::storage::SkillStore;

#[derive(Args, Debug)]
pub struct StatsArgs {}

pub fn run(ctx: &AppContext, _args: &StatsArgs) -> Result<()> {
    let cutoff = ctx.clock.now() - ctx.config.staleness.revalidation_window();
    let stats = ctx.db.stats(cutoff)?;

    if ctx.robot_mode {
        return output::emit_ok(json!({ "stats": stats }));
    }

    println!("{}", "Skill store".bold());
    println!("  {}: {}", "Total".dimmed(), stats.total);
    for (status, count) in &stats.by_status {
        match status.parse() {
            Ok(parsed) => println!("  {}: {count}", output::status_colored(parsed)),
            Err(_) => println!("  {status}: {count}"),
        }
    }
    println!("  {}: {}", "Size (bytes)".dimmed(), stats.total_size_bytes);
    println!(
        "  {}: {}",
        "Due for revalidation".dimmed(),
        stats.due_for_revalidation
    );
    if !stats.by_domain.is_empty() {
        println!();
        println!("{}", "By domain".bold());
        for (domain, count) in &stats.by_domain {
            println!("  {domain}: {count}");
        }
    }
    Ok(())
}
