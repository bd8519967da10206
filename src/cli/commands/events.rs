//! dsr events - Show the audit log of a skill

use clap::Args;
use colored::Colorize;
use serde_json::json;

use super::show::lookup;
use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;
use crate::storage::SkillStore;

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Skill ID
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &EventsArgs) -> Result<()> {
    let skill = lookup(ctx, &args.id)?;
    let events = ctx.db.events(&skill.id)?;

    if ctx.robot_mode {
        return output::emit_ok(json!({
            "skill_id": skill.id,
            "events": events,
        }));
    }

    for event in &events {
        let from = event.from_status.map_or("-", |status| status.as_str());
        println!(
            "{:>5}  {}  {:<12} {} -> {}  gen {}",
            event.seq,
            output::format_ts(Some(event.at)).dimmed(),
            event.kind.as_str().bold(),
            from,
            output::status_colored(event.to_status),
            event.generation_count,
        );
    }
    Ok(())
}
