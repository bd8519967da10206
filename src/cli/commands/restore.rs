//! dsr restore - Bring an archived skill back to active

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::core::SkillId;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Skill ID
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &RestoreArgs) -> Result<()> {
    let skill = ctx.archival().restore(&SkillId::from(args.id.as_str()))?;

    if ctx.robot_mode {
        return output::emit_ok(json!({ "skill": skill }));
    }
    println!("{} Restored {}", "✓".green().bold(), skill.id);
    Ok(())
}
