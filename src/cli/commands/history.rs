//! dsr history - Walk the generation chain of a skill

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::core::SkillId;
use crate::error::Result;
use crate::storage::SkillStore;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Skill ID to start from
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &HistoryArgs) -> Result<()> {
    let chain = ctx.db.history(&SkillId::from(args.id.as_str()))?;

    if ctx.robot_mode {
        return output::emit_ok(json!({
            "count": chain.len(),
            "history": chain,
        }));
    }
    for skill in &chain {
        output::print_skill_line(skill);
    }
    Ok(())
}
