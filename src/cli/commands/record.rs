//! dsr record - Persist a freshly generated skill

use clap::Args;
use colored::Colorize;
use serde_json::json;

use super::decide::ContextArgs;
use crate::app::AppContext;
use crate::cli::output;
use crate::core::SkillId;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Skill this generation replaces
    #[arg(long)]
    pub prior: Option<String>,

    /// Size of the generated artifact
    #[arg(long, default_value = "0")]
    pub size_bytes: u64,
}

pub fn run(ctx: &AppContext, args: &RecordArgs) -> Result<()> {
    let context = args.context.to_context()?;
    let prior = args.prior.as_deref().map(SkillId::from);
    let skill = ctx
        .engine()?
        .record(&context, prior.as_ref(), args.size_bytes)?;

    if ctx.robot_mode {
        return output::emit_ok(json!({ "skill": skill }));
    }

    println!(
        "{} Recorded {} (generation {})",
        "✓".green().bold(),
        skill.id,
        skill.generation_count
    );
    Ok(())
}
