//! dsr decide - Run a reuse decision for a request context

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::context::SkillContext;
use crate::engine::Decision;
use crate::error::Result;

/// Request context shared by `decide` and `record`.
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// Problem domain, e.g. "database migrations"
    #[arg(long, short)]
    pub domain: String,

    /// Tool in use, as name=version (repeatable)
    #[arg(long = "tool", short, value_name = "NAME=VERSION")]
    pub tools: Vec<String>,

    /// Knowledge gap the skill must cover (repeatable)
    #[arg(long = "gap", short, value_name = "GAP")]
    pub gaps: Vec<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> Result<SkillContext> {
        SkillContext::from_parts(&self.domain, &self.tools, &self.gaps)
    }
}

#[derive(Args, Debug)]
pub struct DecideArgs {
    #[command(flatten)]
    pub context: ContextArgs,
}

pub fn run(ctx: &AppContext, args: &DecideArgs) -> Result<()> {
    let context = args.context.to_context()?;
    let hash = context.fingerprint();
    let decision = ctx.engine()?.decide(&context)?;

    if ctx.robot_mode {
        return output::emit_ok(json!({
            "context_hash": hash.to_hex(),
            "result": decision,
        }));
    }

    match &decision {
        Decision::Reuse(skill) => {
            println!("{} {}", "REUSE".green().bold(), skill.id);
            output::print_skill_detail(skill);
        }
        Decision::RestoreThenReuse(skill) => {
            println!("{} {}", "RESTORE THEN REUSE".yellow().bold(), skill.id);
            println!("  Run: dsr restore {}", skill.id);
        }
        Decision::Regenerate { prior } => {
            println!("{}", "REGENERATE".red().bold());
            println!("  {}: {}", "Context hash".dimmed(), hash);
            match prior {
                Some(prior) => {
                    println!("  {}: {} (gen {})", "Prior".dimmed(), prior.id, prior.generation_count);
                    println!(
                        "  Run: dsr record --domain {:?} ... --prior {}",
                        context.domain(),
                        prior.id
                    );
                }
                None => println!("  {}: none", "Prior".dimmed()),
            }
        }
    }
    Ok(())
}
