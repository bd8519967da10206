//! dsr list - List stored skills

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::core::SkillStatus;
use crate::error::Result;
use crate::storage::{SkillFilter, SkillStore};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status: active, stale, archived
    #[arg(long, short)]
    pub status: Option<SkillStatus>,

    /// Filter by domain
    #[arg(long, short)]
    pub domain: Option<String>,

    /// Maximum number of skills to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let mut filter = SkillFilter {
        status: args.status,
        domain: None,
    };
    if let Some(domain) = &args.domain {
        filter = filter.domain(domain);
    }

    let skills = ctx.db.list(&filter)?;
    let total = skills.len();
    let shown: Vec<_> = skills.into_iter().rev().take(args.limit).collect();

    if ctx.robot_mode {
        return output::emit_ok(json!({
            "count": shown.len(),
            "total": total,
            "skills": shown,
        }));
    }

    if shown.is_empty() {
        println!("No skills found");
        return Ok(());
    }
    for skill in &shown {
        output::print_skill_line(skill);
    }
    if total > shown.len() {
        println!();
        println!("({} of {total} shown)", shown.len());
    }
    Ok(())
}
