//! dsr show - Show skill details

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::core::{Skill, SkillId};
use crate::error::{DsrError, Result};
use crate::storage::SkillStore;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Skill ID
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let skill = lookup(ctx, &args.id)?;

    if ctx.robot_mode {
        return output::emit_ok(json!({ "skill": skill }));
    }
    output::print_skill_detail(&skill);
    Ok(())
}

pub(super) fn lookup(ctx: &AppContext, id: &str) -> Result<Skill> {
    let id = SkillId::from(id);
    ctx.db
        .get_by_id(&id)?
        .ok_or_else(|| DsrError::NotFound(id.to_string()))
}
