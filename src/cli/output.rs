//! Shared output helpers for human and robot modes.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::{Skill, SkillStatus};
use crate::error::Result;

/// Print a robot-mode success payload: `{"status": "ok", ...fields}`.
pub fn emit_ok(fields: Value) -> Result<()> {
    let mut payload = json!({ "status": "ok" });
    if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), fields) {
        target.extend(extra);
    }
    emit_json(&payload)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[must_use]
pub fn status_colored(status: SkillStatus) -> ColoredString {
    match status {
        SkillStatus::Active => status.as_str().green(),
        SkillStatus::Stale => status.as_str().yellow(),
        SkillStatus::Archived => status.as_str().dimmed(),
    }
}

#[must_use]
pub fn format_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// One-line summary used by list and history.
pub fn print_skill_line(skill: &Skill) {
    println!(
        "{}  {:<8}  gen {:<3}  {}  last used {}",
        skill.id.as_str().cyan(),
        status_colored(skill.status),
        skill.generation_count,
        skill.domain.bold(),
        format_ts(skill.last_used_at),
    );
}

pub fn print_skill_detail(skill: &Skill) {
    println!("{}", skill.domain.bold());
    println!("{}", "═".repeat(skill.domain.chars().count().max(1)));
    println!("{}: {}", "ID".dimmed(), skill.id);
    println!("{}: {}", "Status".dimmed(), status_colored(skill.status));
    println!("{}: {}", "Context hash".dimmed(), skill.context_hash);
    println!("{}: {}", "Generation".dimmed(), skill.generation_count);
    println!(
        "{}: {}",
        "Previous".dimmed(),
        skill
            .previous_version_id
            .as_ref()
            .map_or("-", |id| id.as_str())
    );
    println!("{}: {}", "Created".dimmed(), format_ts(Some(skill.created_at)));
    println!("{}: {}", "Last used".dimmed(), format_ts(skill.last_used_at));
    println!("{}: {}", "Last verified".dimmed(), format_ts(skill.last_verified_at));
    if skill.archived_at.is_some() {
        println!("{}: {}", "Archived".dimmed(), format_ts(skill.archived_at));
    }
    println!("{}: {}", "Size".dimmed(), skill.size_bytes);

    if !skill.dependency_versions.is_empty() {
        println!();
        println!("{}", "Dependencies".bold());
        for (name, version) in &skill.dependency_versions {
            println!("  {name} {version}");
        }
    }
    if !skill.knowledge_gaps.is_empty() {
        println!();
        println!("{}", "Knowledge gaps".bold());
        for gap in &skill.knowledge_gaps {
            println!("  {gap}");
        }
    }
}
