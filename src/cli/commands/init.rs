//! dsr init - Initialize a dsr root in the current directory or globally

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::{AppContext, DB_FILE_NAME, ROOT_DIR_NAME, default_config_path};
use crate::cli::output;
use crate::config::Config;
use crate::error::{DsrError, Result};
use crate::storage::Database;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Initialize globally (platform data dir) instead of locally (.dsr/)
    #[arg(long)]
    pub global: bool,

    /// Rewrite the default config even if one exists
    #[arg(long, short)]
    pub force: bool,
}

pub fn run(ctx: &AppContext, args: &InitArgs) -> Result<()> {
    run_without_context(ctx.robot_mode, args)
}

/// `init` must work before any root exists, so it does not need an
/// [`AppContext`].
pub fn run_without_context(robot_mode: bool, args: &InitArgs) -> Result<()> {
    let target = target_root(args.global)?;
    let already = target.join(DB_FILE_NAME).exists();

    fs::create_dir_all(&target)?;
    let db = Database::open(target.join(DB_FILE_NAME))?;
    let config_path = default_config_path(&target);
    let wrote_config = write_default_config(&config_path, args.force)?;

    if robot_mode {
        return output::emit_ok(json!({
            "path": target.display().to_string(),
            "db": target.join(DB_FILE_NAME).display().to_string(),
            "config": config_path.display().to_string(),
            "schema_version": db.schema_version(),
            "already_initialized": already,
            "wrote_config": wrote_config,
        }));
    }

    if already && !wrote_config {
        println!("{} Already initialized at {}", "!".yellow(), target.display());
        println!("  Use --force to rewrite the default config");
        return Ok(());
    }
    println!("{} Initialized at {}", "✓".green().bold(), target.display());
    println!("  {}: {}", "Database".dimmed(), target.join(DB_FILE_NAME).display());
    println!("  {}: {}", "Config".dimmed(), config_path.display());
    Ok(())
}

fn target_root(global: bool) -> Result<PathBuf> {
    if let Ok(root) = std::env::var("DSR_ROOT") {
        return Ok(PathBuf::from(root));
    }
    if global {
        return dirs::data_dir()
            .map(|dir| dir.join("dsr"))
            .ok_or_else(|| DsrError::MissingConfig("data directory not found".to_string()));
    }
    Ok(std::env::current_dir()?.join(ROOT_DIR_NAME))
}

fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    let body = format!("# dsr configuration\n\n{}", Config::default().to_toml()?);
    fs::write(path, body)?;
    Ok(true)
}
