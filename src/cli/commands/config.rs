//! dsr config - Show the effective configuration

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the config file path only
    #[arg(long)]
    pub path: bool,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    if ctx.robot_mode {
        return output::emit_ok(json!({
            "path": ctx.config_path.display().to_string(),
            "root": ctx.dsr_root.display().to_string(),
            "config": ctx.config,
        }));
    }

    if args.path {
        println!("{}", ctx.config_path.display());
        return Ok(());
    }

    println!("{} {}", "#".dimmed(), ctx.config_path.display().to_string().dimmed());
    println!("{}", ctx.config.to_toml()?);
    Ok(())
}
