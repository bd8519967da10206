//! dsr - dynamic skill reuse CLI

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dsr::Result;
use dsr::app::AppContext;
use dsr::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                // Robot mode: JSON error output to stdout
                let error_json = serde_json::json!({
                    "status": "error",
                    "error": e.to_structured(),
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
                let suggestion = e.to_structured().suggestion;
                if !suggestion.is_empty() {
                    eprintln!("  {suggestion}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::Init(args) = &cli.command {
        return dsr::cli::commands::init::run_without_context(cli.robot, args);
    }
    let ctx = AppContext::from_cli(cli)?;
    let outcome = dsr::cli::commands::run(&ctx, &cli.command);
    if let Err(err) = ctx.persist_metrics() {
        tracing::warn!(error = %err, "failed to persist metrics");
    }
    outcome
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,dsr=info",
        1 => "info,dsr=debug",
        2 => "debug,dsr=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
