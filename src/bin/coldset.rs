//! Coldset CLI Binary
//!
//! Command-line interface for size-bounded cold storage backups.

use anyhow::Context;
use clap::Parser;
use coldset::logging::init_logging;
use coldset::tooling::cli::{Cli, CliContext};
use std::process;

/// Returns whether every job succeeded.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let context = CliContext::new(cli.config.clone()).context("loading configuration")?;

    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging)).context("initializing logging")?;

    let output = context.execute(&cli.command).map_err(|e| {
        tracing::error!(error = %e, "Command failed");
        e
    })?;
    println!("{}", output.text);
    Ok(output.success)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
