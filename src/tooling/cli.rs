//! CLI Tooling
//!
//! Command-line interface for scanning a snapshot into sets, uploading them
//! and restoring a generation.

use super::format::{
    format_dry_scan_report, format_restore_report, format_scan_report, format_sets_table,
    format_upload_report,
};
use crate::backup;
use crate::config::{xdg, ColdsetConfig, ConfigLoader};
use crate::error::BackupError;
use crate::logging::LoggingConfig;
use crate::matcher::MatchOutcome;
use crate::seal;
use crate::sets;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// Coldset CLI - size-bounded cold storage backups
#[derive(Parser)]
#[command(name = "coldset")]
#[command(version)]
#[command(about = "Partition filesystem snapshots into size-bounded sets and move them to cold storage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply the logging flags on top of the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl the snapshot and write size-bounded sets
    Scan {
        /// Crawl and partition only; write nothing
        #[arg(long)]
        dry_run: bool,

        /// Continue without asking when inclusion patterns match nothing
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Write sets from the last crawl checkpoint without crawling again
    Partition,
    /// List sets waiting for upload
    Sets,
    /// Archive and upload all pending sets
    Upload {
        /// Generation to upload under (default: current UTC timestamp)
        #[arg(long)]
        generation: Option<String>,
    },
    /// Restore and unpack every archive of a generation
    Restore {
        /// Generation to restore (default: remote.generation)
        #[arg(long)]
        generation: Option<String>,

        /// Directory to unpack into (default: restore.extract_path)
        #[arg(long)]
        into: Option<PathBuf>,
    },
    /// Mark a directory as sealed by the active configuration
    Seal {
        /// Directory to seal
        dir: PathBuf,
    },
    /// Remove the seal marker from a directory
    Unseal {
        /// Directory to unseal
        dir: PathBuf,
    },
}

/// Result of one command: text for stdout plus whether the run succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

/// CLI context holding the loaded configuration
pub struct CliContext {
    config: ColdsetConfig,
    config_path: Option<PathBuf>,
}

impl CliContext {
    /// Load configuration from all sources.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, BackupError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self::with_config(config, config_path))
    }

    pub fn with_config(config: ColdsetConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &ColdsetConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, BackupError> {
        match command {
            Commands::Scan { dry_run, yes } => {
                let assume_yes = *yes;
                let confirm = move |outcome: &MatchOutcome| confirm_warnings(outcome, assume_yes);
                if *dry_run {
                    let report = backup::dry_scan(&self.config, confirm)?;
                    Ok(CommandOutput::ok(format_dry_scan_report(&report)))
                } else {
                    let report = backup::scan(&self.config, confirm)?;
                    Ok(CommandOutput::ok(format_scan_report(&report)))
                }
            }
            Commands::Partition => {
                backup::partition_from_checkpoint(&self.config)?;
                let pending = sets::discover(&self.config.sets.path)?;
                Ok(CommandOutput::ok(format_sets_table(&pending)))
            }
            Commands::Sets => {
                let pending = sets::discover(&self.config.sets.path)?;
                Ok(CommandOutput::ok(format_sets_table(&pending)))
            }
            Commands::Upload { generation } => {
                let mut config = self.config.clone();
                if let Some(generation) = generation {
                    config.remote.generation = Some(generation.clone());
                }
                let (report, generation) = backup::upload(&config)?;
                Ok(CommandOutput {
                    text: format_upload_report(&report, &generation),
                    success: report.is_success(),
                })
            }
            Commands::Restore { generation, into } => {
                let mut config = self.config.clone();
                if let Some(into) = into {
                    config.restore.extract_path = into.clone();
                }
                let report = backup::restore(&config, generation.as_deref())?;
                Ok(CommandOutput::ok(format_restore_report(
                    &report,
                    &config.restore.extract_path,
                )))
            }
            Commands::Seal { dir } => {
                let sealed_by = self.sealing_config_path()?;
                seal::seal_directory(dir, &sealed_by)?;
                Ok(CommandOutput::ok(format!(
                    "Sealed {} (config: {})",
                    dir.display(),
                    sealed_by.display()
                )))
            }
            Commands::Unseal { dir } => {
                let text = match seal::sealed_by(dir)? {
                    Some(config) => {
                        seal::unseal_directory(dir)?;
                        format!(
                            "Unsealed {} (was sealed by {})",
                            dir.display(),
                            config.display()
                        )
                    }
                    None => format!("{} was not sealed", dir.display()),
                };
                Ok(CommandOutput::ok(text))
            }
        }
    }

    /// The file a seal marker points at: `--config`, else the global config.
    fn sealing_config_path(&self) -> Result<PathBuf, BackupError> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => xdg::global_config_path()?,
        };
        if !path.is_file() {
            return Err(BackupError::ConfigError(format!(
                "Cannot seal without a config file; {} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// Ask whether to continue despite matcher warnings.
///
/// Without a terminal the answer is no unless `assume_yes` is set.
fn confirm_warnings(outcome: &MatchOutcome, assume_yes: bool) -> Result<bool, BackupError> {
    if assume_yes {
        info!(warnings = outcome.warnings.len(), "Continuing despite warnings");
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    use dialoguer::Confirm;
    Confirm::new()
        .with_prompt(format!(
            "{} inclusion pattern(s) matched nothing. Continue?",
            outcome.warnings.len()
        ))
        .default(false)
        .interact()
        .map_err(|e| BackupError::ConfigError(format!("Failed to get user input: {}", e)))
}
