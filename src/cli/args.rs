//! CLI argument definitions using clap.
//!
//! ## Commands
//!
//! - `check`: Run the audit gate over one module
//! - `init`: Initialize a testgate configuration file

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::runner::AuditKind;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// Check if a command was provided, otherwise print help and return None.
    pub fn with_command_or_help(self) -> Option<Self> {
        if self.command.is_none() {
            Self::command().print_help().ok();
            None
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the audit gate over a module and write the JSON verdict.
    Check(CheckCommand),
    /// Write a default .testgate.json in the current directory.
    Init,
}

/// Common arguments shared by gate runs.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Module directory to audit
    #[arg(long, default_value = ".")]
    pub module_dir: PathBuf,

    /// Module name used in the report (defaults to ":<dir name>")
    #[arg(long)]
    pub module: Option<String>,

    /// File holding captured compiler stderr for the compilation audit
    #[arg(long)]
    pub compiler_log: Option<PathBuf>,

    /// Report file path (overrides the configured one)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Audits to run (default: all)
    #[arg(value_enum)]
    pub audits: Vec<AuditKind>,

    #[command(flatten)]
    pub common: CommonArgs,
}
