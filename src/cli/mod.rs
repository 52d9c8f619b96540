//! CLI layer - user-facing command-line interface.
//!
//! Handles argument parsing, command dispatch, and result reporting.
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions using clap
//! - `exit_status`: Exit status codes
//! - `run`: Command dispatcher and the `check` implementation

use std::process::ExitCode;

use anyhow::Result;

pub use args::{Arguments, CheckCommand, Command};
pub use exit_status::ExitStatus;

pub mod args;
mod exit_status;
mod run;

pub fn run_cli(args: Arguments) -> Result<ExitCode> {
    let Some(args) = args.with_command_or_help() else {
        return Ok(ExitCode::from(0));
    };

    let status = run::run(args)?;
    Ok(status.into())
}
