//! Command dispatcher.
//!
//! `check` wires a module directory to the runner and aggregator: load
//! config, feed the compiler log into the capture buffer, fan the audits
//! out, close the aggregator, and map the outcome to an exit status.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use super::args::{Arguments, CheckCommand, Command};
use super::exit_status::ExitStatus;
use crate::aggregator::ReportAggregator;
use crate::config::{CONFIG_FILE_NAME, default_config_json, load_config};
use crate::error::GateError;
use crate::report;
use crate::runner::GateRunner;

pub fn run(Arguments { command }: Arguments) -> Result<ExitStatus> {
    match command {
        Some(Command::Check(cmd)) => check(cmd),
        Some(Command::Init) => {
            init()?;
            Ok(ExitStatus::Success)
        }
        None => {
            bail!("No command provided. Use --help to see available commands.")
        }
    }
}

fn check(cmd: CheckCommand) -> Result<ExitStatus> {
    let module_dir = cmd.common.module_dir.clone();
    let loaded = load_config(&module_dir)?;
    if cmd.common.verbose && !loaded.from_file {
        eprintln!(
            "{} no {} found, using defaults",
            "note:".bold(),
            CONFIG_FILE_NAME
        );
    }
    let config = loaded.config;

    let module = cmd
        .common
        .module
        .clone()
        .unwrap_or_else(|| default_module_name(&module_dir));
    let report_path = cmd
        .common
        .report
        .clone()
        .unwrap_or_else(|| module_dir.join(&config.report_path));
    let upload_enabled = config.upload_enabled;

    let mut runner = GateRunner::new(module, &module_dir, config).verbose(cmd.common.verbose);
    runner = if cmd.audits.is_empty() {
        runner.all()
    } else {
        cmd.audits.iter().fold(runner, |r, kind| r.add(*kind))
    };

    if let Some(log) = &cmd.common.compiler_log {
        let text = fs::read_to_string(log)
            .with_context(|| format!("Failed to read compiler log {:?}", log))?;
        let capture = runner.capture();
        capture.register();
        capture.append(&text);
        capture.unregister();
    }

    let aggregator = ReportAggregator::new(report_path, upload_enabled);
    runner.run(&aggregator)?;

    match aggregator.close(None) {
        Ok(results) => {
            report::render(&results, cmd.common.verbose);
            Ok(ExitStatus::Success)
        }
        Err(GateError::BuildFailed(message)) => {
            report::render(&aggregator.snapshot(), cmd.common.verbose);
            eprintln!("{}", message.red());
            Ok(ExitStatus::Failure)
        }
        Err(other) => Err(other.into()),
    }
}

fn default_module_name(module_dir: &Path) -> String {
    let canonical = module_dir
        .canonicalize()
        .unwrap_or_else(|_| module_dir.to_path_buf());
    match canonical.file_name() {
        Some(name) => format!(":{}", name.to_string_lossy()),
        None => ":module".to_string(),
    }
}

fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!("{} already exists", CONFIG_FILE_NAME);
    }

    fs::write(config_path, default_config_json()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::cli::args::CommonArgs;

    fn check_cmd(module_dir: PathBuf, audits: Vec<crate::runner::AuditKind>) -> CheckCommand {
        CheckCommand {
            audits,
            common: CommonArgs {
                module_dir,
                module: Some(":app".to_string()),
                compiler_log: None,
                report: None,
                verbose: false,
            },
        }
    }

    #[test]
    fn default_module_name_uses_the_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("player-core");
        std::fs::create_dir(&nested).unwrap();
        assert_eq!(default_module_name(&nested), ":player-core");
    }

    #[test]
    fn clean_subset_run_exits_success_and_writes_report() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("build.gradle.kts"), "plugins {}\n").unwrap();

        let status = check(check_cmd(
            dir.path().to_path_buf(),
            vec![
                crate::runner::AuditKind::Compilation,
                crate::runner::AuditKind::Structure,
            ],
        ))
        .unwrap();
        assert_eq!(status, ExitStatus::Success);
        assert!(dir.path().join("build/reports/testgate-results.json").exists());
    }

    #[test]
    fn failing_audit_maps_to_failure_status() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        // Fixtures audit fails: no fixtures, module not whitelisted.
        let status = check(check_cmd(
            dir.path().to_path_buf(),
            vec![crate::runner::AuditKind::Fixtures],
        ))
        .unwrap();
        assert_eq!(status, ExitStatus::Failure);
    }

    #[test]
    fn processing_error_bubbles_as_anyhow_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        // Coverage report is missing.
        let result = check(check_cmd(
            dir.path().to_path_buf(),
            vec![crate::runner::AuditKind::Coverage],
        ));
        assert!(result.is_err());
    }
}
