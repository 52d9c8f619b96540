//! Orchestration: assemble the audit catalog for a module and run it.
//!
//! Audits are independent, so they run in parallel; each one pushes its
//! single result straight into the aggregator sink. A processing error from
//! any audit aborts the run.

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use colored::Colorize;
use rayon::prelude::*;

use crate::aggregator::ReportAggregator;
use crate::audits::Audit;
use crate::audits::compilation::CompilationAudit;
use crate::audits::coverage::CoverageBranchesAudit;
use crate::audits::detekt::DetektAudit;
use crate::audits::fixtures::FixturesAudit;
use crate::audits::harness::HarnessReuseIsolationAudit;
use crate::audits::lint::AndroidLintAudit;
use crate::audits::sql_fts::SqlFtsAudit;
use crate::audits::structure::StructureAudit;
use crate::audits::test_results::TestsAudit;
use crate::audits::test_stack::TestStackAudit;
use crate::capture::CompilationCapture;
use crate::config::GateConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum AuditKind {
    Compilation,
    Detekt,
    Lint,
    Harness,
    SqlFts,
    Structure,
    TestStack,
    Fixtures,
    Tests,
    Coverage,
}

/// The main orchestrator for one module's gate run.
///
/// GateRunner is responsible for:
/// 1. Holding the module identity and configuration
/// 2. Managing the list of audits to execute (deduplicated by name)
/// 3. Running them in parallel against the aggregator sink
pub struct GateRunner {
    module: String,
    module_dir: PathBuf,
    config: GateConfig,
    capture: Arc<CompilationCapture>,
    audits: Vec<Box<dyn Audit>>,
    verbose: bool,
}

impl GateRunner {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: GateConfig,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            config,
            capture: Arc::new(CompilationCapture::new()),
            audits: Vec::new(),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Handle for feeding compiler stderr into the compilation audit.
    pub fn capture(&self) -> Arc<CompilationCapture> {
        Arc::clone(&self.capture)
    }

    pub fn add(mut self, kind: AuditKind) -> Self {
        let audit: Box<dyn Audit> = match kind {
            AuditKind::Compilation => Box::new(CompilationAudit::new(
                &self.module,
                &self.module_dir,
                Arc::clone(&self.capture),
            )),
            AuditKind::Detekt => Box::new(DetektAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.detekt,
            )),
            AuditKind::Lint => Box::new(AndroidLintAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.lint,
            )),
            AuditKind::Harness => Box::new(HarnessReuseIsolationAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.harness,
            )),
            AuditKind::SqlFts => Box::new(SqlFtsAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.sql_fts,
            )),
            AuditKind::Structure => Box::new(StructureAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.structure,
            )),
            AuditKind::TestStack => Box::new(TestStackAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.test_stack,
            )),
            AuditKind::Fixtures => Box::new(FixturesAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.fixtures,
            )),
            AuditKind::Tests => Box::new(TestsAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.tests,
            )),
            AuditKind::Coverage => Box::new(CoverageBranchesAudit::new(
                &self.module,
                &self.module_dir,
                &self.config.coverage,
            )),
        };

        // Deduplicate: skip if already added.
        if self.audits.iter().any(|a| a.name() == audit.name()) {
            return self;
        }
        self.audits.push(audit);
        self
    }

    pub fn all(self) -> Self {
        self.add(AuditKind::Compilation)
            .add(AuditKind::Detekt)
            .add(AuditKind::Lint)
            .add(AuditKind::Harness)
            .add(AuditKind::SqlFts)
            .add(AuditKind::Structure)
            .add(AuditKind::TestStack)
            .add(AuditKind::Fixtures)
            .add(AuditKind::Tests)
            .add(AuditKind::Coverage)
    }

    pub fn audit_count(&self) -> usize {
        self.audits.len()
    }

    /// Run every audit, fanning out across threads. Each audit enqueues its
    /// result through the sink; the first processing error aborts the run.
    pub fn run(&self, aggregator: &ReportAggregator) -> Result<()> {
        self.audits
            .par_iter()
            .map(|audit| {
                if self.verbose {
                    eprintln!("{} {}", "running".dimmed(), audit.name());
                }
                audit.check(aggregator)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::model::Status;

    #[test]
    fn add_deduplicates_by_name() {
        let runner = GateRunner::new(":app", "/tmp/app", GateConfig::default())
            .add(AuditKind::Compilation)
            .add(AuditKind::Compilation)
            .add(AuditKind::TestStack);
        assert_eq!(runner.audit_count(), 2);
    }

    #[test]
    fn all_registers_the_full_catalog() {
        let runner = GateRunner::new(":app", "/tmp/app", GateConfig::default()).all();
        assert_eq!(runner.audit_count(), 10);
    }

    #[test]
    fn run_enqueues_one_result_per_audit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("build.gradle.kts"), "plugins {}\n").unwrap();

        // Audits that need no tool report: compilation, harness, sql/fts,
        // structure, test stack.
        let runner = GateRunner::new(":app", dir.path(), GateConfig::default())
            .add(AuditKind::Compilation)
            .add(AuditKind::Harness)
            .add(AuditKind::SqlFts)
            .add(AuditKind::Structure)
            .add(AuditKind::TestStack);

        let aggregator = ReportAggregator::new(dir.path().join("results.json"), false);
        runner.run(&aggregator).unwrap();

        let results = aggregator.snapshot();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.status == Status::Pass));
        assert!(results.iter().all(|r| r.module == ":app"));
    }

    #[test]
    fn processing_error_aborts_the_run() {
        let dir = tempdir().unwrap();
        // Detekt has no report to read.
        let runner =
            GateRunner::new(":app", dir.path(), GateConfig::default()).add(AuditKind::Detekt);
        let aggregator = ReportAggregator::new(dir.path().join("results.json"), false);

        let err = runner.run(&aggregator).unwrap_err();
        assert!(err.is_processing_error());
        assert!(aggregator.snapshot().is_empty());
    }

    #[test]
    fn captured_stderr_reaches_the_compilation_audit() {
        let dir = tempdir().unwrap();
        let runner =
            GateRunner::new(":app", dir.path(), GateConfig::default()).add(AuditKind::Compilation);

        let capture = runner.capture();
        capture.register();
        capture.append("e: [kapt] processor exploded\n");
        capture.unregister();

        let aggregator = ReportAggregator::new(dir.path().join("results.json"), false);
        runner.run(&aggregator).unwrap();
        let results = aggregator.snapshot();
        assert_eq!(results[0].status, Status::Fail);
        assert_eq!(results[0].findings[0].message, "processor exploded");
    }
}
