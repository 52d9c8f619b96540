//! Tests audit over JUnit-style XML result files.
//!
//! Skipped cases leave the denominator; whitelisted cases leave both the
//! denominator and the failure count. A missing results directory passes
//! with a warning, a present-but-empty one is a processing error.

use std::path::PathBuf;

use colored::Colorize;
use walkdir::WalkDir;

use crate::audits::{Audit, ReportSink};
use crate::config::TestsConfig;
use crate::error::{GateError, Result};
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::whitelist::WhitelistMatcher;
use crate::xml::{Element, parse_xml};

pub const NAME: &str = "TestsAudit";

pub struct TestsAudit {
    module: String,
    module_dir: PathBuf,
    results_dir: String,
    tolerance: u32,
    whitelist: WhitelistMatcher,
    /// Names of the tasks expected to have produced the reports; only used
    /// to enrich the empty-directory error.
    task_names: Vec<String>,
}

impl TestsAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &TestsConfig,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            results_dir: config.results_dir.clone(),
            tolerance: config.tolerance_percent,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
            task_names: Vec::new(),
        }
    }

    pub fn with_task_names(mut self, task_names: Vec<String>) -> Self {
        self.task_names = task_names;
        self
    }
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
    findings: Vec<Finding>,
}

impl Audit for TestsAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let dir = self.module_dir.join(&self.results_dir);
        if !dir.is_dir() {
            eprintln!(
                "{} no test results directory at {}, skipping {}",
                "warning:".bold().yellow(),
                dir.display(),
                NAME
            );
            sink.enqueue(AuditResult::new(
                &self.module,
                NAME,
                Vec::new(),
                self.tolerance,
                Status::Pass,
            ));
            return Ok(());
        }

        let mut reports: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "xml")
            })
            .map(|e| e.into_path())
            .collect();
        reports.sort();
        if reports.is_empty() {
            let detail = if self.task_names.is_empty() {
                "results directory contains no JUnit XML reports".to_string()
            } else {
                format!(
                    "results directory contains no JUnit XML reports (expected from {})",
                    self.task_names.join(", ")
                )
            };
            return Err(GateError::missing_report(dir, detail));
        }

        let mut tally = Tally::default();
        for report in &reports {
            let root = parse_xml(report)?;
            collect_testcases(&root, &self.whitelist, &mut tally);
        }

        let executed = tally.passed + tally.failed;
        let status = if tally.failed * 100 <= self.tolerance as usize * executed {
            Status::Pass
        } else {
            Status::Fail
        };

        sink.enqueue(AuditResult::new(
            &self.module,
            NAME,
            tally.findings,
            self.tolerance,
            status,
        ));
        Ok(())
    }
}

fn collect_testcases(element: &Element, whitelist: &WhitelistMatcher, tally: &mut Tally) {
    for testcase in element.children_named("testcase") {
        classify_testcase(testcase, whitelist, tally);
    }
    // JUnit reports nest testcases under <testsuites>/<testsuite>.
    for child in &element.children {
        if child.name == "testsuite" || child.name == "testsuites" {
            collect_testcases(child, whitelist, tally);
        }
    }
}

fn classify_testcase(testcase: &Element, whitelist: &WhitelistMatcher, tally: &mut Tally) {
    let class = testcase.attr("classname").unwrap_or_default();
    let method = testcase.attr("name").unwrap_or_default();
    if whitelist.matches_fqcn_or_symbol(&format!("{}#{}", class, method))
        || whitelist.matches_fqcn_or_symbol(class)
    {
        return;
    }
    if testcase.first_child("skipped").is_some() {
        return;
    }

    let failure = testcase
        .first_child("failure")
        .or_else(|| testcase.first_child("error"));
    match failure {
        None => tally.passed += 1,
        Some(failure) => {
            tally.failed += 1;
            let text = failure.text();
            let headline = failure
                .attr("message")
                .filter(|m| !m.is_empty())
                .or_else(|| text.lines().next())
                .unwrap_or(&failure.name);
            let stacktrace = text
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            tally.findings.push(
                Finding::new(
                    FindingKind::TestFailure,
                    format!("{}#{}: {}", class, method, first_line(headline)),
                )
                .with_stacktrace(stacktrace),
            );
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}
