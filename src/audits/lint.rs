//! Android Lint audit over the format-6 lint XML report.
//!
//! One finding per `(issue, location)` pair; only `Error` and `Fatal`
//! severities count against the module.

use std::path::PathBuf;

use crate::audits::{Audit, ReportSink};
use crate::config::LintConfig;
use crate::error::Result;
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::scan_source_files;
use crate::whitelist::WhitelistMatcher;
use crate::xml::parse_xml;

pub const NAME: &str = "AndroidLintAudit";

const REPORT_PATH: &str = "build/reports/lint-results-debug.xml";

pub struct AndroidLintAudit {
    module: String,
    module_dir: PathBuf,
    tolerance: u32,
    whitelist: WhitelistMatcher,
}

impl AndroidLintAudit {
    pub fn new(module: impl Into<String>, module_dir: impl Into<PathBuf>, config: &LintConfig) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            tolerance: config.tolerance_percent,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }
}

impl Audit for AndroidLintAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let report = parse_xml(&self.module_dir.join(REPORT_PATH))?;
        let scanned = scan_source_files(&self.module_dir);

        let mut findings = Vec::new();
        for issue in report.children_named("issue") {
            let severity = issue.attr("severity").unwrap_or_default();
            if !severity.eq_ignore_ascii_case("error") && !severity.eq_ignore_ascii_case("fatal") {
                continue;
            }
            let id = issue.attr("id").unwrap_or("UnknownIssue");
            let message = issue.attr("message").unwrap_or_default();
            for location in issue.children_named("location") {
                let Some(file) = location.attr("file") else {
                    continue;
                };
                if self.whitelist.matches_path(file) {
                    continue;
                }
                let mut finding =
                    Finding::new(FindingKind::AndroidLintIssue, format!("[{}] {}", id, message))
                        .with_file(file);
                finding.line = location.attr_usize("line");
                finding.severity = Some(severity.to_string());
                findings.push(finding);
            }
        }

        let status = if findings.len() * 100 <= self.tolerance as usize * scanned {
            Status::Pass
        } else {
            Status::Fail
        };

        sink.enqueue(AuditResult::new(
            &self.module,
            NAME,
            findings,
            self.tolerance,
            status,
        ));
        Ok(())
    }
}
