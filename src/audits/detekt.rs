//! Static-analysis audit over a Checkstyle-style detekt report.
//!
//! Only `error`-severity entries count. Findings whose rule id is configured
//! as hard-failing sink the module outright; the rest are soft findings held
//! against the module's file count.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::audits::{Audit, ReportSink};
use crate::config::DetektConfig;
use crate::error::Result;
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::scan_source_files;
use crate::whitelist::WhitelistMatcher;
use crate::xml::parse_xml;

pub const NAME: &str = "DetektAudit";

const REPORT_PATH: &str = "build/reports/detekt/detekt.xml";

static BRACKETED_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\w+)\]").unwrap());

static RULE_ID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ruleId:\s*(\w+)").unwrap());

pub struct DetektAudit {
    module: String,
    module_dir: PathBuf,
    tolerance: u32,
    hard_fail_rule_ids: HashSet<String>,
    whitelist: WhitelistMatcher,
}

impl DetektAudit {
    pub fn new(module: impl Into<String>, module_dir: impl Into<PathBuf>, config: &DetektConfig) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            tolerance: config.tolerance_percent,
            hard_fail_rule_ids: config.hard_fail_rule_ids.iter().cloned().collect(),
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }
}

impl Audit for DetektAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let report = parse_xml(&self.module_dir.join(REPORT_PATH))?;
        let scanned = scan_source_files(&self.module_dir);

        let mut findings = Vec::new();
        let mut hard = 0usize;
        for file in report.children_named("file") {
            let Some(path) = file.attr("name") else {
                continue;
            };
            if self.whitelist.matches_path(path) {
                continue;
            }
            for error in file.children_named("error") {
                let severity = error.attr("severity").unwrap_or_default();
                if !severity.eq_ignore_ascii_case("error") {
                    continue;
                }
                let message = error.attr("message").unwrap_or_default();
                let rule_id = extract_rule_id(error.attr("source"), message);
                if self.hard_fail_rule_ids.contains(&rule_id) {
                    hard += 1;
                }
                let mut finding =
                    Finding::new(FindingKind::DetektRuleViolation, message).with_file(path);
                finding.line = error.attr_usize("line");
                finding.severity = Some(severity.to_string());
                findings.push(finding);
            }
        }

        let soft = findings.len() - hard;
        let status = if hard > 0 {
            Status::Fail
        } else if soft * 100 <= self.tolerance as usize * scanned {
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

/// Rule id resolution, in order: `source` attribute (stripping the `detekt.`
/// prefix, else its simple name), a `[RuleId]` bracket in the message, a
/// `ruleId:` message prefix, else `Unknown`.
fn extract_rule_id(source: Option<&str>, message: &str) -> String {
    if let Some(source) = source.filter(|s| !s.trim().is_empty()) {
        if let Some(stripped) = source.strip_prefix("detekt.") {
            return stripped.to_string();
        }
        return source.rsplit('.').next().unwrap_or(source).to_string();
    }
    if let Some(caps) = BRACKETED_RULE.captures(message) {
        return caps[1].to_string();
    }
    if let Some(caps) = RULE_ID_PREFIX.captures(message) {
        return caps[1].to_string();
    }
    "Unknown".to_string()
}
