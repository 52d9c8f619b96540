//! Collects every audit verdict, persists the JSON report, and gates the
//! build.
//!
//! Audits enqueue concurrently; the end-of-build `close` runs once, after
//! all of them. `close` is idempotent over a given snapshot: a second call
//! rewrites the same JSON and reaches the same verdict.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use colored::Colorize;

use crate::audits::ReportSink;
use crate::error::{GateError, Result};
use crate::model::AuditResult;
use crate::uploader::ReportUploader;

pub struct ReportAggregator {
    results: Mutex<Vec<AuditResult>>,
    report_path: PathBuf,
    upload_enabled: bool,
}

impl ReportSink for ReportAggregator {
    fn enqueue(&self, result: AuditResult) {
        self.lock().push(result);
    }
}

impl ReportAggregator {
    pub fn new(report_path: impl Into<PathBuf>, upload_enabled: bool) -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            report_path: report_path.into(),
            upload_enabled,
        }
    }

    pub fn report_path(&self) -> &PathBuf {
        &self.report_path
    }

    /// All results enqueued so far, in enqueue order.
    pub fn snapshot(&self) -> Vec<AuditResult> {
        self.lock().clone()
    }

    /// End-of-build routine: serialize, persist, optionally upload, then
    /// decide pass/fail. An empty snapshot returns silently. A `FAIL`
    /// verdict raises [`GateError::BuildFailed`] after the JSON is written.
    pub fn close(&self, uploader: Option<&dyn ReportUploader>) -> Result<Vec<AuditResult>> {
        let results = self.snapshot();
        if results.is_empty() {
            return Ok(results);
        }

        let json = serde_json::to_string_pretty(&results).map_err(|e| GateError::ReportWrite {
            path: self.report_path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        if let Some(parent) = self.report_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| GateError::ReportWrite {
                    path: self.report_path.clone(),
                    source: e,
                })?;
            }
        }
        fs::write(&self.report_path, &json).map_err(|e| GateError::ReportWrite {
            path: self.report_path.clone(),
            source: e,
        })?;

        let mut online_url = None;
        if self.upload_enabled {
            if let Some(uploader) = uploader {
                match uploader.upload_pretty_json(&json) {
                    Ok(url) => online_url = url,
                    Err(err) => {
                        eprintln!(
                            "{} report upload failed: {:#}",
                            "warning:".bold().yellow(),
                            err
                        );
                    }
                }
            }
        }

        let failing: Vec<String> = results
            .iter()
            .filter(|r| r.failed())
            .map(|r| format!("{}:{}", r.module, r.name))
            .collect();
        if !failing.is_empty() {
            let online = match online_url {
                Some(url) => with_json_suffix(url),
                None => "unavailable".to_string(),
            };
            return Err(GateError::BuildFailed(format!(
                "Build Failed. The following audits failed: {}\nLocal json: {}\nOnline json: {}",
                failing.join(", "),
                self.report_path.display(),
                online,
            )));
        }

        eprintln!("{}", "testgate: all audits passed".green());
        Ok(results)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditResult>> {
        self.results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn with_json_suffix(url: String) -> String {
    if url.ends_with(".json") {
        url
    } else {
        format!("{}.json", url)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::model::{Finding, FindingKind, Status};

    struct FixedUploader(Option<String>);

    impl ReportUploader for FixedUploader {
        fn upload_pretty_json(&self, _json: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingUploader;

    impl ReportUploader for FailingUploader {
        fn upload_pretty_json(&self, _json: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("paste service unreachable"))
        }
    }

    fn pass(module: &str, name: &str) -> AuditResult {
        AuditResult::new(module, name, Vec::new(), 10, Status::Pass)
    }

    fn fail(module: &str, name: &str) -> AuditResult {
        AuditResult::new(
            module,
            name,
            vec![Finding::new(FindingKind::DetektRuleViolation, "bad")],
            10,
            Status::Fail,
        )
    }

    #[test]
    fn empty_snapshot_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/results.json");
        let aggregator = ReportAggregator::new(&path, true);
        let results = aggregator.close(None).unwrap();
        assert!(results.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn snapshot_preserves_enqueue_order() {
        let aggregator = ReportAggregator::new("unused.json", false);
        aggregator.enqueue(pass(":app", "DetektAudit"));
        aggregator.enqueue(pass(":lib", "TestsAudit"));
        aggregator.enqueue(pass(":app", "FixturesAudit"));

        let names: Vec<_> = aggregator
            .snapshot()
            .iter()
            .map(|r| format!("{}:{}", r.module, r.name))
            .collect();
        assert_eq!(names, vec![":app:DetektAudit", ":lib:TestsAudit", ":app:FixturesAudit"]);
    }

    #[test]
    fn close_writes_pretty_json_that_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build/reports/testgate-results.json");
        let aggregator = ReportAggregator::new(&path, false);
        aggregator.enqueue(pass(":app", "DetektAudit"));

        let results = aggregator.close(None).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let parsed: Vec<AuditResult> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, results);
        // Pretty printing: one entry per line block, not a single line.
        assert!(written.contains("\n"));
        assert!(written.trim_start().starts_with('['));
    }

    #[test]
    fn string_escaping_is_invertible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        let aggregator = ReportAggregator::new(&path, false);
        let mut finding = Finding::new(
            FindingKind::TestFailure,
            "C#m: quotes \" backslash \\ newline \n tab \t bell \u{7}",
        );
        finding.stacktrace = vec!["at C.m(C.kt:1)".to_string()];
        aggregator.enqueue(AuditResult::new(
            ":app",
            "TestsAudit",
            vec![finding],
            10,
            Status::Pass,
        ));

        let results = aggregator.close(None).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\\u0007"));
        let parsed: Vec<AuditResult> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn build_failure_lists_every_failing_pair() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        let aggregator = ReportAggregator::new(&path, false);
        aggregator.enqueue(pass(":app", "ForbiddenImport"));
        aggregator.enqueue(fail(":lib", "ForbiddenMethodCall"));
        aggregator.enqueue(fail(":app", "TestsAudit"));

        let err = aggregator.close(None).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Build Failed. The following audits failed: "));
        assert!(message.contains(":lib:ForbiddenMethodCall, :app:TestsAudit"));
        assert!(!message.contains(":app:ForbiddenImport"));
        assert!(message.contains(&format!("Local json: {}", path.display())));
        assert!(message.contains("Online json: unavailable"));
        // The report is still written before the failure is raised.
        assert!(path.exists());
    }

    #[test]
    fn online_url_gets_a_json_suffix() {
        let dir = tempdir().unwrap();
        let aggregator = ReportAggregator::new(dir.path().join("r.json"), true);
        aggregator.enqueue(fail(":lib", "ForbiddenMethodCall"));

        let uploader = FixedUploader(Some("http://paste.rs/abc".to_string()));
        let err = aggregator.close(Some(&uploader)).unwrap_err();
        assert!(err.to_string().contains("Online json: http://paste.rs/abc.json"));

        let aggregator = ReportAggregator::new(dir.path().join("r2.json"), true);
        aggregator.enqueue(fail(":lib", "ForbiddenMethodCall"));
        let uploader = FixedUploader(Some("http://paste.rs/abc.json".to_string()));
        let err = aggregator.close(Some(&uploader)).unwrap_err();
        assert!(err.to_string().contains("Online json: http://paste.rs/abc.json"));
    }

    #[test]
    fn upload_errors_do_not_fail_a_passing_build() {
        let dir = tempdir().unwrap();
        let aggregator = ReportAggregator::new(dir.path().join("r.json"), true);
        aggregator.enqueue(pass(":app", "DetektAudit"));
        assert!(aggregator.close(Some(&FailingUploader)).is_ok());
    }

    #[test]
    fn upload_disabled_never_calls_the_uploader() {
        struct PanickingUploader;
        impl ReportUploader for PanickingUploader {
            fn upload_pretty_json(&self, _json: &str) -> anyhow::Result<Option<String>> {
                panic!("uploader must not run when disabled");
            }
        }

        let dir = tempdir().unwrap();
        let aggregator = ReportAggregator::new(dir.path().join("r.json"), false);
        aggregator.enqueue(pass(":app", "DetektAudit"));
        aggregator.close(Some(&PanickingUploader)).unwrap();
    }

    #[test]
    fn close_is_idempotent_over_a_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.json");
        let aggregator = ReportAggregator::new(&path, false);
        aggregator.enqueue(pass(":app", "DetektAudit"));

        aggregator.close(None).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        aggregator.close(None).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeply/nested/reports/r.json");
        let aggregator = ReportAggregator::new(&path, false);
        aggregator.enqueue(pass(":app", "DetektAudit"));
        aggregator.close(None).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_report_path_is_a_processing_error() {
        let dir = tempdir().unwrap();
        // The parent "path" is a file, so creating the directory fails.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let aggregator = ReportAggregator::new(blocker.join("r.json"), false);
        aggregator.enqueue(pass(":app", "DetektAudit"));

        let err = aggregator.close(None).unwrap_err();
        assert!(matches!(err, GateError::ReportWrite { .. }));
        assert!(err.is_processing_error());
    }
}
