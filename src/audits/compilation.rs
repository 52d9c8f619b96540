//! Compilation audit: turns captured compiler stderr into findings.
//!
//! The parser is a two-state machine (idle / pending error). Each line either
//! starts a new error, extends the pending one (message or stacktrace), or
//! flushes it. Recognized error starts cover the Kotlin build-tool and CLI
//! formats, javac, and annotation-processor output with and without a
//! location.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::audits::{Audit, ReportSink};
use crate::capture::CompilationCapture;
use crate::error::Result;
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::module_relative;

pub const NAME: &str = "CompilationAudit";

static AP_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^e:\s*\[(ksp\d*|kapt)\]\s*(.*)$").unwrap());

static KOTLIN_GRADLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^e:\s*(.+?):\s*\((\d+),\s*(\d+)\):\s*(.*)$").unwrap());

static KSP_LOCATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[ksp(\d*)\]\s*(.+?):(\d+):(\d+):\s*(.*)$").unwrap());

static KOTLIN_CLI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+):(\d+):\s*error:\s*(.*)$").unwrap());

static JAVAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+):\s*error:\s*(.*)$").unwrap());

pub struct CompilationAudit {
    module: String,
    module_dir: PathBuf,
    capture: Arc<CompilationCapture>,
}

impl CompilationAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        capture: Arc<CompilationCapture>,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            capture,
        }
    }
}

impl Audit for CompilationAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let findings = parse_stderr(&self.capture.snapshot(), &self.module_dir);
        let status = if findings.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        sink.enqueue(AuditResult::new(&self.module, NAME, findings, 0, status));
        Ok(())
    }
}

#[derive(Debug)]
struct PendingError {
    file: Option<String>,
    line: Option<usize>,
    message: String,
    stacktrace: Vec<String>,
}

/// Single pass over the captured stderr, CRLF tolerated.
pub fn parse_stderr(text: &str, module_dir: &Path) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut pending: Option<PendingError> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut pending, &mut findings);
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("symbol:") || trimmed.starts_with("location:") {
            if let Some(error) = pending.as_mut() {
                error.message.push(' ');
                error.message.push_str(line.trim());
            }
            continue;
        }

        if line.starts_with("at ")
            || line.starts_with('\t')
            || line.starts_with("    ")
            || line.starts_with('^')
            || line.starts_with("> Task :")
        {
            if let Some(error) = pending.as_mut() {
                error.stacktrace.push(line.trim().to_string());
            }
            continue;
        }

        if let Some(started) = classify_start(line, module_dir) {
            flush(&mut pending, &mut findings);
            pending = Some(started);
        }
        // Anything else between errors is noise.
    }

    flush(&mut pending, &mut findings);
    findings
}

fn classify_start(line: &str, module_dir: &Path) -> Option<PendingError> {
    if let Some(caps) = AP_SHORT.captures(line) {
        return Some(PendingError {
            file: None,
            line: None,
            message: caps[2].to_string(),
            stacktrace: Vec::new(),
        });
    }
    if let Some(caps) = KOTLIN_GRADLE.captures(line) {
        return Some(located(&caps[1], &caps[2], &caps[4], module_dir));
    }
    if let Some(caps) = KSP_LOCATED.captures(line) {
        return Some(located(&caps[2], &caps[3], &caps[5], module_dir));
    }
    if let Some(caps) = KOTLIN_CLI.captures(line) {
        return Some(located(&caps[1], &caps[2], &caps[4], module_dir));
    }
    if let Some(caps) = JAVAC.captures(line) {
        return Some(located(&caps[1], &caps[2], &caps[3], module_dir));
    }
    None
}

fn located(path: &str, line: &str, message: &str, module_dir: &Path) -> PendingError {
    PendingError {
        file: Some(module_relative(module_dir, Path::new(path))),
        line: line.parse().ok(),
        message: message.to_string(),
        stacktrace: Vec::new(),
    }
}

fn flush(pending: &mut Option<PendingError>, findings: &mut Vec<Finding>) {
    if let Some(error) = pending.take() {
        let mut finding = Finding::new(FindingKind::CompilationError, error.message)
            .with_stacktrace(error.stacktrace);
        finding.file_path = error.file;
        finding.line = error.line;
        findings.push(finding);
    }
}
