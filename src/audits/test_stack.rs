//! JVM test-stack audit: banned frameworks, banned skip annotations, and
//! coroutine-test correctness in `src/test/kotlin`.
//!
//! Each trigger fires at most once per file, at its first match.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::audits::{Audit, ReportSink};
use crate::config::TestStackConfig;
use crate::error::{GateError, Result};
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::{list_source_files, module_relative, parse_header};
use crate::whitelist::WhitelistMatcher;

pub const NAME: &str = "TestStackAudit";

const BANNED_IMPORT_PREFIXES: &[&str] = &[
    "androidx.test.",
    "org.robolectric.",
    "androidx.test.espresso.",
    "androidx.compose.ui.test.",
];

static BANNED_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:org\.junit(?:\.\w+)*\.)?(?:Ignore|Disabled\w*)\b").unwrap()
});

static RUN_BLOCKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brunBlocking\s*[({]").unwrap());

static THREAD_SLEEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bThread\.sleep\s*\(").unwrap());

static SCHEDULER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:advanceUntilIdle|advanceTimeBy|runCurrent)\s*\(|\b(?:TestCoroutineScheduler|StandardTestDispatcher|UnconfinedTestDispatcher|TestScope)\b",
    )
    .unwrap()
});

static RUN_TEST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\brunTest\s*[({]").unwrap());

static MAIN_DISPATCHER_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Dispatchers\.Main\b|\bviewModelScope\b").unwrap());

pub struct TestStackAudit {
    module: String,
    module_dir: PathBuf,
    whitelist: WhitelistMatcher,
}

impl TestStackAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &TestStackConfig,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            whitelist: WhitelistMatcher::new(&config.whitelist_files),
        }
    }

    fn check_file(&self, content: &str, rel: &str, findings: &mut Vec<Finding>) {
        let header = parse_header(content);

        if let Some(import) = header.imports.iter().find(|imp| {
            imp.fqcn == "org.junit.Test"
                || BANNED_IMPORT_PREFIXES
                    .iter()
                    .any(|prefix| imp.fqcn.starts_with(prefix))
        }) {
            findings.push(
                Finding::new(
                    FindingKind::BannedImport,
                    format!("banned import {}", import.fqcn),
                )
                .with_file(rel)
                .with_line(import.line),
            );
        }

        if let Some(m) = BANNED_ANNOTATION.find(content) {
            findings.push(
                Finding::new(
                    FindingKind::BannedAnnotation,
                    format!("banned annotation {}", m.as_str()),
                )
                .with_file(rel)
                .with_line(line_of(content, m.start())),
            );
        }

        let has_run_test = RUN_TEST.is_match(content);
        let misuse = [
            RUN_BLOCKING.find(content),
            THREAD_SLEEP.find(content),
            SCHEDULER_TOKEN.find(content).filter(|_| !has_run_test),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|m| m.start());
        if let Some(m) = misuse {
            findings.push(
                Finding::new(
                    FindingKind::CoroutinesMisuse,
                    format!("coroutine misuse: {}", m.as_str().trim()),
                )
                .with_file(rel)
                .with_line(line_of(content, m.start())),
            );
        }

        if !content.contains("MainDispatcherRule") {
            if let Some(m) = MAIN_DISPATCHER_USE.find(content) {
                findings.push(
                    Finding::new(
                        FindingKind::MissingMainDispatcherRule,
                        format!("{} used without a MainDispatcherRule", m.as_str()),
                    )
                    .with_file(rel)
                    .with_line(line_of(content, m.start())),
                );
            }
        }
    }
}

impl Audit for TestStackAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let mut findings = Vec::new();
        for path in list_source_files(&self.module_dir.join("src/test/kotlin")) {
            if path.extension().is_none_or(|e| e != "kt") {
                continue;
            }
            let rel = module_relative(&self.module_dir, &path);
            if self.whitelist.matches_path(&rel) {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| GateError::io(&path, e))?;
            self.check_file(&content, &rel, &mut findings);
        }

        let status = if findings.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        sink.enqueue(AuditResult::new(&self.module, NAME, findings, 0, status));
        Ok(())
    }
}

fn line_of(content: &str, offset: usize) -> usize {
    1 + content[..offset].matches('\n').count()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::audits::testutil::CollectSink;

    fn write_test(dir: &Path, name: &str, content: &str) {
        let path = dir.join("src/test/kotlin").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run(dir: &Path, whitelist: &[&str]) -> AuditResult {
        let config = TestStackConfig {
            whitelist_files: whitelist.iter().map(|s| s.to_string()).collect(),
        };
        let audit = TestStackAudit::new(":app", dir, &config);
        let sink = CollectSink::new();
        audit.check(&sink).unwrap();
        sink.single()
    }

    #[test]
    fn junit4_test_import_is_banned() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "ATest.kt",
            "package com.example\nimport org.junit.Test\nclass ATest\n",
        );

        let result = run(dir.path(), &[]);
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.findings[0].kind, FindingKind::BannedImport);
        assert_eq!(result.findings[0].line, Some(2));
    }

    #[test]
    fn junit5_test_import_is_fine() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "ATest.kt",
            "package com.example\nimport org.junit.jupiter.api.Test\nclass ATest\n",
        );
        assert_eq!(run(dir.path(), &[]).status, Status::Pass);
    }

    #[test]
    fn instrumentation_framework_imports_are_banned() {
        for import in [
            "androidx.test.core.app.ApplicationProvider",
            "org.robolectric.RobolectricTestRunner",
            "androidx.compose.ui.test.junit4.createComposeRule",
        ] {
            let dir = tempdir().unwrap();
            write_test(
                dir.path(),
                "ATest.kt",
                &format!("package com.example\nimport {}\nclass ATest\n", import),
            );
            let result = run(dir.path(), &[]);
            assert_eq!(result.status, Status::Fail, "import: {}", import);
        }
    }

    #[test]
    fn ignore_and_disabled_annotations_are_banned() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "ATest.kt",
            "package com.example\nclass ATest {\n    @Ignore(\"flaky\")\n    fun skipped() {}\n}\n",
        );
        let result = run(dir.path(), &[]);
        assert_eq!(result.findings[0].kind, FindingKind::BannedAnnotation);
        assert_eq!(result.findings[0].line, Some(3));

        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "BTest.kt",
            "package com.example\n@org.junit.Ignore\nclass BTest\n",
        );
        assert_eq!(run(dir.path(), &[]).findings[0].kind, FindingKind::BannedAnnotation);

        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "CTest.kt",
            "package com.example\nclass CTest {\n    @DisabledOnOs\n    fun skipped() {}\n}\n",
        );
        assert_eq!(run(dir.path(), &[]).findings[0].kind, FindingKind::BannedAnnotation);
    }

    #[test]
    fn run_blocking_and_thread_sleep_are_misuse() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "ATest.kt",
            "package com.example\nfun t() = runBlocking {\n    Thread.sleep(100)\n}\n",
        );
        let result = run(dir.path(), &[]);
        // One COROUTINES_MISUSE finding per file, at the first match.
        let misuse: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::CoroutinesMisuse)
            .collect();
        assert_eq!(misuse.len(), 1);
        assert_eq!(misuse[0].line, Some(2));
    }

    #[test]
    fn scheduler_tokens_require_run_test() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "NoRunTest.kt",
            "package com.example\nval dispatcher = StandardTestDispatcher()\n",
        );
        let result = run(dir.path(), &[]);
        assert_eq!(result.findings[0].kind, FindingKind::CoroutinesMisuse);

        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "WithRunTest.kt",
            "package com.example\nimport kotlinx.coroutines.test.runTest\n\
             fun t() = runTest {\n    advanceUntilIdle()\n}\n",
        );
        assert_eq!(run(dir.path(), &[]).status, Status::Pass);
    }

    #[test]
    fn dispatchers_main_requires_the_rule() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "VmTest.kt",
            "package com.example\nfun t() { viewModelScope.launch { } }\n",
        );
        let result = run(dir.path(), &[]);
        assert_eq!(result.findings[0].kind, FindingKind::MissingMainDispatcherRule);

        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "VmRuleTest.kt",
            "package com.example\nval mainDispatcherRule = MainDispatcherRule()\n\
             fun t() { viewModelScope.launch { } }\n",
        );
        assert_eq!(run(dir.path(), &[]).status, Status::Pass);
    }

    #[test]
    fn whitelisted_files_are_skipped() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "LegacyTest.kt",
            "package com.example\nimport org.junit.Test\nclass LegacyTest\n",
        );
        let result = run(dir.path(), &["src/test/kotlin/LegacyTest.kt"]);
        assert_eq!(result.status, Status::Pass);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn multiple_trigger_types_in_one_file() {
        let dir = tempdir().unwrap();
        write_test(
            dir.path(),
            "MessyTest.kt",
            "package com.example\n\
             import org.junit.Test\n\
             class MessyTest {\n\
                 @Ignore\n\
                 fun a() = runBlocking { Dispatchers.Main }\n\
             }\n",
        );
        let result = run(dir.path(), &[]);
        let kinds: Vec<_> = result.findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FindingKind::BannedImport,
                FindingKind::BannedAnnotation,
                FindingKind::CoroutinesMisuse,
                FindingKind::MissingMainDispatcherRule,
            ]
        );
    }
}
