//! Structure audit: source-set layout, harness dependency wiring, and the
//! instrumented-test import scope.
//!
//! Layout rules carry zero tolerance; only the instrumented-import scope has
//! a configurable one.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::audits::{Audit, ReportSink};
use crate::config::StructureConfig;
use crate::error::{GateError, Result};
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::{list_source_files, module_relative, read_header};
use crate::whitelist::WhitelistMatcher;

pub const NAME: &str = "StructureAudit";

const BUILD_FILES: &[&str] = &["build.gradle", "build.gradle.kts"];

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());

pub struct StructureAudit {
    module: String,
    module_dir: PathBuf,
    harness_coordinate: String,
    dependency_forms: [Regex; 2],
    instrumented_root_package: String,
    instrumented_allow_list: WhitelistMatcher,
    instrumented_tolerance: u32,
}

impl StructureAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &StructureConfig,
    ) -> Self {
        let coordinate = regex::escape(&config.harness_coordinate);
        // Parenthesized (Kotlin DSL) and space-separated (Groovy) forms.
        let parenthesized = Regex::new(&format!(
            r#"\w+\s*\(\s*project\s*\(\s*["']{}["']\s*\)\s*\)"#,
            coordinate
        ))
        .unwrap();
        let bare = Regex::new(&format!(
            r#"\w+\s+project\s*\(\s*["']{}["']\s*\)"#,
            coordinate
        ))
        .unwrap();
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            harness_coordinate: config.harness_coordinate.clone(),
            dependency_forms: [parenthesized, bare],
            instrumented_root_package: config.instrumented_root_package.clone(),
            instrumented_allow_list: WhitelistMatcher::new(&config.instrumented_allow_list),
            instrumented_tolerance: config.instrumented_tolerance_percent,
        }
    }

    fn shared_test_findings(&self) -> Vec<Finding> {
        let root = self.module_dir.join("src/sharedTest");
        if !root.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<_> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| module_relative(&self.module_dir, e.path()))
            .collect();
        files.sort();
        files
            .into_iter()
            .map(|rel| {
                Finding::new(
                    FindingKind::SharedTestSourceSet,
                    "src/sharedTest is banned; move sources to src/test or src/androidTest",
                )
                .with_file(rel)
            })
            .collect()
    }

    fn misplaced_test_findings(&self) -> Vec<Finding> {
        let test_root = self.module_dir.join("src/test");
        let kotlin_root = self.module_dir.join("src/test/kotlin");
        let mut findings = Vec::new();
        for path in list_source_files(&test_root) {
            let rel = module_relative(&self.module_dir, &path);
            let is_java = path.extension().is_some_and(|e| e == "java");
            if is_java {
                findings.push(
                    Finding::new(
                        FindingKind::MisplacedTestSource,
                        "Java sources are not allowed under src/test",
                    )
                    .with_file(rel),
                );
            } else if !path.starts_with(&kotlin_root) {
                findings.push(
                    Finding::new(
                        FindingKind::MisplacedTestSource,
                        "Kotlin test sources must live under src/test/kotlin",
                    )
                    .with_file(rel),
                );
            }
        }
        findings
    }

    /// Whether the module declares a dependency on the harness project, in
    /// either the parenthesized or the space-separated declaration form.
    fn has_harness_dependency(&self) -> Result<bool> {
        let build_file = BUILD_FILES
            .iter()
            .map(|name| self.module_dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                GateError::missing_report(
                    self.module_dir.join(BUILD_FILES[0]),
                    "module build file not found (checked build.gradle and build.gradle.kts)",
                )
            })?;
        let content =
            fs::read_to_string(&build_file).map_err(|e| GateError::io(&build_file, e))?;
        let without_block_comments = BLOCK_COMMENT.replace_all(&content, "");
        let stripped = LINE_COMMENT.replace_all(&without_block_comments, "");

        Ok(self.dependency_forms.iter().any(|form| form.is_match(&stripped)))
    }

    fn instrumented_findings(&self) -> Result<(Vec<Finding>, usize, usize)> {
        let android_files = list_source_files(&self.module_dir.join("src/androidTest"));
        let total = android_files.len();
        let mut findings = Vec::new();
        let mut offending_files = 0usize;

        let root_prefix = format!("{}.", self.instrumented_root_package);
        for path in &android_files {
            let header = read_header(path)?;
            let offending: Vec<_> = header
                .imports
                .iter()
                .filter(|imp| {
                    imp.fqcn == self.instrumented_root_package
                        || imp.fqcn.starts_with(&root_prefix)
                })
                .filter(|imp| !self.instrumented_allow_list.matches_fqcn_or_symbol(&imp.fqcn))
                .collect();
            if let Some(first) = offending.first() {
                offending_files += 1;
                findings.push(
                    Finding::new(
                        FindingKind::ForbiddenInstrumentedImport,
                        format!(
                            "instrumented test imports {} outside the allowed API surface ({} offending import{})",
                            first.fqcn,
                            offending.len(),
                            if offending.len() == 1 { "" } else { "s" },
                        ),
                    )
                    .with_file(module_relative(&self.module_dir, path))
                    .with_line(first.line),
                );
            }
        }
        Ok((findings, offending_files, total))
    }
}

impl Audit for StructureAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let mut findings = self.shared_test_findings();
        findings.extend(self.misplaced_test_findings());

        let has_test_sources = !list_source_files(&self.module_dir.join("src/test")).is_empty()
            || WalkDir::new(self.module_dir.join("src/test/resources"))
                .into_iter()
                .filter_map(|e| e.ok())
                .any(|e| e.file_type().is_file());
        if has_test_sources && !self.has_harness_dependency()? {
            findings.push(Finding::new(
                FindingKind::MissingHarnessDependency,
                format!(
                    "module has test sources but no dependency on the {} harness project",
                    self.harness_coordinate
                ),
            ));
        }

        let structural_count = findings.len();
        let (instrumented, offending_files, android_total) = self.instrumented_findings()?;
        findings.extend(instrumented);

        let instrumented_over = offending_files * 100
            > self.instrumented_tolerance as usize * android_total;
        let status = if structural_count > 0 || instrumented_over {
            Status::Fail
        } else {
            Status::Pass
        };

        sink.enqueue(AuditResult::new(
            &self.module,
            NAME,
            findings,
            self.instrumented_tolerance,
            status,
        ));
        Ok(())
    }
}
