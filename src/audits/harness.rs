//! Harness reuse and isolation audit.
//!
//! Rule A: tests in the data/sync/ui layers must lean on the matching
//! area-specific harness helpers instead of growing their own. Rule B: no
//! top-level declaration outside the harness package may reuse a canonical
//! helper name.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::audits::{Audit, ReportSink};
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::{list_source_files, module_relative, read_header};
use crate::whitelist::WhitelistMatcher;

pub const NAME: &str = "HarnessReuseIsolationAudit";

const AREAS: &[&str] = &["data", "sync", "ui"];

pub struct HarnessReuseIsolationAudit {
    module: String,
    module_dir: PathBuf,
    root_package: String,
    harness_package: String,
    area_helpers: Vec<(&'static str, Vec<String>)>,
    canonical_simple_names: HashSet<String>,
    whitelist: WhitelistMatcher,
}

impl HarnessReuseIsolationAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &HarnessConfig,
    ) -> Self {
        let area_helpers = vec![
            ("data", config.data_helpers.clone()),
            ("sync", config.sync_helpers.clone()),
            ("ui", config.ui_helpers.clone()),
        ];
        let canonical_simple_names = config
            .data_helpers
            .iter()
            .chain(&config.sync_helpers)
            .chain(&config.ui_helpers)
            .chain(&config.shared_helpers)
            .map(|fqcn| simple_name(fqcn).to_string())
            .collect();
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            root_package: config.root_package.clone(),
            harness_package: config.harness_package.clone(),
            area_helpers,
            canonical_simple_names,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }

    /// Rule A over `src/test/**`.
    fn check_area_usage(&self, findings: &mut Vec<Finding>) -> Result<()> {
        for path in list_source_files(&self.module_dir.join("src/test")) {
            let header = read_header(&path)?;
            let Some(package) = header.package.as_deref() else {
                continue;
            };
            let Some(area) = AREAS
                .iter()
                .copied()
                .find(|area| in_package(package, &format!("{}.{}", self.root_package, area)))
            else {
                continue;
            };
            if header
                .imports
                .iter()
                .any(|imp| self.whitelist.matches_fqcn_or_symbol(&imp.fqcn))
            {
                continue;
            }

            let helpers = self
                .area_helpers
                .iter()
                .find(|(name, _)| *name == area)
                .map(|(_, helpers)| helpers.as_slice())
                .unwrap_or_default();
            let satisfied = header
                .imports
                .iter()
                .any(|imp| helpers.iter().any(|h| helper_matches(&imp.fqcn, h)));
            if !satisfied {
                findings.push(
                    Finding::new(
                        FindingKind::MissingHarnessHelper,
                        format!("test in the {} layer imports no {} harness helpers", area, area),
                    )
                    .with_file(module_relative(&self.module_dir, &path))
                    .with_line(header.package_line.unwrap_or(1)),
                );
            }
        }
        Ok(())
    }

    /// Rule B over every source set.
    fn check_helper_clones(&self, findings: &mut Vec<Finding>) -> Result<()> {
        for path in list_source_files(&self.module_dir.join("src")) {
            let header = read_header(&path)?;
            let package = header.package.as_deref().unwrap_or_default();
            if in_package(package, &self.harness_package) {
                continue;
            }
            for declaration in &header.declarations {
                if !self.canonical_simple_names.contains(&declaration.name) {
                    continue;
                }
                let fqcn = if package.is_empty() {
                    declaration.name.clone()
                } else {
                    format!("{}.{}", package, declaration.name)
                };
                if self.whitelist.matches_fqcn_or_symbol(&fqcn) {
                    continue;
                }
                findings.push(
                    Finding::new(
                        FindingKind::LocalHelperClone,
                        format!(
                            "'{}' clones a harness helper name outside {}",
                            declaration.name, self.harness_package
                        ),
                    )
                    .with_file(module_relative(&self.module_dir, &path))
                    .with_line(declaration.line),
                );
            }
        }
        Ok(())
    }
}

impl Audit for HarnessReuseIsolationAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let mut findings = Vec::new();
        self.check_area_usage(&mut findings)?;
        self.check_helper_clones(&mut findings)?;

        let status = if findings.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        sink.enqueue(AuditResult::new(&self.module, NAME, findings, 0, status));
        Ok(())
    }
}

/// Whether `package` is `root` or a subpackage of it.
fn in_package(package: &str, root: &str) -> bool {
    package == root || package.starts_with(&format!("{}.", root))
}

/// Helper-set entries are FQCN prefixes: an import satisfies one when it
/// names the entry, something under it, or wildcard-imports its package.
fn helper_matches(import: &str, helper: &str) -> bool {
    let import = import.strip_suffix(".*").unwrap_or(import);
    import == helper
        || import.starts_with(&format!("{}.", helper))
        || helper.starts_with(&format!("{}.", import))
}

fn simple_name(fqcn: &str) -> &str {
    fqcn.rsplit('.').next().unwrap_or(fqcn)
}
