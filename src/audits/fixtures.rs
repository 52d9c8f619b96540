//! Fixtures audit: JSON fixtures must exist under `src/test/resources` and
//! stay inside the configured size window.

use std::path::PathBuf;

use walkdir::WalkDir;

use crate::audits::{Audit, ReportSink};
use crate::config::FixturesConfig;
use crate::error::{GateError, Result};
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::module_relative;
use crate::whitelist::WhitelistMatcher;

pub const NAME: &str = "FixturesAudit";

const FIXTURES_ROOT: &str = "src/test/resources";

pub struct FixturesAudit {
    module: String,
    module_dir: PathBuf,
    tolerance: u32,
    min_bytes: u64,
    max_bytes: u64,
    whitelist: WhitelistMatcher,
}

impl FixturesAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &FixturesConfig,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            tolerance: config.tolerance_percent,
            min_bytes: config.min_bytes,
            max_bytes: config.max_bytes,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }

    fn module_whitelisted(&self) -> bool {
        self.whitelist
            .matches_path(&self.module_dir.to_string_lossy())
            || self.whitelist.matches_fqcn_or_symbol(&self.module)
    }
}

impl Audit for FixturesAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let root = self.module_dir.join(FIXTURES_ROOT);
        let mut fixtures: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().is_some_and(|ext| ext == "json")
            })
            .map(|e| e.into_path())
            .collect();
        fixtures.sort();
        fixtures.retain(|p| !self.whitelist.matches_path(&module_relative(&self.module_dir, p)));

        let mut findings = Vec::new();
        let total = fixtures.len();
        let mut out_of_window = 0usize;

        if total == 0 && !self.module_whitelisted() {
            findings.push(Finding::new(
                FindingKind::MissingFixture,
                format!("no JSON fixtures under {}", FIXTURES_ROOT),
            ));
        }

        for path in &fixtures {
            let size = path
                .metadata()
                .map_err(|e| GateError::io(path, e))?
                .len();
            let rel = module_relative(&self.module_dir, path);
            if size < self.min_bytes {
                out_of_window += 1;
                findings.push(
                    Finding::new(
                        FindingKind::FixtureTooSmall,
                        format!("fixture is {} bytes, below the {}-byte minimum", size, self.min_bytes),
                    )
                    .with_file(rel)
                    .with_severity("warning"),
                );
            } else if size > self.max_bytes {
                out_of_window += 1;
                findings.push(
                    Finding::new(
                        FindingKind::FixtureOversize,
                        format!("fixture is {} bytes, above the {}-byte maximum", size, self.max_bytes),
                    )
                    .with_file(rel),
                );
            }
        }

        let presence_ok = total > 0 || self.module_whitelisted();
        let window_ok = out_of_window * 100 <= self.tolerance as usize * total;
        let status = if presence_ok && window_ok {
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
