//! Branch-coverage audit over a JaCoCo XML report.
//!
//! Only class-level BRANCH counters are aggregated; counters under `<method>`
//! are ignored. The result's `findingCount` carries the total percentage
//! rounded to one decimal rather than a findings length.

use std::path::PathBuf;

use crate::audits::{Audit, ReportSink};
use crate::config::CoverageConfig;
use crate::error::Result;
use crate::model::{AuditResult, Finding, FindingCount, FindingKind, Status};
use crate::whitelist::WhitelistMatcher;
use crate::xml::{Element, parse_xml};

pub const NAME: &str = "CoverageBranchesAudit";

const REPORT_PATH: &str =
    "build/reports/jacoco/testDebugUnitTestReport/testDebugUnitTestReport.xml";

pub struct CoverageBranchesAudit {
    module: String,
    module_dir: PathBuf,
    min_percent: u32,
    whitelist: WhitelistMatcher,
}

impl CoverageBranchesAudit {
    pub fn new(
        module: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        config: &CoverageConfig,
    ) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            min_percent: config.min_percent,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }
}

#[derive(Debug)]
struct ClassBranches {
    name: String,
    missed: u64,
    covered: u64,
}

impl ClassBranches {
    fn percent(&self) -> f64 {
        let total = self.missed + self.covered;
        if total == 0 {
            0.0
        } else {
            self.covered as f64 / total as f64 * 100.0
        }
    }
}

impl Audit for CoverageBranchesAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let report = parse_xml(&self.module_dir.join(REPORT_PATH))?;

        let mut classes = Vec::new();
        collect_classes(&report, &mut classes);
        classes.retain(|c| !self.whitelist.matches_fqcn_or_symbol(&c.name));

        let covered: u64 = classes.iter().map(|c| c.covered).sum();
        let missed: u64 = classes.iter().map(|c| c.missed).sum();
        let total_pct = if covered + missed == 0 {
            0.0
        } else {
            round1(covered as f64 / (covered + missed) as f64 * 100.0)
        };

        let threshold = self.min_percent as f64;
        let status = if total_pct >= threshold {
            Status::Pass
        } else {
            Status::Fail
        };

        let mut findings = Vec::new();
        if status == Status::Fail {
            let mut offenders: Vec<&ClassBranches> = classes
                .iter()
                .filter(|c| c.missed + c.covered > 0 && c.percent() < threshold)
                .collect();
            offenders.sort_by(|a, b| {
                a.percent()
                    .partial_cmp(&b.percent())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.name.cmp(&b.name))
            });
            findings = offenders
                .into_iter()
                .map(|c| {
                    Finding::new(
                        FindingKind::ClassBelowThreshold,
                        format!(
                            "{} branch coverage {:.1}% is below the {}% threshold",
                            c.name,
                            c.percent(),
                            self.min_percent
                        ),
                    )
                })
                .collect();
        }

        sink.enqueue(AuditResult::with_count(
            &self.module,
            NAME,
            findings,
            self.min_percent,
            FindingCount::Percent(total_pct),
            status,
        ));
        Ok(())
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Collect class-level BRANCH counters anywhere in the report tree, without
/// descending into `<method>` elements.
fn collect_classes(element: &Element, classes: &mut Vec<ClassBranches>) {
    for child in &element.children {
        if child.name == "class" {
            let name = child.attr("name").unwrap_or_default().to_string();
            let mut missed = 0;
            let mut covered = 0;
            for counter in child.children_named("counter") {
                if counter.attr("type") == Some("BRANCH") {
                    missed += counter.attr_usize("missed").unwrap_or(0) as u64;
                    covered += counter.attr_usize("covered").unwrap_or(0) as u64;
                }
            }
            classes.push(ClassBranches {
                name,
                missed,
                covered,
            });
        } else if child.name != "method" {
            collect_classes(child, classes);
        }
    }
}
