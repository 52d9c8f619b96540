//! SQL and FTS audit over Room annotations in module sources.
//!
//! Extracts `@Query` bodies (single- and triple-quoted), bans raw query
//! escapes and complex SQL, enforces the RailEntry ordering guard, and locks
//! the module to FTS4.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::audits::{Audit, ReportSink};
use crate::config::SqlFtsConfig;
use crate::error::{GateError, Result};
use crate::model::{AuditResult, Finding, FindingKind, Status};
use crate::scanner::{list_source_files, module_relative};
use crate::whitelist::WhitelistMatcher;

pub const NAME: &str = "SqlFtsAudit";

static QUERY_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@Query\s*\(\s*").unwrap());

static RAW_QUERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*@RawQuery\b").unwrap());

static SUPPORT_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSupportSQLiteQuery\b").unwrap());

static COMPLEX_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(JOIN|UNION|WITH|CREATE|ALTER|INSERT|UPDATE|DELETE)\b").unwrap()
});

static RAIL_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bFROM\s+\S*RailEntry").unwrap());

static ORDER_BY_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ORDER\s+BY\s+position\b").unwrap());

static ORDER_BY_POPULARITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ORDER\s+BY\s+popularity\b").unwrap());

static FTS4: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@Fts4\b").unwrap());

static FTS5: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@Fts5\b").unwrap());

pub struct SqlFtsAudit {
    module: String,
    module_dir: PathBuf,
    tolerance: u32,
    whitelist: WhitelistMatcher,
}

impl SqlFtsAudit {
    pub fn new(module: impl Into<String>, module_dir: impl Into<PathBuf>, config: &SqlFtsConfig) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
            tolerance: config.tolerance_percent,
            whitelist: WhitelistMatcher::new(&config.whitelist_patterns),
        }
    }
}

impl Audit for SqlFtsAudit {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check(&self, sink: &dyn ReportSink) -> Result<()> {
        let files = list_source_files(&self.module_dir.join("src"));
        let scanned = files.len();

        let mut findings = Vec::new();
        let mut saw_any_fts = false;
        let mut saw_fts4 = false;

        for path in &files {
            let content = fs::read_to_string(path).map_err(|e| GateError::io(path, e))?;
            let rel = module_relative(&self.module_dir, path);
            let whitelisted = self.whitelist.matches_path(&rel);
            let queries = extract_queries(&content);

            if !whitelisted {
                for m in RAW_QUERY.find_iter(&content) {
                    findings.push(
                        Finding::new(FindingKind::RawQueryUsage, "@RawQuery is forbidden")
                            .with_file(&rel)
                            .with_line(line_of(&content, m.start())),
                    );
                }
                for m in SUPPORT_QUERY.find_iter(&content) {
                    findings.push(
                        Finding::new(
                            FindingKind::SupportSqliteQuery,
                            "SupportSQLiteQuery is forbidden",
                        )
                        .with_file(&rel)
                        .with_line(line_of(&content, m.start())),
                    );
                }
                for (sql, line) in &queries {
                    if let Some(caps) = COMPLEX_SQL.captures(sql) {
                        findings.push(
                            Finding::new(
                                FindingKind::ComplexQuery,
                                format!(
                                    "forbidden SQL keyword {} in @Query",
                                    caps[1].to_uppercase()
                                ),
                            )
                            .with_file(&rel)
                            .with_line(*line),
                        );
                    }
                }
            }

            // The rails guard and the FTS lock ignore the whitelist.
            for (sql, line) in &queries {
                if RAIL_FROM.is_match(sql) {
                    if ORDER_BY_POPULARITY.is_match(sql) {
                        findings.push(
                            Finding::new(
                                FindingKind::RailsOrdering,
                                "ORDER BY popularity is forbidden for RailEntry queries",
                            )
                            .with_file(&rel)
                            .with_line(*line),
                        );
                    } else if !ORDER_BY_POSITION.is_match(sql) {
                        findings.push(
                            Finding::new(
                                FindingKind::RailsOrdering,
                                "RailEntry queries must ORDER BY position",
                            )
                            .with_file(&rel)
                            .with_line(*line),
                        );
                    }
                }
            }
            for m in FTS5.find_iter(&content) {
                findings.push(
                    Finding::new(FindingKind::Fts5Usage, "@Fts5 is forbidden, use @Fts4")
                        .with_file(&rel)
                        .with_line(line_of(&content, m.start())),
                );
            }

            let has_fts4 = FTS4.is_match(&content);
            saw_any_fts |= has_fts4 || FTS5.is_match(&content);
            saw_fts4 |= has_fts4;
        }

        if saw_any_fts && !saw_fts4 {
            findings.push(Finding::new(
                FindingKind::FtsMissingFts4,
                "module declares FTS entities but none uses @Fts4",
            ));
        }

        let status = if findings.len() * 100 <= self.tolerance as usize * scanned.max(1) {
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

fn line_of(content: &str, offset: usize) -> usize {
    1 + content[..offset].matches('\n').count()
}

/// Collect `(sql, line)` pairs from `@Query(...)` annotations. Triple-quoted
/// bodies are taken verbatim; single-quoted bodies have their escapes
/// resolved to plain characters.
fn extract_queries(content: &str) -> Vec<(String, usize)> {
    let mut queries = Vec::new();
    for open in QUERY_OPEN.find_iter(content) {
        let line = line_of(content, open.start());
        let rest = &content[open.end()..];
        if let Some(body) = rest.strip_prefix("\"\"\"") {
            if let Some(end) = body.find("\"\"\"") {
                queries.push((body[..end].to_string(), line));
            }
        } else if let Some(body) = rest.strip_prefix('"') {
            let mut sql = String::new();
            let mut escaped = false;
            for c in body.chars() {
                if escaped {
                    sql.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    break;
                } else {
                    sql.push(c);
                }
            }
            queries.push((sql, line));
        }
    }
    queries
}
