//! Console rendering of the audit snapshot.
//!
//! Separate from the aggregator so testgate can be used as a library; the
//! aggregator decides, this module only displays.

use std::io::{self, Write};

use colored::Colorize;

use crate::model::{AuditResult, Status};

/// Success mark for consistent output formatting.
pub const SUCCESS_MARK: &str = "\u{2713}"; // ✓

/// Failure mark for consistent output formatting.
pub const FAILURE_MARK: &str = "\u{2718}"; // ✘

/// Print the snapshot to stdout.
pub fn render(results: &[AuditResult], verbose: bool) {
    render_to(results, verbose, &mut io::stdout().lock());
}

/// Print the snapshot to a custom writer. Useful for testing or
/// redirecting output.
pub fn render_to<W: Write>(results: &[AuditResult], verbose: bool, writer: &mut W) {
    for result in results {
        print_result(result, verbose, writer);
    }
    print_summary(results, writer);
}

fn print_result<W: Write>(result: &AuditResult, verbose: bool, writer: &mut W) {
    let mark = match result.status {
        Status::Pass => SUCCESS_MARK.green(),
        Status::Fail => FAILURE_MARK.red(),
    };
    let _ = writeln!(
        writer,
        "{} {}:{}  {} finding(s), tolerance {}%",
        mark,
        result.module,
        result.name,
        result.finding_count,
        result.tolerance
    );

    if !verbose {
        return;
    }
    for finding in &result.findings {
        let severity = finding.severity.as_deref().unwrap_or("note");
        let _ = writeln!(
            writer,
            "    {}: {}  {}",
            severity.bold(),
            finding.message,
            finding.kind.to_string().dimmed().cyan()
        );
        if let Some(path) = &finding.file_path {
            match finding.line {
                Some(line) => {
                    let _ = writeln!(writer, "      {} {}:{}", "-->".blue(), path, line);
                }
                None => {
                    let _ = writeln!(writer, "      {} {}", "-->".blue(), path);
                }
            }
        }
        for frame in &finding.stacktrace {
            let _ = writeln!(writer, "        {}", frame.dimmed());
        }
    }
}

fn print_summary<W: Write>(results: &[AuditResult], writer: &mut W) {
    let failed = results.iter().filter(|r| r.failed()).count();
    if failed > 0 {
        let _ = writeln!(
            writer,
            "\n{} {} of {} audits failed",
            FAILURE_MARK.red(),
            failed,
            results.len()
        );
    } else {
        let _ = writeln!(
            writer,
            "\n{} {} audits passed",
            SUCCESS_MARK.green(),
            results.len()
        );
    }
}
