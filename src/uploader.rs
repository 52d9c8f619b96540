//! Outbound port for publishing the final report.

use anyhow::Result;

/// Uploads the pretty-printed report JSON somewhere shareable and returns
/// its URL, or `None` when the backend produced no location. Errors are
/// captured by the aggregator and never fail the build on their own.
pub trait ReportUploader {
    fn upload_pretty_json(&self, json: &str) -> Result<Option<String>>;
}
