//! The audit catalog.
//!
//! Every audit is a self-contained rule engine: it owns its parser state and
//! findings, produces exactly one [`AuditResult`] per execution, and hands it
//! to the sink. A processing error (missing/unreadable/malformed input)
//! aborts the audit without producing a result.

pub mod compilation;
pub mod coverage;
pub mod detekt;
pub mod fixtures;
pub mod harness;
pub mod lint;
pub mod sql_fts;
pub mod structure;
pub mod test_results;
pub mod test_stack;

use crate::error::Result;
use crate::model::AuditResult;

/// Where audits deliver their single result. The aggregator is the only
/// production implementation.
pub trait ReportSink: Sync {
    fn enqueue(&self, result: AuditResult);
}

/// The uniform audit contract. `check` must enqueue exactly one result when
/// it returns `Ok(())` and nothing when it returns a processing error.
pub trait Audit: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, sink: &dyn ReportSink) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use super::ReportSink;
    use crate::model::AuditResult;

    /// Collects enqueued results for assertions.
    #[derive(Default)]
    pub struct CollectSink {
        results: Mutex<Vec<AuditResult>>,
    }

    impl CollectSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn results(&self) -> Vec<AuditResult> {
            self.results.lock().unwrap().clone()
        }

        /// The exactly-once callback contract, asserted.
        pub fn single(&self) -> AuditResult {
            let results = self.results();
            assert_eq!(results.len(), 1, "audit must enqueue exactly one result");
            results.into_iter().next().unwrap()
        }
    }

    impl ReportSink for CollectSink {
        fn enqueue(&self, result: AuditResult) {
            self.results.lock().unwrap().push(result);
        }
    }
}
