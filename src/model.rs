//! Value types shared by every audit: findings, verdicts, and the result
//! record the aggregator serializes.
//!
//! The JSON projection is part of the contract: an array of `AuditResult`
//! objects with `module`, `name`, `findings`, `tolerance`, `findingCount`,
//! `status`; findings carry `type`, `filePath`, `line`, `severity`,
//! `message`, `stacktrace`, with absent optionals serialized as `null`.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================
// FindingKind
// ============================================================

/// Machine-readable category of a finding. One variant per rule across the
/// whole catalog; the serialized string is stable and never derived from
/// the Rust identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingKind {
    CompilationError,
    DetektRuleViolation,
    AndroidLintIssue,
    MissingHarnessHelper,
    LocalHelperClone,
    RawQueryUsage,
    SupportSqliteQuery,
    ComplexQuery,
    RailsOrdering,
    Fts5Usage,
    FtsMissingFts4,
    SharedTestSourceSet,
    MisplacedTestSource,
    MissingHarnessDependency,
    ForbiddenInstrumentedImport,
    #[serde(rename = "BANNED_IMPORT")]
    BannedImport,
    #[serde(rename = "BANNED_ANNOTATION")]
    BannedAnnotation,
    #[serde(rename = "COROUTINES_MISUSE")]
    CoroutinesMisuse,
    #[serde(rename = "MISSING_MAIN_DISPATCHER_RULE")]
    MissingMainDispatcherRule,
    MissingFixture,
    FixtureTooSmall,
    FixtureOversize,
    TestFailure,
    ClassBelowThreshold,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingKind::CompilationError => "CompilationError",
            FindingKind::DetektRuleViolation => "DetektRuleViolation",
            FindingKind::AndroidLintIssue => "AndroidLintIssue",
            FindingKind::MissingHarnessHelper => "MissingHarnessHelper",
            FindingKind::LocalHelperClone => "LocalHelperClone",
            FindingKind::RawQueryUsage => "RawQueryUsage",
            FindingKind::SupportSqliteQuery => "SupportSqliteQuery",
            FindingKind::ComplexQuery => "ComplexQuery",
            FindingKind::RailsOrdering => "RailsOrdering",
            FindingKind::Fts5Usage => "Fts5Usage",
            FindingKind::FtsMissingFts4 => "FtsMissingFts4",
            FindingKind::SharedTestSourceSet => "SharedTestSourceSet",
            FindingKind::MisplacedTestSource => "MisplacedTestSource",
            FindingKind::MissingHarnessDependency => "MissingHarnessDependency",
            FindingKind::ForbiddenInstrumentedImport => "ForbiddenInstrumentedImport",
            FindingKind::BannedImport => "BANNED_IMPORT",
            FindingKind::BannedAnnotation => "BANNED_ANNOTATION",
            FindingKind::CoroutinesMisuse => "COROUTINES_MISUSE",
            FindingKind::MissingMainDispatcherRule => "MISSING_MAIN_DISPATCHER_RULE",
            FindingKind::MissingFixture => "MissingFixture",
            FindingKind::FixtureTooSmall => "FixtureTooSmall",
            FindingKind::FixtureOversize => "FixtureOversize",
            FindingKind::TestFailure => "TestFailure",
            FindingKind::ClassBelowThreshold => "ClassBelowThreshold",
        };
        write!(f, "{}", s)
    }
}

// ============================================================
// Finding
// ============================================================

/// One rule violation. Immutable after construction; paths are kept in the
/// form the underlying tool supplied them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub file_path: Option<String>,
    pub line: Option<usize>,
    pub severity: Option<String>,
    pub message: String,
    pub stacktrace: Vec<String>,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            file_path: None,
            line: None,
            severity: None,
            message: message.into(),
            stacktrace: Vec::new(),
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_stacktrace(mut self, stacktrace: Vec<String>) -> Self {
        self.stacktrace = stacktrace;
        self
    }
}

// ============================================================
// Status
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

// ============================================================
// FindingCount
// ============================================================

/// The `findingCount` field. Usually the findings list length; coverage
/// reports a percentage with one decimal instead. Serialized as a bare JSON
/// number either way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FindingCount {
    Count(usize),
    Percent(f64),
}

impl Serialize for FindingCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FindingCount::Count(n) => serializer.serialize_u64(*n as u64),
            FindingCount::Percent(p) => serializer.serialize_f64(*p),
        }
    }
}

impl<'de> Deserialize<'de> for FindingCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        if let Some(n) = number.as_u64() {
            Ok(FindingCount::Count(n as usize))
        } else if let Some(p) = number.as_f64() {
            Ok(FindingCount::Percent(p))
        } else {
            Err(D::Error::custom("findingCount must be a non-negative number"))
        }
    }
}

impl fmt::Display for FindingCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCount::Count(n) => write!(f, "{}", n),
            FindingCount::Percent(p) => write!(f, "{:.1}", p),
        }
    }
}

// ============================================================
// AuditResult
// ============================================================

/// The single record an audit produces per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub module: String,
    pub name: String,
    pub findings: Vec<Finding>,
    pub tolerance: u32,
    pub finding_count: FindingCount,
    pub status: Status,
}

impl AuditResult {
    /// Result whose `findingCount` is the findings list length.
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        findings: Vec<Finding>,
        tolerance: u32,
        status: Status,
    ) -> Self {
        let count = FindingCount::Count(findings.len());
        Self {
            module: module.into(),
            name: name.into(),
            findings,
            tolerance,
            finding_count: count,
            status,
        }
    }

    /// Result carrying a derived numeric `findingCount` (coverage percent).
    pub fn with_count(
        module: impl Into<String>,
        name: impl Into<String>,
        findings: Vec<Finding>,
        tolerance: u32,
        finding_count: FindingCount,
        status: Status,
    ) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            findings,
            tolerance,
            finding_count,
            status,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == Status::Fail
    }
}

// ============================================================
// Tests
// ============================================================
