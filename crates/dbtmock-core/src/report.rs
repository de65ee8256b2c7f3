//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Which side of the equivalence check produced a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffDirection {
    /// Row produced by the model but absent from the expectation
    QueryMinusExpected,

    /// Row expected but never produced by the model
    ExpectedMinusQuery,
}

impl DiffDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryMinusExpected => "QueryMinusExpected",
            Self::ExpectedMinusQuery => "ExpectedMinusQuery",
        }
    }
}

impl std::fmt::Display for DiffDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mismatching row, reported verbatim per field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDiff {
    pub direction: DiffDirection,

    /// (column, rendered value) in result-schema order
    pub fields: Vec<(String, String)>,
}

/// Final state of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Both assertion halves returned no rows
    Passed,

    /// At least one assertion half returned rows
    Failed,

    /// SQL could not be generated or executed
    Errored,

    /// Excluded by configuration
    Skipped,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Errored => write!(f, "errored"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one test specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,

    /// Target model id
    pub model: String,

    pub status: TestStatus,

    /// Mismatching rows (empty unless `Failed`)
    #[serde(default)]
    pub diffs: Vec<RowDiff>,

    /// Diagnostics raised while generating or running the test
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            status: TestStatus::Passed,
            diffs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(name: impl Into<String>, model: impl Into<String>, diffs: Vec<RowDiff>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            status: TestStatus::Failed,
            diffs,
            diagnostics: Vec::new(),
        }
    }

    pub fn errored(name: impl Into<String>, model: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            status: TestStatus::Errored,
            diffs: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }

    pub fn skipped(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            status: TestStatus::Skipped,
            diffs: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Attach a diagnostic without changing the status
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    /// Rows the model produced that were not expected
    pub fn extra_rows(&self) -> impl Iterator<Item = &RowDiff> {
        self.diffs.iter().filter(|d| d.direction == DiffDirection::QueryMinusExpected)
    }

    /// Expected rows the model did not produce
    pub fn missing_rows(&self) -> impl Iterator<Item = &RowDiff> {
        self.diffs.iter().filter(|d| d.direction == DiffDirection::ExpectedMinusQuery)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

/// Test run report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Per-test results, in execution order
    pub results: Vec<TestResult>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            results: Vec::new(),
            metadata: None,
        }
    }

    /// Create a report from test results
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let mut report = Self::new();
        for result in results {
            report.add_result(result);
        }
        report
    }

    /// Add a test result to the report
    pub fn add_result(&mut self, result: TestResult) {
        match result.status {
            TestStatus::Passed => self.summary.passed += 1,
            TestStatus::Failed => self.summary.failed += 1,
            TestStatus::Errored => self.summary.errored += 1,
            TestStatus::Skipped => self.summary.skipped += 1,
        }

        self.summary.total += 1;
        self.results.push(result);
    }

    /// All diagnostics across every test
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.results.iter().flat_map(|r| r.diagnostics.iter())
    }

    /// Check if any test failed or errored
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
            || self.summary.errored > 0
            || self.diagnostics().any(|d| d.severity == Severity::Error)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
