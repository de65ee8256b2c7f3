//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Input artifacts (1xxx)
    /// The manifest could not be read or parsed (aborts the whole run)
    ManifestReadError,

    /// A test specification could not be read or parsed
    TestReadError,

    // Resolution (2xxx)
    /// A source reachable from the tested model has no mock
    UnmockedLeaf,

    /// A model reachable from the tested model has no compiled SQL
    EmptyCompiledSql,

    /// The dependency graph loops back onto a node still being resolved
    CyclicDependency,

    /// A referenced id is neither a node nor a source in the manifest
    UnknownNode,

    /// A mock CSV file is missing, unreadable or malformed
    MockFileError,

    /// A mocked node or source has no table name its consumers could reference
    MissingRelationName,

    // Assertion (3xxx)
    /// The model output and the expected mock differ
    AssertionMismatch,

    /// The query engine rejected or failed an assertion query
    ExecutionError,

    // General (9xxx)
    /// Test skipped by configuration
    TestSkipped,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestReadError => "MANIFEST_READ_ERROR",
            Self::TestReadError => "TEST_READ_ERROR",
            Self::UnmockedLeaf => "UNMOCKED_LEAF",
            Self::EmptyCompiledSql => "EMPTY_COMPILED_SQL",
            Self::CyclicDependency => "CYCLIC_DEPENDENCY",
            Self::UnknownNode => "UNKNOWN_NODE",
            Self::MockFileError => "MOCK_FILE_ERROR",
            Self::MissingRelationName => "MISSING_RELATION_NAME",
            Self::AssertionMismatch => "ASSERTION_MISMATCH",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::TestSkipped => "TEST_SKIPPED",
        }
    }

    /// Severity a code carries unless configuration says otherwise
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::TestSkipped => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Test the diagnostic belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    /// Offending manifest node or source id, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// File the diagnostic refers to (test spec, mock CSV, manifest)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            test: None,
            node: None,
            file: None,
        }
    }

    /// Create a diagnostic using the code's default severity
    pub fn from_code(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, code.default_severity(), message)
    }

    /// Set the test name
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Set the offending node id
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Set the related file
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}
