//! dbtmock core
//!
//! Shared configuration, diagnostics and the run report.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use report::{Report, ReportSummary, ReportVersion, TestResult, TestStatus, RowDiff, DiffDirection};
pub use config::{Config, AssertionConfig, AssertionDirection, ExecutorConfig, FilterRules, ConfigError};
