//! Test execution
//!
//! Generates the assertion SQL for each test spec, runs every half through a
//! [`QueryExecutor`] and turns returned rows into a pass/fail result. A failing
//! test never stops the rest of the run.

use crate::executor::{ExecError, QueryExecutor};
use dbtmock_core::{
    AssertionDirection, Diagnostic, DiagnosticCode, DiffDirection, FilterRules, Report, RowDiff,
    TestResult,
};
use dbtmock_dbt::{Manifest, TestSpec};
use dbtmock_sql::{generate_test_sql, GenerateError};

/// Runs test specs against one executor
pub struct TestRunner<E> {
    executor: E,
    direction: AssertionDirection,
    filter: FilterRules,
}

impl<E: QueryExecutor> TestRunner<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            direction: AssertionDirection::Both,
            filter: FilterRules::default(),
        }
    }

    pub fn with_direction(mut self, direction: AssertionDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_filter(mut self, filter: FilterRules) -> Self {
        self.filter = filter;
        self
    }

    /// Run every spec in order and collect the results into a report
    pub async fn run_all(&self, manifest: &Manifest, specs: &[TestSpec]) -> Report {
        let mut report = Report::new();
        for spec in specs {
            report.add_result(self.run_test(manifest, spec).await);
        }

        tracing::info!(
            executor = self.executor.name(),
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed,
            errored = report.summary.errored,
            "test run finished"
        );
        report
    }

    /// Run a single test spec
    pub async fn run_test(&self, manifest: &Manifest, spec: &TestSpec) -> TestResult {
        if self.filter.is_test_skipped(&spec.name) {
            tracing::warn!(test = %spec.name, "skipped by filter");
            return TestResult::skipped(&spec.name, &spec.model).with_diagnostic(
                Diagnostic::from_code(DiagnosticCode::TestSkipped, "Skipped by filter rules")
                    .with_test(&spec.name),
            );
        }

        let generated = match generate_test_sql(manifest, spec, self.direction) {
            Ok(generated) => generated,
            Err(err) => {
                tracing::debug!(test = %spec.name, error = %err, "generation failed");
                return TestResult::errored(&spec.name, &spec.model, generation_diagnostic(&spec.name, &err));
            }
        };

        let mut diffs = Vec::new();
        for (direction, sql) in generated.queries.halves() {
            let result = match self.executor.execute(sql).await {
                Ok(result) => result,
                Err(err) => {
                    return TestResult::errored(
                        &spec.name,
                        &spec.model,
                        execution_diagnostic(&spec.name, direction.as_str(), &err),
                    );
                }
            };

            tracing::debug!(test = %spec.name, %direction, rows = result.row_count(), "assertion half executed");
            diffs.extend(
                result
                    .records()
                    .into_iter()
                    .map(|fields| RowDiff { direction, fields }),
            );
        }

        if diffs.is_empty() {
            return TestResult::passed(&spec.name, &spec.model);
        }

        let mismatch = mismatch_diagnostic(&spec.name, &spec.model, &diffs);
        TestResult::failed(&spec.name, &spec.model, diffs).with_diagnostic(mismatch)
    }
}

/// Diagnostic for a test whose SQL could not be generated
pub fn generation_diagnostic(test: &str, err: &GenerateError) -> Diagnostic {
    let mut diagnostic = Diagnostic::from_code(err.code(), err.to_string()).with_test(test);
    if let Some(node) = err.node_id() {
        diagnostic = diagnostic.with_node(node);
    }
    if let Some(file) = err.file() {
        diagnostic = diagnostic.with_file(file);
    }
    diagnostic
}

fn mismatch_diagnostic(test: &str, model: &str, diffs: &[RowDiff]) -> Diagnostic {
    let extra = diffs
        .iter()
        .filter(|d| d.direction == DiffDirection::QueryMinusExpected)
        .count();
    Diagnostic::from_code(
        DiagnosticCode::AssertionMismatch,
        format!(
            "{} unexpected and {} missing rows",
            extra,
            diffs.len() - extra
        ),
    )
    .with_test(test)
    .with_node(model)
}

fn execution_diagnostic(test: &str, half: &str, err: &ExecError) -> Diagnostic {
    Diagnostic::from_code(
        DiagnosticCode::ExecutionError,
        format!("{} query failed: {}", half, err),
    )
    .with_test(test)
}
