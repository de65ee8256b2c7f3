//! Test spec to SQL glue
//!
//! Runs the resolver for a test's target model and wraps the result in
//! assertion queries. No partial SQL is returned for a failed test.

use crate::assertion::{AssertionBuilder, AssertionQueries};
use crate::encoder::MockError;
use crate::resolver::{resolve, ResolveError};
use dbtmock_core::{AssertionDirection, DiagnosticCode, DiffDirection};
use dbtmock_dbt::{Manifest, TestSpec};

/// Assertion SQL generated for one test spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTest {
    pub name: String,
    pub model: String,
    pub queries: AssertionQueries,
}

impl GeneratedTest {
    /// File name and contents for each generated statement
    ///
    /// A single-direction test is written as `<name>.sql`; a bidirectional
    /// one as `<name>_QueryMinusExpected.sql` and `<name>_ExpectedMinusQuery.sql`.
    pub fn files(&self) -> Vec<(String, &str)> {
        if !self.queries.is_bidirectional() {
            return vec![(format!("{}.sql", self.name), self.queries.query_minus_expected.as_str())];
        }

        self.queries
            .halves()
            .into_iter()
            .map(|(direction, sql)| (file_name(&self.name, direction), sql))
            .collect()
    }
}

fn file_name(test: &str, direction: DiffDirection) -> String {
    format!("{}_{}.sql", test, direction.as_str())
}

/// Fully mock-substituted SQL of the test's target model
pub fn model_sql(manifest: &Manifest, spec: &TestSpec) -> Result<String, GenerateError> {
    let resolved = resolve(manifest, &spec.model, &spec.mocks)?;
    tracing::debug!(test = %spec.name, model = %spec.model, "resolved model SQL");
    Ok(resolved.sql)
}

/// Generate the assertion statements for one test spec
pub fn generate_test_sql(
    manifest: &Manifest,
    spec: &TestSpec,
    direction: AssertionDirection,
) -> Result<GeneratedTest, GenerateError> {
    let sql = model_sql(manifest, spec)?;
    let queries = AssertionBuilder::build_with(&sql, &spec.output, direction)
        .map_err(GenerateError::Expected)?;

    tracing::info!(test = %spec.name, halves = queries.halves().len(), "generated test SQL");

    Ok(GeneratedTest {
        name: spec.name.clone(),
        model: spec.model.clone(),
        queries,
    })
}

/// Generation errors for one test
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Expected output: {0}")]
    Expected(#[source] MockError),
}

impl GenerateError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Resolve(err) => err.code(),
            Self::Expected(err) => err.code(),
        }
    }

    /// Node or source id the failure is attributed to, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Resolve(err) => Some(err.node_id()),
            Self::Expected(_) => None,
        }
    }

    /// Offending file, if the failure came from reading a mock
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Resolve(ResolveError::Mock { source, .. }) | Self::Expected(source) => Some(source.path()),
            Self::Resolve(_) => None,
        }
    }
}
