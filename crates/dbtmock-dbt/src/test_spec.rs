//! Unit test specifications
//!
//! A test names a target model, mock CSV data for some of the nodes it reads
//! from, and the CSV the model is expected to produce:
//!
//! ```json
//! {
//!   "name": "orders_daily",
//!   "model": "model.shop.orders_daily",
//!   "mocks": {
//!     "source.shop.raw.orders": {"filepath": "mocks/orders.csv", "types": {"amount": "INT64"}}
//!   },
//!   "output": {"filepath": "mocks/orders_daily_expected.csv"}
//! }
//! ```

use dbtmock_core::DiagnosticCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Substitute data for one node: a CSV file plus optional column types
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mock {
    /// Path to the CSV file
    pub filepath: PathBuf,

    /// Column name -> SQL type, used to wrap values in `CAST`
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

impl Mock {
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            types: BTreeMap::new(),
        }
    }

    /// Declare a SQL type for a column
    pub fn with_type(mut self, column: impl Into<String>, sql_type: impl Into<String>) -> Self {
        self.types.insert(column.into(), sql_type.into());
        self
    }

    fn rebase(&mut self, base: &Path) {
        if self.filepath.is_relative() {
            self.filepath = base.join(&self.filepath);
        }
    }
}

/// One unit test for a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,

    /// unique_id of the model under test
    pub model: String,

    /// Node or source id -> mock data
    #[serde(default)]
    pub mocks: HashMap<String, Mock>,

    /// Expected model output
    pub output: Mock,
}

impl TestSpec {
    /// Load a test spec from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, TestSpecError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TestSpecError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
            .map_err(|e| e.in_file(path))
    }

    /// Parse a test spec from a JSON string
    pub fn from_str(json: &str) -> Result<Self, TestSpecError> {
        let spec: TestSpec = serde_json::from_str(json)
            .map_err(|e| TestSpecError::ParseError(String::new(), e.to_string()))?;

        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), TestSpecError> {
        if self.name.trim().is_empty() {
            return Err(TestSpecError::InvalidSpec("test name is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(TestSpecError::InvalidSpec(format!(
                "test '{}' does not name a model",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolve relative mock paths against a base directory
    pub fn rebase(mut self, base: &Path) -> Self {
        for mock in self.mocks.values_mut() {
            mock.rebase(base);
        }
        self.output.rebase(base);
        self
    }
}

/// Paths of every `*.json` file directly inside a folder, sorted by file name
///
/// Sub-directories are not descended into.
pub fn test_spec_paths(dir: &Path) -> Result<Vec<PathBuf>, TestSpecError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry
            .map_err(|e| TestSpecError::IoError(dir.display().to_string(), e.to_string()))?;
        let path = entry.path();

        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path.to_path_buf());
        }
    }

    tracing::debug!(dir = %dir.display(), count = paths.len(), "discovered test specs");
    Ok(paths)
}

/// Load every `*.json` test spec in a folder, sorted by file name
pub fn load_test_folder(dir: &Path) -> Result<Vec<TestSpec>, TestSpecError> {
    test_spec_paths(dir)?
        .iter()
        .map(|path| TestSpec::from_file(path))
        .collect()
}

/// Test spec loading errors
#[derive(Debug, thiserror::Error)]
pub enum TestSpecError {
    #[error("Failed to read test spec {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse test spec {0}: {1}")]
    ParseError(String, String),

    #[error("Invalid test spec: {0}")]
    InvalidSpec(String),
}

impl TestSpecError {
    pub fn code(&self) -> DiagnosticCode {
        DiagnosticCode::TestReadError
    }

    fn in_file(self, path: &Path) -> Self {
        match self {
            Self::ParseError(_, message) => Self::ParseError(path.display().to_string(), message),
            Self::InvalidSpec(message) => {
                Self::InvalidSpec(format!("{} ({})", message, path.display()))
            }
            other => other,
        }
    }
}
