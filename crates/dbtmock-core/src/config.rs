//! Configuration schema (dbtmock.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which equivalence checks to generate for each test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionDirection {
    /// Only rows produced by the model but absent from the expectation
    QueryMinusExpected,

    /// Both `QueryMinusExpected` and `ExpectedMinusQuery`
    Both,
}

impl Default for AssertionDirection {
    fn default() -> Self {
        Self::Both
    }
}

/// Assertion generation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssertionConfig {
    #[serde(default)]
    pub direction: AssertionDirection,
}

/// Query engine used by `dbtmock test`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Executor type (memory, bigquery)
    #[serde(rename = "type")]
    pub executor_type: String,

    /// Connection settings (executor-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

/// Test selection rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Skip tests whose name matches any of these patterns
    #[serde(default)]
    pub skip: Vec<String>,
}

impl FilterRules {
    /// Check if a test should be skipped
    pub fn is_test_skipped(&self, test_name: &str) -> bool {
        self.skip.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, test_name)
            } else {
                pattern == test_name
            }
        })
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the compiled dbt manifest
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Folder holding JSON test specifications
    #[serde(default = "default_tests")]
    pub tests: PathBuf,

    /// Folder generated SQL is written to
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub assertion: AssertionConfig,

    #[serde(default)]
    pub filter: FilterRules,

    #[serde(default)]
    pub executor: Option<ExecutorConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("target/manifest.json")
}

fn default_tests() -> PathBuf {
    PathBuf::from("unit_tests")
}

fn default_output() -> PathBuf {
    PathBuf::from("tests")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            tests: default_tests(),
            output: default_output(),
            assertion: AssertionConfig::default(),
            filter: FilterRules::default(),
            executor: None,
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Resolve a configured path against the project root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.project_root.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// Simple glob matching (supports a single `*` wildcard)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len()
            && text.starts_with(prefix)
            && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.manifest, PathBuf::from("target/manifest.json"));
        assert_eq!(config.tests, PathBuf::from("unit_tests"));
        assert_eq!(config.assertion.direction, AssertionDirection::Both);
        assert!(config.executor.is_none());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            manifest = "build/manifest.json"
            output = "generated"

            [assertion]
            direction = "query_minus_expected"

            [filter]
            skip = ["legacy_*"]

            [executor]
            type = "bigquery"
            project_id = "analytics-stage"
            "#,
        )
        .unwrap();

        assert_eq!(config.manifest, PathBuf::from("build/manifest.json"));
        assert_eq!(config.tests, PathBuf::from("unit_tests"));
        assert_eq!(config.output, PathBuf::from("generated"));
        assert_eq!(config.assertion.direction, AssertionDirection::QueryMinusExpected);

        let executor = config.executor.unwrap();
        assert_eq!(executor.executor_type, "bigquery");
        assert_eq!(executor.settings.get("project_id").map(String::as_str), Some("analytics-stage"));
    }

    #[test]
    fn skip_pattern_matching() {
        let rules = FilterRules {
            skip: vec!["legacy_*".to_string(), "orders_weekly".to_string()],
        };

        assert!(rules.is_test_skipped("legacy_customers"));
        assert!(rules.is_test_skipped("orders_weekly"));
        assert!(!rules.is_test_skipped("orders_daily"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.assertion, parsed.assertion);
        assert_eq!(config.output, parsed.output);
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("staging_*", "staging_users"));
        assert!(glob_match("*_test", "orders_test"));
        assert!(!glob_match("staging_*", "prod_users"));
        assert!(!glob_match("ab*ba", "aba"));
    }

    #[test]
    fn resolves_relative_paths_against_root() {
        let mut config = Config::default();
        config.project_root = PathBuf::from("/project");
        assert_eq!(
            config.resolve_path(Path::new("unit_tests")),
            PathBuf::from("/project/unit_tests")
        );
        assert_eq!(
            config.resolve_path(Path::new("/abs/manifest.json")),
            PathBuf::from("/abs/manifest.json")
        );
    }
}
