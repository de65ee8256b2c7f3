//! Query executor trait for running generated SQL

use serde_json::Value;

/// Rows returned by an executor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in result-schema order
    pub columns: Vec<String>,

    /// One entry per row, aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build from string columns and rows of displayable values
    pub fn from_strings<C, R, V>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<V>>,
        V: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| Value::String(v.into())).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Every row as `(column, rendered value)` pairs
    pub fn records(&self) -> Vec<Vec<(String, String)>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(column, value)| (column.clone(), render_value(value)))
                    .collect()
            })
            .collect()
    }
}

/// Render a cell the way a result table would show it
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Errors that can occur when executing a query
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

/// Something that can run arbitrary SQL text and return rows
///
/// Implementations must accept backtick-quoted qualified identifiers,
/// `CAST(x AS type)`, `UNION ALL` and `EXCEPT DISTINCT`.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Get the executor name (e.g., "BigQuery", "Memory")
    fn name(&self) -> &'static str;

    /// Run a query and collect every row
    async fn execute(&self, sql: &str) -> Result<QueryResult, ExecError>;

    /// Check the executor is reachable before running tests
    async fn test_connection(&self) -> Result<(), ExecError>;
}

#[async_trait::async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, ExecError> {
        (**self).execute(sql).await
    }

    async fn test_connection(&self) -> Result<(), ExecError> {
        (**self).test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_pair_columns_with_rendered_values() {
        let result = QueryResult::new(
            vec!["name".to_string(), "total".to_string(), "note".to_string()],
            vec![vec![json!("foo"), json!(12), Value::Null]],
        );

        assert_eq!(
            result.records(),
            vec![vec![
                ("name".to_string(), "foo".to_string()),
                ("total".to_string(), "12".to_string()),
                ("note".to_string(), "NULL".to_string()),
            ]]
        );
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn from_strings_builds_text_cells() {
        let result = QueryResult::from_strings(["a"], vec![vec!["1"], vec!["2"]]);
        assert_eq!(result.rows[1], vec![json!("2")]);
        assert!(!result.is_empty());
    }
}
