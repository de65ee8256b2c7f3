//! BigQuery query executor
//!
//! Runs generated test SQL as BigQuery jobs. The generated SQL relies on
//! BigQuery's dialect: backtick-quoted `project`.`dataset`.`table` names and
//! `EXCEPT DISTINCT`.
//!
//! ## Authentication
//!
//! 1. Service account JSON file (explicit path)
//! 2. Application Default Credentials (ADC)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let executor = BigQueryExecutor::with_adc("my-project").await?;
//! let diff = executor.execute(&assertion_sql).await?;
//! ```

use crate::executor::{ExecError, QueryExecutor, QueryResult};

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{
    model::{query_request::QueryRequest, query_response::ResultSet},
    Client as BigQueryClient,
};

#[cfg(not(feature = "bigquery"))]
const NOT_COMPILED: &str = "BigQuery support not compiled. Rebuild with: cargo build --features bigquery";

/// BigQuery query executor
pub struct BigQueryExecutor {
    /// Project the query jobs are billed to
    project_id: String,

    #[cfg(feature = "bigquery")]
    client: BigQueryClient,
}

impl BigQueryExecutor {
    /// Create an executor using Application Default Credentials (ADC)
    ///
    /// ADC automatically detects credentials from:
    /// - GOOGLE_APPLICATION_CREDENTIALS environment variable
    /// - gcloud CLI default credentials
    /// - GCE/GKE metadata service
    #[cfg(feature = "bigquery")]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, ExecError> {
        let project_id = project_id.into();

        let client = BigQueryClient::from_application_default_credentials()
            .await
            .map_err(|e| ExecError::AuthenticationError(format!(
                "Failed to authenticate with ADC: {}. \
                 Ensure GOOGLE_APPLICATION_CREDENTIALS is set or run 'gcloud auth application-default login'",
                e
            )))?;

        Ok(Self { project_id, client })
    }

    #[cfg(not(feature = "bigquery"))]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, ExecError> {
        let _ = project_id;
        Err(ExecError::ConfigError(NOT_COMPILED.to_string()))
    }

    /// Create an executor using a service account key file
    #[cfg(feature = "bigquery")]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, ExecError> {
        let project_id = project_id.into();
        let key_path = key_path.as_ref().to_string_lossy().to_string();

        let client = BigQueryClient::from_service_account_key_file(&key_path)
            .await
            .map_err(|e| ExecError::AuthenticationError(format!(
                "Failed to read service account key file '{}': {}",
                key_path, e
            )))?;

        Ok(Self { project_id, client })
    }

    #[cfg(not(feature = "bigquery"))]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        _key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, ExecError> {
        let _ = project_id;
        Err(ExecError::ConfigError(NOT_COMPILED.to_string()))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Map a client error onto the executor's error kinds
    pub fn classify_error(message: &str) -> ExecError {
        if message.contains("Access Denied") || message.contains("Permission") {
            ExecError::AuthenticationError(message.to_string())
        } else if message.contains("connection") || message.contains("timed out") {
            ExecError::NetworkError(message.to_string())
        } else {
            ExecError::QueryError(message.to_string())
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for BigQueryExecutor {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    #[cfg(feature = "bigquery")]
    async fn execute(&self, sql: &str) -> Result<QueryResult, ExecError> {
        let request = QueryRequest::new(sql.to_string());

        let response = self
            .client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(|e| Self::classify_error(&e.to_string()))?;

        let mut rs = ResultSet::new_from_query_response(response);
        let columns = rs.column_names();
        let mut rows = Vec::new();

        while rs.next_row() {
            let mut row = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                let value = rs
                    .get_json_value(index)
                    .map_err(|e| ExecError::InvalidResponse(format!(
                        "Failed to read column {}: {}",
                        columns[index], e
                    )))?
                    .unwrap_or(serde_json::Value::Null);
                row.push(value);
            }
            rows.push(row);
        }

        tracing::debug!(project = %self.project_id, rows = rows.len(), "BigQuery job finished");
        Ok(QueryResult::new(columns, rows))
    }

    #[cfg(not(feature = "bigquery"))]
    async fn execute(&self, _sql: &str) -> Result<QueryResult, ExecError> {
        Err(ExecError::ConfigError(NOT_COMPILED.to_string()))
    }

    #[cfg(feature = "bigquery")]
    async fn test_connection(&self) -> Result<(), ExecError> {
        self.execute("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| ExecError::QueryError(format!("Connection test failed: {}", e)))
    }

    #[cfg(not(feature = "bigquery"))]
    async fn test_connection(&self) -> Result<(), ExecError> {
        Err(ExecError::ConfigError(NOT_COMPILED.to_string()))
    }
}
