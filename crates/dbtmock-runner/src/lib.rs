//! Query executors and the test runner
//!
//! Generated assertion SQL is plain text; this crate hands it to something that
//! can run it and interprets the returned rows.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `bigquery` - Google BigQuery support
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbtmock_runner::{BigQueryExecutor, TestRunner};
//!
//! let executor = BigQueryExecutor::with_adc("my-project").await?;
//! let report = TestRunner::new(executor).run_all(&manifest, &specs).await;
//! ```

pub mod executor;
pub mod memory;
pub mod bigquery;
pub mod runner;

pub use executor::{QueryExecutor, QueryResult, ExecError, render_value};
pub use memory::MemoryExecutor;
pub use bigquery::BigQueryExecutor;
pub use runner::{TestRunner, generation_diagnostic};
