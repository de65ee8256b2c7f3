//! SQL generation for dbt unit tests
//!
//! This crate handles:
//! - Encoding CSV mocks as literal `SELECT ... UNION ALL` SQL
//! - Rewriting table references into mock subqueries
//! - Resolving a model's dependencies recursively against its mocks
//! - Building the set-difference assertions that compare actual and expected output

pub mod encoder;
pub mod rewriter;
pub mod resolver;
pub mod assertion;
pub mod generate;

pub use encoder::{MockEncoder, MockError, SqlMock, render_entry};
pub use rewriter::{Replacement, TableRewriter, TextualRewriter, RewriteError};
pub use resolver::{DependencyResolver, ResolveError, resolve};
pub use assertion::{AssertionBuilder, AssertionQueries};
pub use generate::{GeneratedTest, GenerateError, generate_test_sql, model_sql};
