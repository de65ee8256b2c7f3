//! Recursive mock substitution over the dependency graph
//!
//! Resolving a node yields SQL in which every table it reads, directly or
//! transitively, has been replaced by mock data:
//! - a mocked id is encoded and returned as is, whatever lies below it
//! - a model or seed resolves its dependencies, then rewrites its compiled SQL
//! - an unmocked source is an error
//!
//! Dependencies are substituted in lexicographic id order so the output is
//! byte-stable across runs.

use crate::encoder::{MockEncoder, MockError};
use crate::rewriter::{Replacement, RewriteError, TableRewriter, TextualRewriter};
use dbtmock_core::DiagnosticCode;
use dbtmock_dbt::{Manifest, Mock, NodeKind};
use std::collections::{HashMap, HashSet};

/// Resolve `node_id` against `mocks` with the default textual rewriter
pub fn resolve(
    manifest: &Manifest,
    node_id: &str,
    mocks: &HashMap<String, Mock>,
) -> Result<Replacement, ResolveError> {
    DependencyResolver::new(manifest, mocks).resolve(node_id)
}

/// Resolves nodes of one manifest against one set of mocks
pub struct DependencyResolver<'a, R = TextualRewriter> {
    manifest: &'a Manifest,
    mocks: &'a HashMap<String, Mock>,
    rewriter: R,
}

impl<'a> DependencyResolver<'a, TextualRewriter> {
    pub fn new(manifest: &'a Manifest, mocks: &'a HashMap<String, Mock>) -> Self {
        Self::with_rewriter(manifest, mocks, TextualRewriter)
    }
}

impl<'a, R: TableRewriter> DependencyResolver<'a, R> {
    pub fn with_rewriter(manifest: &'a Manifest, mocks: &'a HashMap<String, Mock>, rewriter: R) -> Self {
        Self {
            manifest,
            mocks,
            rewriter,
        }
    }

    /// Produce the fully mock-substituted replacement for a node
    ///
    /// State lives only for this call: nodes reached through several paths
    /// are resolved once, and nothing carries over to the next call.
    pub fn resolve(&self, node_id: &str) -> Result<Replacement, ResolveError> {
        let mut walk = Walk::default();
        self.resolve_node(node_id, &mut walk)
    }

    fn resolve_node(&self, node_id: &str, walk: &mut Walk) -> Result<Replacement, ResolveError> {
        if let Some(done) = walk.resolved.get(node_id) {
            return Ok(done.clone());
        }
        if walk.on_stack.contains(node_id) {
            return Err(ResolveError::CyclicDependency {
                path: walk.cycle_to(node_id),
            });
        }

        let kind = self.manifest.kind_of(node_id).ok_or_else(|| ResolveError::UnknownNode {
            id: node_id.to_string(),
        })?;
        let relation = self.manifest.relation(node_id).ok_or_else(|| ResolveError::UnknownNode {
            id: node_id.to_string(),
        })?;

        if let Some(mock) = self.mocks.get(node_id) {
            if relation.full_name.trim().is_empty() {
                return Err(ResolveError::MissingRelationName {
                    id: node_id.to_string(),
                });
            }
            let encoded = MockEncoder::encode(mock).map_err(|source| ResolveError::Mock {
                id: node_id.to_string(),
                source,
            })?;
            tracing::debug!(node = node_id, rows = encoded.row_count, "substituting mock");

            let replacement = Replacement::new(relation.full_name, encoded.as_relation(), relation.short_name);
            walk.resolved.insert(node_id.to_string(), replacement.clone());
            return Ok(replacement);
        }

        let node = match (kind, self.manifest.get_node(node_id)) {
            (NodeKind::Model | NodeKind::Seed, Some(node)) => node,
            _ => {
                return Err(ResolveError::UnmockedLeaf {
                    id: node_id.to_string(),
                })
            }
        };

        // Blank SQL is reported ahead of any dependency error
        if !node.has_compiled_sql() {
            return Err(ResolveError::EmptyCompiledSql {
                id: node_id.to_string(),
            });
        }

        let mut dependencies: Vec<&String> = node.depends_on.nodes.iter().collect();
        dependencies.sort();
        dependencies.dedup();

        walk.push(node_id);
        let mut sql = node.compiled_code.clone();
        for dependency in dependencies {
            let replacement = self.resolve_node(dependency, walk)?;
            sql = self
                .rewriter
                .rewrite(&sql, &replacement)
                .map_err(|source| ResolveError::Rewrite {
                    id: node_id.to_string(),
                    source,
                })?;
            tracing::debug!(node = node_id, dependency = dependency.as_str(), "rewrote reference");
        }
        walk.pop(node_id);

        let replacement = Replacement::new(relation.full_name, sql, relation.short_name);
        walk.resolved.insert(node_id.to_string(), replacement.clone());
        Ok(replacement)
    }
}

/// Per-call traversal state
#[derive(Default)]
struct Walk {
    /// Nodes whose resolution has started but not finished, in order
    stack: Vec<String>,
    on_stack: HashSet<String>,
    resolved: HashMap<String, Replacement>,
}

impl Walk {
    fn push(&mut self, node_id: &str) {
        self.stack.push(node_id.to_string());
        self.on_stack.insert(node_id.to_string());
    }

    fn pop(&mut self, node_id: &str) {
        self.stack.pop();
        self.on_stack.remove(node_id);
    }

    fn cycle_to(&self, node_id: &str) -> Vec<String> {
        let start = self.stack.iter().position(|id| id == node_id).unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..].to_vec();
        path.push(node_id.to_string());
        path
    }
}

/// Resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{id} is not mocked; sources must be mocked to be tested")]
    UnmockedLeaf { id: String },

    #[error("Node {id} has empty compiled SQL. Make sure the manifest is compiled by running `dbt compile`")]
    EmptyCompiledSql { id: String },

    #[error("Cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("{id} is neither a node nor a source in the manifest")]
    UnknownNode { id: String },

    #[error("{id} is mocked but has no relation name to substitute")]
    MissingRelationName { id: String },

    #[error("Mock for {id}: {source}")]
    Mock {
        id: String,
        #[source]
        source: MockError,
    },

    #[error("Rewriting references in {id}: {source}")]
    Rewrite {
        id: String,
        #[source]
        source: RewriteError,
    },
}

impl ResolveError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::UnmockedLeaf { .. } => DiagnosticCode::UnmockedLeaf,
            Self::EmptyCompiledSql { .. } => DiagnosticCode::EmptyCompiledSql,
            Self::CyclicDependency { .. } => DiagnosticCode::CyclicDependency,
            Self::UnknownNode { .. } => DiagnosticCode::UnknownNode,
            Self::Mock { source, .. } => source.code(),
            Self::MissingRelationName { .. } | Self::Rewrite { .. } => {
                DiagnosticCode::MissingRelationName
            }
        }
    }

    /// The node or source the failure is attributed to
    pub fn node_id(&self) -> &str {
        match self {
            Self::UnmockedLeaf { id }
            | Self::EmptyCompiledSql { id }
            | Self::UnknownNode { id }
            | Self::MissingRelationName { id }
            | Self::Mock { id, .. }
            | Self::Rewrite { id, .. } => id,
            Self::CyclicDependency { path } => path.first().map(String::as_str).unwrap_or_default(),
        }
    }
}
