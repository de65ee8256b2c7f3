//! Dependency graph (DAG) construction and traversal
//!
//! Builds dependency edges so tests can be checked against the manifest
//! before any SQL is generated.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use crate::manifest::{Manifest, NodeKind};

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Dependency graph over manifest nodes and sources
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Forward edges: node -> list of nodes it depends on (parents)
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Kind of every node known to the manifest
    kinds: HashMap<NodeId, NodeKind>,

    /// Models and seeds dbt produced no compiled SQL for
    uncompiled: HashSet<NodeId>,
}

impl DependencyGraph {
    /// Build a dependency graph from a manifest's `depends_on` edges
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut kinds: HashMap<NodeId, NodeKind> = HashMap::new();
        let mut uncompiled = HashSet::new();

        for (node_id, node) in &manifest.nodes {
            kinds.insert(node_id.clone(), node.kind);
            if node.kind.is_compiled() && !node.has_compiled_sql() {
                uncompiled.insert(node_id.clone());
            }

            let deps = &node.depends_on.nodes;
            if !deps.is_empty() {
                parents.insert(node_id.clone(), deps.clone());
            }
        }

        for source_id in manifest.sources.keys() {
            kinds.insert(source_id.clone(), NodeKind::Source);
        }

        Self {
            parents,
            kinds,
            uncompiled,
        }
    }

    /// Every leaf or unknown id reachable from `target` that is not covered by a mock
    ///
    /// Traversal stops at mocked ids, mirroring how resolution short-circuits.
    /// Unlike resolution this collects all offenders instead of the first one,
    /// and it terminates on cyclic graphs. Results are sorted.
    pub fn unmocked_leaves(&self, target: &str, mocked: &HashSet<String>) -> Vec<NodeId> {
        self.unmocked_reach(target, mocked)
            .into_iter()
            .filter(|id| !self.is_compiled(id))
            .collect()
    }

    /// Reachable, unmocked models and seeds that have no compiled SQL
    pub fn uncompiled_nodes(&self, target: &str, mocked: &HashSet<String>) -> Vec<NodeId> {
        self.unmocked_reach(target, mocked)
            .into_iter()
            .filter(|id| self.uncompiled.contains(id))
            .collect()
    }

    fn is_compiled(&self, node_id: &str) -> bool {
        self.kinds.get(node_id).is_some_and(NodeKind::is_compiled)
    }

    /// Sorted ids reachable from `target` without passing through a mock
    fn unmocked_reach(&self, target: &str, mocked: &HashSet<String>) -> BTreeSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([target.to_string()]);
        let mut result = BTreeSet::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) || mocked.contains(&current) {
                continue;
            }

            if self.is_compiled(&current) {
                if let Some(parents) = self.parents.get(&current) {
                    queue.extend(parents.iter().cloned());
                }
            }
            result.insert(current);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{DependsOn, ManifestNode, ManifestSource};

    fn model(id: &str, deps: &[&str]) -> (String, ManifestNode) {
        let name = id.rsplit('.').next().unwrap_or(id).to_string();
        (
            id.to_string(),
            ManifestNode {
                unique_id: id.to_string(),
                name: name.clone(),
                alias: name,
                database: "p".to_string(),
                schema: "d".to_string(),
                compiled_code: "SELECT 1".to_string(),
                depends_on: DependsOn {
                    nodes: deps.iter().map(|d| d.to_string()).collect(),
                },
                ..Default::default()
            },
        )
    }

    fn source(id: &str) -> (String, ManifestSource) {
        (
            id.to_string(),
            ManifestSource {
                unique_id: id.to_string(),
                name: id.rsplit('.').next().unwrap_or(id).to_string(),
                fqn: Vec::new(),
                relation_name: format!("`p`.`raw`.`{}`", id),
            },
        )
    }

    fn diamond() -> Manifest {
        Manifest::from_parts(
            vec![
                model("model.shop.top", &["model.shop.left", "model.shop.right"]),
                model("model.shop.left", &["source.shop.raw.a"]),
                model("model.shop.right", &["source.shop.raw.a", "source.shop.raw.b"]),
            ],
            vec![source("source.shop.raw.a"), source("source.shop.raw.b")],
        )
    }

    #[test]
    fn unmocked_leaves_lists_every_offender() {
        let dag = DependencyGraph::from_manifest(&diamond());
        let mocked = HashSet::new();

        assert_eq!(
            dag.unmocked_leaves("model.shop.top", &mocked),
            vec!["source.shop.raw.a".to_string(), "source.shop.raw.b".to_string()]
        );
    }

    #[test]
    fn mocking_an_intermediate_model_hides_its_leaves() {
        let dag = DependencyGraph::from_manifest(&diamond());
        let mocked: HashSet<String> =
            ["model.shop.right".to_string(), "source.shop.raw.a".to_string()].into();

        assert!(dag.unmocked_leaves("model.shop.top", &mocked).is_empty());
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let manifest = Manifest::from_parts(
            vec![model("model.shop.solo", &["source.shop.raw.ghost"])],
            Vec::new(),
        );
        let dag = DependencyGraph::from_manifest(&manifest);

        assert_eq!(
            dag.unmocked_leaves("model.shop.solo", &HashSet::new()),
            vec!["source.shop.raw.ghost".to_string()]
        );
    }

    #[test]
    fn cycles_terminate() {
        let manifest = Manifest::from_parts(
            vec![
                model("model.shop.a", &["model.shop.b"]),
                model("model.shop.b", &["model.shop.a", "source.shop.raw.x"]),
            ],
            vec![source("source.shop.raw.x")],
        );
        let dag = DependencyGraph::from_manifest(&manifest);

        assert_eq!(
            dag.unmocked_leaves("model.shop.a", &HashSet::new()),
            vec!["source.shop.raw.x".to_string()]
        );
    }

    #[test]
    fn uncompiled_nodes_are_found_through_the_graph() {
        let mut seed = model("seed.shop.codes", &[]);
        seed.1.compiled_code = String::new();
        let manifest = Manifest::from_parts(
            vec![
                model("model.shop.top", &["model.shop.left", "seed.shop.codes"]),
                model("model.shop.left", &["source.shop.raw.a"]),
                seed,
            ],
            vec![source("source.shop.raw.a")],
        );
        let dag = DependencyGraph::from_manifest(&manifest);

        assert_eq!(
            dag.uncompiled_nodes("model.shop.top", &HashSet::new()),
            vec!["seed.shop.codes".to_string()]
        );
        assert_eq!(
            dag.unmocked_leaves("model.shop.top", &HashSet::new()),
            vec!["source.shop.raw.a".to_string()]
        );

        let mocked: HashSet<String> = ["seed.shop.codes".to_string()].into();
        assert!(dag.uncompiled_nodes("model.shop.top", &mocked).is_empty());
    }
}
