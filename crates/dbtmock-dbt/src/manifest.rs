//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json to extract compiled nodes, sources, and
//! their dependencies. The manifest is read once and never mutated afterwards.

use dbtmock_core::DiagnosticCode;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Models, seeds, tests, snapshots...
    #[serde(default)]
    pub nodes: HashMap<String, ManifestNode>,

    /// Source definitions
    #[serde(default)]
    pub sources: HashMap<String, ManifestSource>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))?;

        Ok(manifest.with_kinds())
    }

    /// Build a manifest from in-memory nodes and sources
    pub fn from_parts(
        nodes: impl IntoIterator<Item = (String, ManifestNode)>,
        sources: impl IntoIterator<Item = (String, ManifestSource)>,
    ) -> Self {
        Self {
            metadata: None,
            nodes: nodes.into_iter().collect(),
            sources: sources.into_iter().collect(),
        }
        .with_kinds()
    }

    /// Tag every entry with its kind, derived once from the id
    fn with_kinds(mut self) -> Self {
        for (id, node) in self.nodes.iter_mut() {
            node.kind = NodeKind::from_node_id(id);
        }
        self
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Kind of any id known to the manifest
    pub fn kind_of(&self, unique_id: &str) -> Option<NodeKind> {
        if let Some(node) = self.nodes.get(unique_id) {
            Some(node.kind)
        } else if self.sources.contains_key(unique_id) {
            Some(NodeKind::Source)
        } else {
            None
        }
    }

    /// Fully qualified reference and short alias consumers use for an id
    pub fn relation(&self, unique_id: &str) -> Option<Relation> {
        if let Some(node) = self.nodes.get(unique_id) {
            Some(Relation {
                full_name: node.full_name(),
                short_name: node.alias.clone(),
            })
        } else {
            self.sources.get(unique_id).map(|source| Relation {
                full_name: source.relation_name.clone(),
                short_name: source.name.clone(),
            })
        }
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: String,
    #[serde(default)]
    pub dbt_version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

/// What a manifest entry is, decided once at load time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Compiled SQL model
    Model,

    /// Seed; carries compiled SQL only when dbt produced some
    Seed,

    /// Leaf table that must be mocked (sources and any other node type)
    #[default]
    Source,
}

impl NodeKind {
    /// Derive the kind from a unique_id's leading segment
    pub fn from_node_id(unique_id: &str) -> Self {
        match unique_id.split('.').next() {
            Some("model") => Self::Model,
            Some("seed") => Self::Seed,
            _ => Self::Source,
        }
    }

    /// Whether the node has compiled SQL that can be resolved recursively
    pub fn is_compiled(&self) -> bool {
        matches!(self, Self::Model | Self::Seed)
    }
}

/// A node in the manifest (model, seed, test, snapshot, etc.)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_id: String,

    /// Node name (e.g., "users")
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resource_type: String,

    /// Database name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub database: String,

    /// Schema name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub schema: String,

    /// Alias (name other nodes use when re-referencing this one)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alias: String,

    /// Compiled SQL, present once `dbt compile` has run
    #[serde(default, deserialize_with = "null_as_empty")]
    pub compiled_code: String,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Fully qualified name
    #[serde(default)]
    pub fqn: Vec<String>,

    /// Derived from the manifest key when loaded
    #[serde(skip)]
    pub kind: NodeKind,
}

impl ManifestNode {
    /// Backtick-quoted three-part reference: `db`.`schema`.`name`
    pub fn full_name(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.database, self.schema, self.name)
    }

    /// Whether dbt produced compiled SQL for this node
    pub fn has_compiled_sql(&self) -> bool {
        !self.compiled_code.trim().is_empty()
    }
}

/// dbt writes `null` for fields that do not apply to a node type
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// A source in the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    /// Unique identifier (e.g., "source.my_project.raw.users")
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_id: String,

    /// Table name (e.g., "users"), used as the synthesized alias
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Fully qualified name
    #[serde(default)]
    pub fqn: Vec<String>,

    /// Reference exactly as it appears in compiled SQL, e.g. `p`.`raw`.`users`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub relation_name: String,
}

/// How consumers refer to a node in their SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub full_name: String,
    pub short_name: String,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}

impl ManifestError {
    pub fn code(&self) -> DiagnosticCode {
        DiagnosticCode::ManifestReadError
    }
}
