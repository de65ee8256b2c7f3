//! dbt artifact parsing and test specifications
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts)
//! - Tagging every node with its kind (model, seed, source)
//! - Dependency graph helpers (upstream closure, unmocked leaves)
//! - Loading unit test specifications and their mock definitions

pub mod manifest;
pub mod dag;
pub mod test_spec;

pub use manifest::{Manifest, ManifestNode, ManifestSource, ManifestMetadata, ManifestError, DependsOn, NodeKind, Relation};
pub use dag::{DependencyGraph, NodeId};
pub use test_spec::{Mock, TestSpec, TestSpecError, load_test_folder, test_spec_paths};
