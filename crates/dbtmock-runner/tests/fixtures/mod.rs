//! Shared access to the shop fixture project
//!
//! The project lives at `fixtures/shop` in the workspace root and contains a
//! compiled manifest, unit test specs and their mock CSVs.

use dbtmock_dbt::{Manifest, TestSpec};
use std::path::{Path, PathBuf};

pub fn project() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop")
}

pub fn manifest() -> Manifest {
    Manifest::from_file(&project().join("target/manifest.json")).unwrap()
}

/// Load a fixture spec with mock paths resolved against the project
pub fn spec(name: &str) -> TestSpec {
    TestSpec::from_file(&project().join("unit_tests").join(format!("{name}.json")))
        .unwrap()
        .rebase(&project())
}

pub fn all_specs() -> Vec<TestSpec> {
    dbtmock_dbt::load_test_folder(&project().join("unit_tests"))
        .unwrap()
        .into_iter()
        .map(|spec| spec.rebase(&project()))
        .collect()
}
