//! Integration tests for SQL generation against the shop fixture project

use dbtmock_core::{AssertionDirection, DiagnosticCode};
use dbtmock_dbt::{load_test_folder, Manifest, TestSpec};
use dbtmock_sql::{generate_test_sql, model_sql, GenerateError, ResolveError};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn project() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop")
}

fn manifest() -> Manifest {
    Manifest::from_file(&project().join("target/manifest.json")).unwrap()
}

fn spec(name: &str) -> TestSpec {
    TestSpec::from_file(&project().join("unit_tests").join(format!("{name}.json")))
        .unwrap()
        .rebase(&project())
}

const ORDERS_TYPED: &str = "\n SELECT CAST(\"100\" AS INT64) AS amount, \"10\" AS customer_id, \"1\" AS id\
                            \n UNION ALL \n\
                            \n SELECT CAST(\"250\" AS INT64) AS amount, \"11\" AS customer_id, \"2\" AS id";

#[test]
fn passthrough_model_is_fully_substituted() {
    let sql = model_sql(&manifest(), &spec("stg_orders_passthrough")).unwrap();

    assert_eq!(sql, format!("SELECT * FROM ({ORDERS_TYPED}) AS o"));
}

#[test]
fn assertion_files_for_both_directions() {
    let generated = generate_test_sql(
        &manifest(),
        &spec("stg_orders_passthrough"),
        AssertionDirection::Both,
    )
    .unwrap();

    let files = generated.files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].0, "stg_orders_passthrough_QueryMinusExpected.sql");
    assert_eq!(files[1].0, "stg_orders_passthrough_ExpectedMinusQuery.sql");

    let expected = "\n SELECT \"100\" AS amount, \"10\" AS customer_id, \"1\" AS id\
                    \n UNION ALL \n\
                    \n SELECT \"250\" AS amount, \"11\" AS customer_id, \"2\" AS id";
    assert_eq!(
        files[0].1,
        format!(
            "SELECT amount,customer_id,id FROM( SELECT * FROM ({ORDERS_TYPED}) AS o ) \n  EXCEPT DISTINCT \n SELECT amount,customer_id,id FROM ({expected})"
        )
    );
}

#[test]
fn single_direction_writes_one_file() {
    let generated = generate_test_sql(
        &manifest(),
        &spec("stg_orders_passthrough"),
        AssertionDirection::QueryMinusExpected,
    )
    .unwrap();

    let names: Vec<String> = generated.files().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["stg_orders_passthrough.sql"]);
}

#[test]
fn mocked_model_hides_its_upstream() {
    let sql = model_sql(&manifest(), &spec("customer_orders_join")).unwrap();

    assert!(!sql.contains("`shop-prj`"));
    assert!(sql.starts_with("select c.name, o.amount\nfrom (\n SELECT \"100\" AS amount"));
    assert!(sql.contains(") AS o\njoin (\n SELECT \"10\" AS id, \"Ada \\\"the first\\\" Lovelace\" AS name"));
    assert!(sql.ends_with(") AS c on c.id = o.customer_id"));
}

#[test]
fn generation_is_deterministic() {
    let manifest = manifest();
    let spec = spec("customer_orders_join");

    let first = generate_test_sql(&manifest, &spec, AssertionDirection::Both).unwrap();
    let second = generate_test_sql(&manifest, &spec, AssertionDirection::Both).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unmocked_source_names_the_source() {
    let err = generate_test_sql(
        &manifest(),
        &spec("customer_orders_unmocked"),
        AssertionDirection::Both,
    )
    .unwrap_err();

    assert!(matches!(
        &err,
        GenerateError::Resolve(ResolveError::UnmockedLeaf { id }) if id == "source.shop.raw.customers"
    ));
    assert_eq!(err.code(), DiagnosticCode::UnmockedLeaf);
}

#[test]
fn unmocked_seed_without_sql_is_empty_compiled_sql() {
    let spec = TestSpec::from_str(
        r#"{
            "name": "by_country",
            "model": "model.shop.orders_by_country",
            "mocks": {"model.shop.stg_orders": {"filepath": "mocks/orders.csv"}},
            "output": {"filepath": "mocks/orders.csv"}
        }"#,
    )
    .unwrap()
    .rebase(&project());

    let err = model_sql(&manifest(), &spec).unwrap_err();
    assert_eq!(err.code(), DiagnosticCode::EmptyCompiledSql);
    assert_eq!(err.node_id(), Some("seed.shop.country_codes"));
}

#[test]
fn header_only_mocks_splice_as_zero_row_relations() {
    let generated = generate_test_sql(
        &manifest(),
        &spec("stg_orders_empty"),
        AssertionDirection::Both,
    )
    .unwrap();

    assert!(generated.queries.query_minus_expected.contains(
        "SELECT * FROM (SELECT CAST(null AS INT64) AS amount, CAST(null AS INT64) AS customer_id, CAST(null AS INT64) AS id LIMIT 0) AS o"
    ));
    assert!(generated
        .queries
        .query_minus_expected
        .ends_with("FROM (SELECT null AS amount, null AS customer_id, null AS id LIMIT 0)"));
}

#[test]
fn every_fixture_spec_loads() {
    let specs = load_test_folder(&project().join("unit_tests")).unwrap();
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "customer_orders_join",
            "customer_orders_unmocked",
            "stg_orders_empty",
            "stg_orders_extra_row",
            "stg_orders_missing_row",
            "stg_orders_passthrough",
        ]
    );
}
