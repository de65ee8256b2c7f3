//! Equivalence assertions between model output and expected data
//!
//! Each half is a set difference over the expected mock's columns. A test
//! passes when every half it runs returns no rows.

use crate::encoder::{MockEncoder, MockError, SqlMock};
use dbtmock_core::{AssertionDirection, DiffDirection};
use dbtmock_dbt::Mock;

/// The generated assertion statements for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionQueries {
    /// Rows the model produces that are not expected
    pub query_minus_expected: String,

    /// Expected rows the model does not produce; absent for single-direction assertions
    pub expected_minus_query: Option<String>,
}

impl AssertionQueries {
    /// Statements in execution order, tagged with their direction
    pub fn halves(&self) -> Vec<(DiffDirection, &str)> {
        let mut halves = vec![(DiffDirection::QueryMinusExpected, self.query_minus_expected.as_str())];
        if let Some(sql) = &self.expected_minus_query {
            halves.push((DiffDirection::ExpectedMinusQuery, sql.as_str()));
        }
        halves
    }

    pub fn is_bidirectional(&self) -> bool {
        self.expected_minus_query.is_some()
    }
}

pub struct AssertionBuilder;

impl AssertionBuilder {
    /// Single-direction assertion: model output minus expected rows
    pub fn build(substituted_sql: &str, expected: &Mock) -> Result<String, MockError> {
        let expected = MockEncoder::encode(expected)?;
        Ok(query_minus_expected(substituted_sql, &expected))
    }

    /// Both halves of the symmetric difference
    pub fn build_both(substituted_sql: &str, expected: &Mock) -> Result<AssertionQueries, MockError> {
        Self::build_with(substituted_sql, expected, AssertionDirection::Both)
    }

    pub fn build_with(
        substituted_sql: &str,
        expected: &Mock,
        direction: AssertionDirection,
    ) -> Result<AssertionQueries, MockError> {
        let expected = MockEncoder::encode(expected)?;
        Ok(Self::from_encoded(substituted_sql, &expected, direction))
    }

    /// Build from an already encoded expected mock
    pub fn from_encoded(
        substituted_sql: &str,
        expected: &SqlMock,
        direction: AssertionDirection,
    ) -> AssertionQueries {
        let expected_minus_query = match direction {
            AssertionDirection::Both => Some(expected_minus_query(substituted_sql, expected)),
            AssertionDirection::QueryMinusExpected => None,
        };

        AssertionQueries {
            query_minus_expected: query_minus_expected(substituted_sql, expected),
            expected_minus_query,
        }
    }
}

fn query_minus_expected(sql: &str, expected: &SqlMock) -> String {
    except_distinct(sql, &expected.as_relation(), &expected.column_list())
}

fn expected_minus_query(sql: &str, expected: &SqlMock) -> String {
    except_distinct(&expected.as_relation(), sql, &expected.column_list())
}

fn except_distinct(left: &str, right: &str, columns: &str) -> String {
    format!(
        "SELECT {columns} FROM( {left} ) \n  EXCEPT DISTINCT \n SELECT {columns} FROM ({right})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn expected(csv: &str) -> SqlMock {
        MockEncoder::encode_reader(csv.as_bytes(), &BTreeMap::new()).unwrap()
    }

    #[test]
    fn single_direction_selects_sorted_columns_from_both_sides() {
        let mock = expected("val,name\n1,foo\n");
        let queries = AssertionBuilder::from_encoded(
            "SELECT * FROM t",
            &mock,
            AssertionDirection::QueryMinusExpected,
        );

        assert_eq!(
            queries.query_minus_expected,
            "SELECT name,val FROM( SELECT * FROM t ) \n  EXCEPT DISTINCT \n SELECT name,val FROM (\n SELECT \"foo\" AS name, \"1\" AS val)"
        );
        assert!(!queries.is_bidirectional());
        assert_eq!(queries.halves().len(), 1);
    }

    #[test]
    fn bidirectional_mirrors_the_operands() {
        let mock = expected("a\n1\n");
        let queries = AssertionBuilder::from_encoded("SELECT 1 AS a", &mock, AssertionDirection::Both);

        assert_eq!(
            queries.expected_minus_query.as_deref(),
            Some("SELECT a FROM( \n SELECT \"1\" AS a ) \n  EXCEPT DISTINCT \n SELECT a FROM (SELECT 1 AS a)")
        );

        let directions: Vec<DiffDirection> = queries.halves().into_iter().map(|(d, _)| d).collect();
        assert_eq!(
            directions,
            vec![DiffDirection::QueryMinusExpected, DiffDirection::ExpectedMinusQuery]
        );
    }

    #[test]
    fn empty_expectation_uses_zero_row_relation() {
        let mock = expected("a,b\n");
        let queries = AssertionBuilder::from_encoded("SELECT 1 AS a, 2 AS b", &mock, AssertionDirection::Both);

        assert!(queries
            .query_minus_expected
            .ends_with("FROM (SELECT null AS a, null AS b LIMIT 0)"));
    }

    #[test]
    fn build_reads_the_expected_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expected.csv");
        std::fs::write(&path, "n\n7\n").unwrap();

        let sql = AssertionBuilder::build("SELECT 7 AS n", &Mock::new(&path)).unwrap();
        assert!(sql.starts_with("SELECT n FROM( SELECT 7 AS n )"));

        let both = AssertionBuilder::build_both("SELECT 7 AS n", &Mock::new(&path)).unwrap();
        assert_eq!(both.query_minus_expected, sql);
        assert!(both.is_bidirectional());
    }

    #[test]
    fn missing_expected_file_is_a_mock_error() {
        let err = AssertionBuilder::build("SELECT 1", &Mock::new("/nope/expected.csv")).unwrap_err();
        assert!(matches!(err, MockError::FileNotFound(_)));
    }
}
