//! CSV mock to literal SQL encoding
//!
//! Every data row becomes one `SELECT` of literal values and the rows are
//! chained with `UNION ALL`. Columns are emitted in lexicographic order, not
//! file order, so generated SQL is stable under CSV column reordering.

use dbtmock_core::DiagnosticCode;
use dbtmock_dbt::Mock;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const INLINE_ORIGIN: &str = "<inline>";

/// Literal SQL for one mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMock {
    /// Row `SELECT`s joined with `UNION ALL`; empty for a header-only CSV
    pub sql: String,

    /// Header columns, sorted
    pub columns: Vec<String>,

    /// Number of data rows encoded
    pub row_count: usize,

    types: BTreeMap<String, String>,
}

impl SqlMock {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// SQL usable wherever a relation is expected
    ///
    /// A header-only mock has no rows to union, so it is spliced as a typed
    /// zero-row projection instead of an empty string.
    pub fn as_relation(&self) -> String {
        if !self.is_empty() {
            return self.sql.clone();
        }

        let entries: Vec<String> = self
            .columns
            .iter()
            .map(|column| render_entry(column, "", self.types.get(column).map(String::as_str)))
            .collect();

        format!("SELECT {} LIMIT 0", entries.join(", "))
    }

    /// Comma-separated projection list
    pub fn column_list(&self) -> String {
        self.columns.join(",")
    }
}

/// Encodes mocks into literal SQL
pub struct MockEncoder;

impl MockEncoder {
    /// Read a mock's CSV file and encode it
    pub fn encode(mock: &Mock) -> Result<SqlMock, MockError> {
        let path = mock.filepath.as_path();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MockError::FileNotFound(path.display().to_string())
            } else {
                MockError::ReadError(path.display().to_string(), e.to_string())
            }
        })?;

        let encoded = encode_csv(file, &mock.types, path)?;
        tracing::debug!(
            file = %path.display(),
            rows = encoded.row_count,
            columns = encoded.columns.len(),
            "encoded mock"
        );
        Ok(encoded)
    }

    /// Encode CSV content from any reader
    pub fn encode_reader<R: Read>(
        reader: R,
        types: &BTreeMap<String, String>,
    ) -> Result<SqlMock, MockError> {
        encode_csv(reader, types, Path::new(INLINE_ORIGIN))
    }
}

fn encode_csv<R: Read>(
    reader: R,
    types: &BTreeMap<String, String>,
    origin: &Path,
) -> Result<SqlMock, MockError> {
    let origin_str = || origin.display().to_string();
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = csv_reader
        .headers()
        .map_err(|e| csv_error(e, origin))?
        .iter()
        .map(str::to_string)
        .collect();

    if header.is_empty() || header.iter().all(|c| c.is_empty()) {
        return Err(MockError::Malformed(origin_str(), "missing header row".to_string()));
    }

    // Positions of header columns in sorted order
    let mut order: Vec<usize> = (0..header.len()).collect();
    order.sort_by(|&a, &b| header[a].cmp(&header[b]));

    let columns: Vec<String> = order.iter().map(|&i| header[i].clone()).collect();
    if let Some(dup) = columns.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(MockError::Malformed(
            origin_str(),
            format!("duplicate column '{}'", dup[0]),
        ));
    }

    let mut statements = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| csv_error(e, origin))?;

        let entries: Vec<String> = order
            .iter()
            .map(|&i| {
                let column = &header[i];
                let value = record.get(i).unwrap_or("");
                render_entry(column, value, types.get(column).map(String::as_str))
            })
            .collect();

        statements.push(format!("\n SELECT {}", entries.join(", ")));
    }

    Ok(SqlMock {
        sql: statements.join("\n UNION ALL \n"),
        columns,
        row_count: statements.len(),
        types: types.clone(),
    })
}

/// Render one derived column: `"<value>" AS col`, `CAST("<value>" AS T) AS col`,
/// with empty values becoming a bare `null`
pub fn render_entry(column: &str, value: &str, sql_type: Option<&str>) -> String {
    let literal = if value.is_empty() {
        "null".to_string()
    } else {
        format!("\"{}\"", escape_literal(value))
    };

    match sql_type {
        Some(sql_type) => format!("CAST({} AS {}) AS {}", literal, sql_type, column),
        None => format!("{} AS {}", literal, column),
    }
}

/// Backslash-escape characters that would terminate a double-quoted literal
fn escape_literal(value: &str) -> String {
    if !value.contains(|c: char| c == '"' || c == '\\') {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn csv_error(err: csv::Error, origin: &Path) -> MockError {
    let origin = origin.display().to_string();
    match err.kind() {
        csv::ErrorKind::Io(io) => MockError::ReadError(origin, io.to_string()),
        _ => MockError::Malformed(origin, err.to_string()),
    }
}

/// Mock CSV errors
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Mock file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read mock file {0}: {1}")]
    ReadError(String, String),

    #[error("Malformed mock CSV {0}: {1}")]
    Malformed(String, String),
}

impl MockError {
    pub fn code(&self) -> DiagnosticCode {
        DiagnosticCode::MockFileError
    }

    /// Path of the offending CSV
    pub fn path(&self) -> &str {
        match self {
            Self::FileNotFound(path) | Self::ReadError(path, _) | Self::Malformed(path, _) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "column1,column2,column3\n\
                          something,1.0,100\n\
                          something2,2.0,200\n\
                          something3,3.0,300\n";

    fn encode(csv: &str, types: &[(&str, &str)]) -> SqlMock {
        let types: BTreeMap<String, String> = types
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
        MockEncoder::encode_reader(csv.as_bytes(), &types).unwrap()
    }

    #[test]
    fn encodes_rows_as_union_of_selects() {
        let mock = encode(SAMPLE, &[]);

        assert!(mock.sql.contains("SELECT \"something\" AS column1, \"1.0\" AS column2, \"100\" AS column3"));
        assert!(mock.sql.contains("SELECT \"something2\" AS column1, \"2.0\" AS column2, \"200\" AS column3"));
        assert!(mock.sql.contains("SELECT \"something3\" AS column1, \"3.0\" AS column2, \"300\" AS column3"));
        assert_eq!(mock.sql.matches("UNION ALL").count(), 2);
        assert_eq!(mock.row_count, 3);
        assert!(!mock.sql.contains("CAST"));
    }

    #[test]
    fn declared_types_wrap_every_value_in_cast() {
        let mock = encode(SAMPLE, &[("column2", "INT64")]);

        assert!(mock.sql.contains("SELECT \"something\" AS column1, CAST(\"1.0\" AS INT64) AS column2, \"100\" AS column3"));
        assert!(mock.sql.contains("SELECT \"something3\" AS column1, CAST(\"3.0\" AS INT64) AS column2, \"300\" AS column3"));
        assert_eq!(mock.sql.matches("CAST(").count(), 3);
    }

    #[test]
    fn columns_are_sorted_regardless_of_file_order() {
        let mock = encode("zeta,alpha,mid\n1,2,3\n", &[]);

        assert_eq!(mock.columns, vec!["alpha", "mid", "zeta"]);
        assert_eq!(mock.sql, "\n SELECT \"2\" AS alpha, \"3\" AS mid, \"1\" AS zeta");
        assert_eq!(mock.column_list(), "alpha,mid,zeta");
    }

    #[test]
    fn empty_values_render_as_bare_null() {
        let mock = encode("a,b\n,x\n", &[("b", "STRING"), ("a", "INT64")]);

        assert_eq!(mock.sql, "\n SELECT CAST(null AS INT64) AS a, CAST(\"x\" AS STRING) AS b");
        assert!(!mock.sql.contains("\"null\""));

        let untyped = encode("a,b\n,\n", &[]);
        assert_eq!(untyped.sql, "\n SELECT null AS a, null AS b");
    }

    #[test]
    fn header_only_mock_has_no_rows() {
        let mock = encode("name,val\n", &[("val", "INT64")]);

        assert!(mock.is_empty());
        assert_eq!(mock.sql, "");
        assert_eq!(mock.columns, vec!["name", "val"]);
        assert_eq!(mock.as_relation(), "SELECT null AS name, CAST(null AS INT64) AS val LIMIT 0");
    }

    #[test]
    fn non_empty_relation_is_the_union() {
        let mock = encode("name\nfoo\n", &[]);
        assert_eq!(mock.as_relation(), mock.sql);
    }

    #[test]
    fn quotes_inside_values_are_escaped() {
        let mock = encode("note\n\"say \"\"hi\"\", c:\\tmp\"\n", &[]);
        assert_eq!(mock.sql, "\n SELECT \"say \\\"hi\\\", c:\\\\tmp\" AS note");
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = MockEncoder::encode_reader("a,b\n1\n".as_bytes(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, MockError::Malformed(..)));
        assert_eq!(err.code(), DiagnosticCode::MockFileError);
    }

    #[test]
    fn duplicate_columns_are_malformed() {
        let err = MockEncoder::encode_reader("a,a\n1,2\n".as_bytes(), &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate column 'a'"));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = MockEncoder::encode(&Mock::new("/no/such/mock.csv")).unwrap_err();

        assert!(matches!(err, MockError::FileNotFound(_)));
        assert_eq!(err.path(), "/no/such/mock.csv");
    }

    #[test]
    fn encodes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let mock = MockEncoder::encode(&Mock::new(&path).with_type("column3", "INT64")).unwrap();
        assert_eq!(mock.row_count, 3);
        assert!(mock.sql.contains("CAST(\"300\" AS INT64) AS column3"));
    }
}
