//! In-memory query executor
//!
//! Runs generated test SQL without a warehouse. It understands the shapes the
//! generator emits:
//! - literal row unions (`SELECT "v" AS c, CAST(null AS T) AS d UNION ALL ...`)
//! - zero-row projections ending in `LIMIT 0`
//! - pass-through wrappers (`SELECT * FROM (<relation>) AS alias`)
//! - assertion halves (`SELECT cols FROM (<a>) EXCEPT DISTINCT SELECT cols FROM (<b>)`)
//!
//! Any other SQL, such as a model that aggregates or joins, must be registered
//! up front together with the rows it should produce. Values compare as text;
//! `CAST` target types are not applied.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let executor = MemoryExecutor::new();
//! executor
//!     .add_relation(model_sql, QueryResult::from_strings(["name", "total"], vec![vec!["foo", "3"]]))
//!     .await;
//!
//! let diff = executor.execute(&assertion_sql).await?;
//! ```

use crate::executor::{ExecError, QueryExecutor, QueryResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Executor that evaluates generated SQL in memory
pub struct MemoryExecutor {
    /// Canned results keyed by trimmed SQL text
    relations: Arc<RwLock<HashMap<String, QueryResult>>>,

    /// Errors returned for any query containing the key
    errors: Arc<RwLock<Vec<(String, ExecError)>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    executor_name: &'static str,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::from_relations(HashMap::new())
    }

    /// Create an executor from pre-built canned results
    pub fn from_relations(relations: HashMap<String, QueryResult>) -> Self {
        let relations = relations
            .into_iter()
            .map(|(sql, result)| (sql.trim().to_string(), result))
            .collect();

        Self {
            relations: Arc::new(RwLock::new(relations)),
            errors: Arc::new(RwLock::new(Vec::new())),
            fail_connection: false,
            latency_ms: 0,
            executor_name: "Memory",
        }
    }

    /// Register the rows a piece of SQL produces wherever it appears as a relation
    pub async fn add_relation(&self, sql: impl AsRef<str>, result: QueryResult) {
        self.relations
            .write()
            .await
            .insert(sql.as_ref().trim().to_string(), result);
    }

    /// Fail every query whose text contains `fragment`
    pub async fn add_error_for_query(&self, fragment: impl Into<String>, error: ExecError) {
        self.errors.write().await.push((fragment.into(), error));
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for every query
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.executor_name = name;
        self
    }

    pub async fn relation_count(&self) -> usize {
        self.relations.read().await.len()
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryExecutor {
    fn clone(&self) -> Self {
        Self {
            relations: Arc::clone(&self.relations),
            errors: Arc::clone(&self.errors),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            executor_name: self.executor_name,
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for MemoryExecutor {
    fn name(&self) -> &'static str {
        self.executor_name
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, ExecError> {
        self.simulate_latency().await;

        if let Some((_, error)) = self
            .errors
            .read()
            .await
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(error.clone());
        }

        let relations = self.relations.read().await;
        let result = Evaluator { relations: &relations }.query(sql)?;
        tracing::debug!(executor = self.executor_name, rows = result.row_count(), "query evaluated");
        Ok(result)
    }

    async fn test_connection(&self) -> Result<(), ExecError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(ExecError::NetworkError("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }
}

struct Evaluator<'a> {
    relations: &'a HashMap<String, QueryResult>,
}

impl Evaluator<'_> {
    fn query(&self, sql: &str) -> Result<QueryResult, ExecError> {
        let sql = sql.trim();
        let halves = split_top_level(sql, "EXCEPT DISTINCT");

        match halves.as_slice() {
            [_] => self.relation(sql),
            [left, right] => self.except_distinct(left, right),
            _ => Err(unsupported("chained EXCEPT DISTINCT", sql)),
        }
    }

    fn except_distinct(&self, left: &str, right: &str) -> Result<QueryResult, ExecError> {
        let (columns, left) = projection(left)?;
        let (right_columns, right) = projection(right)?;
        if columns != right_columns {
            return Err(ExecError::QueryError(format!(
                "EXCEPT DISTINCT sides project different columns: [{}] vs [{}]",
                columns.join(", "),
                right_columns.join(", ")
            )));
        }

        let left = project(&self.relation(left)?, &columns)?;
        let right = project(&self.relation(right)?, &columns)?;

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for row in left {
            if !right.contains(&row) && !rows.contains(&row) {
                rows.push(row);
            }
        }

        Ok(QueryResult::new(columns, rows))
    }

    fn relation(&self, sql: &str) -> Result<QueryResult, ExecError> {
        let sql = sql.trim();
        if let Some(result) = self.relations.get(sql) {
            return Ok(result.clone());
        }
        if let Some(inner) = star_from_subquery(sql) {
            return self.relation(inner);
        }
        literal_union(sql)
    }
}

/// Split `SELECT <cols> FROM (<relation>)` into its column list and relation
fn projection(sql: &str) -> Result<(Vec<String>, &str), ExecError> {
    let sql = sql.trim();
    let body = strip_keyword(sql, "SELECT").ok_or_else(|| unsupported("projection", sql))?;
    let from = *top_level_matches(body, "FROM")
        .first()
        .ok_or_else(|| unsupported("projection without FROM", sql))?;

    let columns: Vec<String> = body[..from]
        .split(',')
        .map(|c| unquote_identifier(c.trim()))
        .filter(|c| !c.is_empty())
        .collect();

    let source = body[from + "FROM".len()..].trim();
    match matching_paren(source) {
        Some(close) if close == source.len() - 1 => Ok((columns, &source[1..close])),
        _ => Err(unsupported("projection source", sql)),
    }
}

fn project(result: &QueryResult, columns: &[String]) -> Result<Vec<Vec<Value>>, ExecError> {
    let indices = columns
        .iter()
        .map(|column| {
            result
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| ExecError::QueryError(format!("Unrecognized name: {}", column)))
        })
        .collect::<Result<Vec<usize>, ExecError>>()?;

    Ok(result
        .rows
        .iter()
        .map(|row| indices.iter().map(|&i| row.get(i).cloned().unwrap_or(Value::Null)).collect())
        .collect())
}

/// Inner relation of `SELECT * FROM (<inner>) [AS] [alias]`
fn star_from_subquery(sql: &str) -> Option<&str> {
    let rest = strip_keyword(sql, "SELECT")?.trim_start();
    let rest = rest.strip_prefix('*')?.trim_start();
    let rest = strip_keyword(rest, "FROM")?.trim_start();

    let close = matching_paren(rest)?;
    let mut alias = rest[close + 1..].split_whitespace();
    let valid_alias = match (alias.next(), alias.next(), alias.next()) {
        (None, _, _) => true,
        (Some(kw), Some(name), None) if kw.eq_ignore_ascii_case("AS") => is_identifier(name),
        (Some(name), None, _) => is_identifier(name),
        _ => false,
    };

    valid_alias.then(|| &rest[1..close])
}

fn literal_union(sql: &str) -> Result<QueryResult, ExecError> {
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for part in split_top_level(sql, "UNION ALL") {
        let (part_columns, row) = literal_select(part)?;
        match &columns {
            Some(existing) if *existing != part_columns => {
                return Err(ExecError::QueryError(
                    "UNION ALL branches have different columns".to_string(),
                ))
            }
            Some(_) => {}
            None => columns = Some(part_columns),
        }
        rows.extend(row);
    }

    Ok(QueryResult::new(columns.unwrap_or_default(), rows))
}

/// One `SELECT <literal> AS <col>, ... [LIMIT 0]` branch
fn literal_select(sql: &str) -> Result<(Vec<String>, Option<Vec<Value>>), ExecError> {
    let sql = sql.trim();
    let mut body = strip_keyword(sql, "SELECT").ok_or_else(|| unsupported("relation", sql))?;

    let mut empty = false;
    if let Some(&limit) = top_level_matches(body, "LIMIT").first() {
        if body[limit + "LIMIT".len()..].trim() != "0" {
            return Err(unsupported("LIMIT other than 0", sql));
        }
        empty = true;
        body = &body[..limit];
    }

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (position, entry) in split_top_level(body, ",").into_iter().enumerate() {
        let entry = entry.trim();
        let (expr, column) = match top_level_matches(entry, "AS").last() {
            Some(&at) => (entry[..at].trim(), unquote_identifier(entry[at + 2..].trim())),
            None => (entry, format!("f{}_", position)),
        };
        values.push(literal(expr)?);
        columns.push(column);
    }

    Ok((columns, (!empty).then_some(values)))
}

fn literal(expr: &str) -> Result<Value, ExecError> {
    if let Some(inner) = strip_keyword(expr, "CAST") {
        let inner = inner.trim();
        if let Some(close) = matching_paren(inner) {
            if close == inner.len() - 1 {
                let inner = &inner[1..close];
                if let Some(&at) = top_level_matches(inner, "AS").last() {
                    return literal(inner[..at].trim());
                }
            }
        }
        return Err(unsupported("CAST expression", expr));
    }

    if expr.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }

    for quote in ['"', '\''] {
        if expr.len() >= 2 && expr.starts_with(quote) && expr.ends_with(quote) {
            return Ok(Value::String(unescape(&expr[1..expr.len() - 1])));
        }
    }

    if expr.parse::<f64>().is_ok() {
        return Ok(Value::String(expr.to_string()));
    }

    Err(unsupported("expression", expr))
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unquote_identifier(name: &str) -> String {
    name.trim_matches('`').to_string()
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Strip a leading keyword matched case-insensitively on a word boundary
fn strip_keyword<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    let head = sql.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &sql[keyword.len()..];
    match rest.bytes().next() {
        Some(b) if b.is_ascii_alphanumeric() || b == b'_' => None,
        _ => Some(rest),
    }
}

/// Byte offsets of `pattern` outside quotes and parentheses
///
/// Alphabetic patterns only match on word boundaries, case-insensitively.
fn top_level_matches(sql: &str, pattern: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let pattern = pattern.as_bytes();
    let word = pattern.iter().all(|b| b.is_ascii_alphabetic() || *b == b' ');

    let mut matches = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && matches_at(bytes, i, pattern, word) => {
                matches.push(i);
                i += pattern.len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    matches
}

fn matches_at(bytes: &[u8], at: usize, pattern: &[u8], word: bool) -> bool {
    let end = at + pattern.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(pattern) {
        return false;
    }
    if !word {
        return true;
    }

    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    (at == 0 || !is_ident(bytes[at - 1])) && (end == bytes.len() || !is_ident(bytes[end]))
}

fn split_top_level<'a>(sql: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for at in top_level_matches(sql, separator) {
        parts.push(&sql[start..at]);
        start = at + separator.len();
    }
    parts.push(&sql[start..]);
    parts
}

/// Offset of the parenthesis closing the one `sql` starts with
fn matching_paren(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn unsupported(what: &str, sql: &str) -> ExecError {
    let mut excerpt: String = sql.chars().take(80).collect();
    if excerpt.len() < sql.len() {
        excerpt.push_str("...");
    }
    ExecError::Unsupported(format!("{}: {}", what, excerpt))
}
