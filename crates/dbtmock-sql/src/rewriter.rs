//! Table reference rewriting
//!
//! Substitutes a fully qualified table reference with a subquery. Matching is
//! textual, not SQL-aware: an identical string inside a literal or comment is
//! rewritten too. Compiled dbt output does not produce such collisions in
//! practice.

use regex::{Captures, NoExpand, RegexBuilder};

/// The unit of substitution for one resolved node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacement {
    /// Reference as consumers spell it, e.g. `` `p`.`d`.`orders` ``
    pub full_name: String,

    /// Subquery body substituted for the reference
    pub sql: String,

    /// Alias synthesized when the reference has none
    pub short_name: String,
}

impl Replacement {
    pub fn new(
        full_name: impl Into<String>,
        sql: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            sql: sql.into(),
            short_name: short_name.into(),
        }
    }

    /// The zero value, which rewrites nothing
    pub fn is_empty(&self) -> bool {
        self.full_name.is_empty() && self.sql.is_empty() && self.short_name.is_empty()
    }
}

/// Rewrites references to one table inside a SQL string
pub trait TableRewriter {
    fn rewrite(&self, sql: &str, replacement: &Replacement) -> Result<String, RewriteError>;
}

/// Regex-driven, case-insensitive textual rewriter
///
/// Two ordered passes:
/// 1. `<name> AS <alias>` becomes `(<sql>) AS <alias>`, keeping the alias
///    the rest of the statement already uses.
/// 2. Any remaining bare `<name>` becomes `(<sql>) AS <short_name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualRewriter;

impl TableRewriter for TextualRewriter {
    fn rewrite(&self, sql: &str, replacement: &Replacement) -> Result<String, RewriteError> {
        if replacement.is_empty() {
            return Ok(sql.to_string());
        }
        if replacement.full_name.is_empty() {
            return Err(RewriteError::MissingTableName);
        }

        let name = regex::escape(&replacement.full_name);

        let aliased = RegexBuilder::new(&format!(r"{}\s+AS\s+([A-Za-z0-9_]+)\b", name))
            .case_insensitive(true)
            .build()?;
        let sql = aliased.replace_all(sql, |caps: &Captures| {
            format!("({}) AS {}", replacement.sql, &caps[1])
        });

        let bare = RegexBuilder::new(&name).case_insensitive(true).build()?;
        let with_alias = format!("({}) AS {}", replacement.sql, replacement.short_name);
        let sql = bare.replace_all(&sql, NoExpand(&with_alias));

        Ok(sql.into_owned())
    }
}

/// Rewriting errors
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("Replacement has SQL but no table name to match")]
    MissingTableName,

    #[error("Invalid reference pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
