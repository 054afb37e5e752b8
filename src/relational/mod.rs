//! Relational backing store.
//!
//! The store accepts only pre-validated argument types: table and column names
//! are [`Identifier`]s, an update cannot be expressed without a non-empty
//! [`Filter`], and ad-hoc SQL must first become a [`ReadOnlyStatement`]. There
//! is no delete method on [`RelationalStore`].

mod sqlite;

pub use sqlite::SqliteDatabase;

use crate::config::DatabaseSettings;
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// A row, keyed by column name.
pub type Record = Map<String, Value>;

/// Leading keywords accepted by [`ReadOnlyStatement`].
pub const READ_VERBS: &[&str] = &["SELECT", "WITH", "EXPLAIN", "VALUES"];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// A validated table or column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `name` as a bare SQL identifier.
    pub fn parse(name: &str) -> Result<Self> {
        if IDENTIFIER.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(BrokerError::Validation(format!(
                "'{}' is not a valid table or column name",
                name
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for splicing into SQL.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered column/value pairs parsed from a JSON object.
fn parse_columns(object: &Map<String, Value>) -> Result<Vec<(Identifier, Value)>> {
    object
        .iter()
        .map(|(column, value)| Ok((Identifier::parse(column)?, value.clone())))
        .collect()
}

/// Column values to write (`data` argument of create/update).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignments(Vec<(Identifier, Value)>);

impl Assignments {
    /// Build from a JSON object; an empty object is rejected.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        if object.is_empty() {
            return Err(BrokerError::Validation(
                "'data' must contain at least one column".to_string(),
            ));
        }
        Ok(Self(parse_columns(object)?))
    }

    pub fn columns(&self) -> &[(Identifier, Value)] {
        &self.0
    }
}

/// Conjunction of column equality predicates. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Vec<(Identifier, Value)>);

impl Filter {
    /// Build from a JSON object; an empty object is rejected so that no
    /// statement built from a `Filter` can be unscoped.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        if object.is_empty() {
            return Err(BrokerError::Validation(
                "'filters' must contain at least one column".to_string(),
            ));
        }
        Ok(Self(parse_columns(object)?))
    }

    pub fn predicates(&self) -> &[(Identifier, Value)] {
        &self.0
    }
}

/// A SQL statement whose leading keyword is a read verb.
///
/// Backends re-check read-only status with the engine before executing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOnlyStatement(String);

impl ReadOnlyStatement {
    pub fn parse(sql: &str) -> Result<Self> {
        let body = strip_leading_noise(sql);
        if body.is_empty() {
            return Err(BrokerError::Validation("'query' must not be empty".to_string()));
        }

        let verb: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        if !READ_VERBS.contains(&verb.as_str()) {
            let shown = if verb.is_empty() {
                body.chars().take(16).collect()
            } else {
                verb
            };
            return Err(BrokerError::Forbidden(format!(
                "only read-only statements ({}) are allowed, got '{}'",
                READ_VERBS.join(", "),
                shown
            )));
        }

        if has_trailing_statement(body) {
            return Err(BrokerError::Forbidden(
                "only a single statement may be executed".to_string(),
            ));
        }

        Ok(Self(sql.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Skip whitespace and SQL comments before the first keyword.
fn strip_leading_noise(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return trimmed;
        }
    }
}

/// True when a top-level `;` is followed by anything but whitespace or comments.
fn has_trailing_statement(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ';' => {
                let rest: String = chars.collect();
                return !strip_leading_noise(&rest).is_empty();
            }
            _ => {}
        }
    }
    false
}

/// Column description returned by schema introspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub notnull: bool,
    pub default: Option<String>,
    pub pk: bool,
}

/// Trait for relational backends.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert one row and return its row id.
    async fn insert(&self, table: &Identifier, data: &Assignments) -> Result<i64>;

    /// Select up to `limit` rows, optionally filtered.
    async fn select(
        &self,
        table: &Identifier,
        filter: Option<&Filter>,
        limit: u32,
    ) -> Result<Vec<Record>>;

    /// Update rows matching `filter`; returns rows affected.
    async fn update(&self, table: &Identifier, filter: &Filter, data: &Assignments) -> Result<usize>;

    /// Run an ad-hoc read-only statement.
    async fn query(&self, statement: &ReadOnlyStatement) -> Result<Vec<Record>>;

    /// Names of user tables.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column layout of `table`; `NotFound` if it does not exist.
    async fn describe_table(&self, table: &Identifier) -> Result<Vec<ColumnInfo>>;
}

/// Open the relational store selected by the configuration.
pub fn open_relational_store(
    settings: &DatabaseSettings,
    path: &Path,
) -> Result<Arc<dyn RelationalStore>> {
    match settings.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteDatabase::new(path)?)),
        other => Err(BrokerError::Config(format!(
            "Unknown database provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::parse("users").is_ok());
        assert!(Identifier::parse("_tmp_2").is_ok());
        for bad in ["", "1users", "users; DROP TABLE x", "a b", "\"users\"", "users--"] {
            assert!(
                matches!(Identifier::parse(bad), Err(BrokerError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_filter_rejected() {
        let err = Filter::from_object(&Map::new()).unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));

        let filter = Filter::from_object(&object(json!({"id": 1}))).unwrap();
        assert_eq!(filter.predicates().len(), 1);
    }

    #[test]
    fn test_empty_assignments_rejected() {
        assert!(matches!(
            Assignments::from_object(&Map::new()),
            Err(BrokerError::Validation(_))
        ));
        assert!(matches!(
            Assignments::from_object(&object(json!({"bad name": 1}))),
            Err(BrokerError::Validation(_))
        ));
    }

    #[test]
    fn test_read_verbs_accepted() {
        for sql in [
            "SELECT * FROM users",
            "  select 1",
            "WITH t AS (SELECT 1) SELECT * FROM t",
            "-- comment\nSELECT 1",
            "/* hint */ explain query plan select 1",
            "VALUES (1, 2)",
            "SELECT 1;",
            "SELECT ';' AS sep; -- trailing comment",
            "SELECT 'it''s; fine'",
        ] {
            assert!(ReadOnlyStatement::parse(sql).is_ok(), "{sql:?} should be accepted");
        }
    }

    #[test]
    fn test_non_read_verbs_forbidden() {
        for sql in [
            "DELETE FROM users",
            "drop table users",
            "INSERT INTO users VALUES (1)",
            "UPDATE users SET name = 'x'",
            "PRAGMA writable_schema = 1",
            "ATTACH DATABASE 'x' AS y",
            "SELECTX 1",
            "-- SELECT\nDELETE FROM users",
            "123",
            "(SELECT 1)",
            "( DELETE FROM users)",
            "SELECT 1; DELETE FROM users",
            "select * from users;drop table users",
        ] {
            assert!(
                matches!(ReadOnlyStatement::parse(sql), Err(BrokerError::Forbidden(_))),
                "{sql:?} should be forbidden"
            );
        }
    }

    #[test]
    fn test_blank_query_is_validation_error() {
        assert!(matches!(
            ReadOnlyStatement::parse("   -- nothing"),
            Err(BrokerError::Validation(_))
        ));
    }
}
