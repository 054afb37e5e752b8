//! The closed set of brokered operations.
//!
//! Every tool an agent can call is one variant here, carrying its validated
//! arguments. There is no variant that removes data, so no request can be
//! parsed into one.

use crate::error::{BrokerError, Result};
use crate::relational::{Assignments, Filter, Identifier, ReadOnlyStatement};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Backing store an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// SQL records.
    Relational,
    /// Document similarity search.
    Vector,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Relational => write!(f, "relational"),
            Domain::Vector => write!(f, "vector"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relational" | "database" | "sql" => Ok(Domain::Relational),
            "vector" | "documents" | "rag" => Ok(Domain::Vector),
            _ => Err(format!("Unknown domain: {}", s)),
        }
    }
}

/// Names of every tool on the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CreateRecord,
    ReadRecords,
    UpdateRecord,
    ExecuteQuery,
    ListTables,
    DescribeTable,
    SearchDocuments,
    ListDocuments,
    GetDocument,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::CreateRecord,
        ToolName::ReadRecords,
        ToolName::UpdateRecord,
        ToolName::ExecuteQuery,
        ToolName::ListTables,
        ToolName::DescribeTable,
        ToolName::SearchDocuments,
        ToolName::ListDocuments,
        ToolName::GetDocument,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::CreateRecord => "create_record",
            ToolName::ReadRecords => "read_records",
            ToolName::UpdateRecord => "update_record",
            ToolName::ExecuteQuery => "execute_query",
            ToolName::ListTables => "list_tables",
            ToolName::DescribeTable => "describe_table",
            ToolName::SearchDocuments => "search_documents",
            ToolName::ListDocuments => "list_documents",
            ToolName::GetDocument => "get_document",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            ToolName::CreateRecord
            | ToolName::ReadRecords
            | ToolName::UpdateRecord
            | ToolName::ExecuteQuery
            | ToolName::ListTables
            | ToolName::DescribeTable => Domain::Relational,
            ToolName::SearchDocuments | ToolName::ListDocuments | ToolName::GetDocument => {
                Domain::Vector
            }
        }
    }
}

impl FromStr for ToolName {
    type Err = BrokerError;

    fn from_str(name: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| BrokerError::UnknownOperation(name.to_string()))
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relational operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationalOp {
    CreateRecord {
        table: Identifier,
        data: Assignments,
    },
    ReadRecords {
        table: Identifier,
        filters: Option<Filter>,
        limit: Option<u32>,
    },
    UpdateRecord {
        table: Identifier,
        filters: Filter,
        data: Assignments,
    },
    ExecuteQuery {
        query: ReadOnlyStatement,
    },
    ListTables,
    DescribeTable {
        table: Identifier,
    },
}

/// What to search the document index with.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Free text, embedded before searching.
    Text(String),
    /// A ready-made embedding.
    Vector(Vec<f32>),
}

/// Document-index operations.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorOp {
    SearchDocuments {
        query: SearchQuery,
        limit: Option<u32>,
    },
    ListDocuments {
        limit: Option<u32>,
    },
    GetDocument {
        document_id: String,
    },
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Relational(RelationalOp),
    Vector(VectorOp),
}

impl Operation {
    /// Validate a tool name and its JSON arguments.
    ///
    /// `UnknownOperation` for names off the allow-list, `Validation` for
    /// missing or malformed arguments, `Forbidden` for a non-read raw query.
    pub fn parse(name: &str, arguments: Option<&Value>) -> Result<Self> {
        let tool = ToolName::from_str(name)?;
        let empty = Map::new();
        let args = match arguments {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(BrokerError::Validation(
                    "arguments must be a JSON object".to_string(),
                ))
            }
        };

        let op = match tool {
            ToolName::CreateRecord => Operation::Relational(RelationalOp::CreateRecord {
                table: table_arg(args)?,
                data: Assignments::from_object(required_object(args, "data")?)?,
            }),
            ToolName::ReadRecords => Operation::Relational(RelationalOp::ReadRecords {
                table: table_arg(args)?,
                filters: match optional_object(args, "filters")? {
                    Some(map) if !map.is_empty() => Some(Filter::from_object(map)?),
                    _ => None,
                },
                limit: optional_limit(args, "limit")?,
            }),
            ToolName::UpdateRecord => Operation::Relational(RelationalOp::UpdateRecord {
                table: table_arg(args)?,
                filters: Filter::from_object(required_object(args, "filters")?)?,
                data: Assignments::from_object(required_object(args, "data")?)?,
            }),
            ToolName::ExecuteQuery => Operation::Relational(RelationalOp::ExecuteQuery {
                query: ReadOnlyStatement::parse(required_str(args, "query")?)?,
            }),
            ToolName::ListTables => Operation::Relational(RelationalOp::ListTables),
            ToolName::DescribeTable => Operation::Relational(RelationalOp::DescribeTable {
                table: table_arg(args)?,
            }),
            ToolName::SearchDocuments => Operation::Vector(VectorOp::SearchDocuments {
                query: search_query(args)?,
                limit: optional_limit(args, "limit")?,
            }),
            ToolName::ListDocuments => Operation::Vector(VectorOp::ListDocuments {
                limit: optional_limit(args, "limit")?,
            }),
            ToolName::GetDocument => Operation::Vector(VectorOp::GetDocument {
                document_id: required_str(args, "document_id")?.to_string(),
            }),
        };

        Ok(op)
    }

    pub fn tool(&self) -> ToolName {
        match self {
            Operation::Relational(op) => match op {
                RelationalOp::CreateRecord { .. } => ToolName::CreateRecord,
                RelationalOp::ReadRecords { .. } => ToolName::ReadRecords,
                RelationalOp::UpdateRecord { .. } => ToolName::UpdateRecord,
                RelationalOp::ExecuteQuery { .. } => ToolName::ExecuteQuery,
                RelationalOp::ListTables => ToolName::ListTables,
                RelationalOp::DescribeTable { .. } => ToolName::DescribeTable,
            },
            Operation::Vector(op) => match op {
                VectorOp::SearchDocuments { .. } => ToolName::SearchDocuments,
                VectorOp::ListDocuments { .. } => ToolName::ListDocuments,
                VectorOp::GetDocument { .. } => ToolName::GetDocument,
            },
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Operation::Relational(_) => Domain::Relational,
            Operation::Vector(_) => Domain::Vector,
        }
    }
}

/// An unvalidated tool invocation as received from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments: Some(arguments),
        }
    }

    /// Target domain, determined by the name alone.
    pub fn domain(&self) -> Result<Domain> {
        Ok(ToolName::from_str(&self.name)?.domain())
    }

    pub fn validate(&self) -> Result<Operation> {
        Operation::parse(&self.name, self.arguments.as_ref())
    }
}

fn missing(key: &str) -> BrokerError {
    BrokerError::Validation(format!("Missing '{}' argument", key))
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match args.get(key) {
        None | Some(Value::Null) => Err(missing(key)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(BrokerError::Validation(format!("'{}' must be a string", key))),
    }
}

fn table_arg(args: &Map<String, Value>) -> Result<Identifier> {
    Identifier::parse(required_str(args, "table")?)
}

fn optional_object<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(BrokerError::Validation(format!("'{}' must be an object", key))),
    }
}

fn required_object<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a Map<String, Value>> {
    optional_object(args, key)?.ok_or_else(|| missing(key))
}

fn optional_limit(args: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                BrokerError::Validation(format!("'{}' must be a positive integer", key))
            }),
    }
}

fn search_query(args: &Map<String, Value>) -> Result<SearchQuery> {
    let text = match args.get("query") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(_) => {
            return Err(BrokerError::Validation(
                "'query' must be a non-empty string".to_string(),
            ))
        }
    };
    let vector = match args.get("vector") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if !items.is_empty() => Some(
            items
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| {
                    BrokerError::Validation("'vector' must contain only numbers".to_string())
                })?,
        ),
        Some(_) => {
            return Err(BrokerError::Validation(
                "'vector' must be a non-empty array of numbers".to_string(),
            ))
        }
    };

    match (text, vector) {
        (Some(text), None) => Ok(SearchQuery::Text(text)),
        (None, Some(vector)) => Ok(SearchQuery::Vector(vector)),
        (None, None) => Err(missing("query")),
        (Some(_), Some(_)) => Err(BrokerError::Validation(
            "provide either 'query' or 'vector', not both".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(name: &str, args: Value) -> Result<Operation> {
        Operation::parse(name, Some(&args))
    }

    #[test]
    fn test_every_listed_name_resolves() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_str(tool.as_str()).unwrap(), tool);
        }
    }

    #[test]
    fn test_names_off_the_list_are_unknown() {
        for name in [
            "delete_record",
            "drop_table",
            "DELETE",
            "Create_Record",
            "create_record ",
            "",
            "search",
            "execute",
        ] {
            assert!(
                matches!(parse(name, json!({})), Err(BrokerError::UnknownOperation(_))),
                "{name:?} should be unknown"
            );
        }
    }

    #[test]
    fn test_update_without_filters_fails_validation() {
        let missing = parse("update_record", json!({"table": "users", "data": {"age": 31}}));
        assert!(matches!(missing, Err(BrokerError::Validation(_))));

        let empty = parse(
            "update_record",
            json!({"table": "users", "filters": {}, "data": {"age": 31}}),
        );
        assert!(matches!(empty, Err(BrokerError::Validation(_))));

        let null = parse(
            "update_record",
            json!({"table": "users", "filters": null, "data": {"age": 31}}),
        );
        assert!(matches!(null, Err(BrokerError::Validation(_))));
    }

    #[test]
    fn test_raw_query_verbs() {
        assert!(matches!(
            parse("execute_query", json!({"query": "DELETE FROM users"})),
            Err(BrokerError::Forbidden(_))
        ));
        assert!(matches!(
            parse("execute_query", json!({})),
            Err(BrokerError::Validation(_))
        ));
        let op = parse("execute_query", json!({"query": "select count(*) from users"})).unwrap();
        assert_eq!(op.tool(), ToolName::ExecuteQuery);
    }

    #[test]
    fn test_read_records_filters_optional() {
        let op = parse("read_records", json!({"table": "users", "filters": {}})).unwrap();
        match op {
            Operation::Relational(RelationalOp::ReadRecords { filters, limit, .. }) => {
                assert!(filters.is_none());
                assert!(limit.is_none());
            }
            other => panic!("Expected ReadRecords, got {:?}", other),
        }

        assert!(matches!(
            parse("read_records", json!({"table": "users", "limit": 0})),
            Err(BrokerError::Validation(_))
        ));
        assert!(matches!(
            parse("read_records", json!({"table": "users", "limit": "ten"})),
            Err(BrokerError::Validation(_))
        ));
    }

    #[test]
    fn test_create_requires_table_and_data() {
        assert!(matches!(
            parse("create_record", json!({"data": {"name": "x"}})),
            Err(BrokerError::Validation(_))
        ));
        assert!(matches!(
            parse("create_record", json!({"table": "users"})),
            Err(BrokerError::Validation(_))
        ));
        assert!(matches!(
            parse("create_record", json!({"table": "users; --", "data": {"name": "x"}})),
            Err(BrokerError::Validation(_))
        ));
    }

    #[test]
    fn test_search_query_forms() {
        let op = parse("search_documents", json!({"query": "vacation", "limit": 3})).unwrap();
        assert_eq!(
            op,
            Operation::Vector(VectorOp::SearchDocuments {
                query: SearchQuery::Text("vacation".to_string()),
                limit: Some(3),
            })
        );

        let op = parse("search_documents", json!({"vector": [1, 0.5]})).unwrap();
        assert!(matches!(
            op,
            Operation::Vector(VectorOp::SearchDocuments { query: SearchQuery::Vector(ref v), .. }) if v == &vec![1.0f32, 0.5]
        ));

        assert!(matches!(
            parse("search_documents", json!({})),
            Err(BrokerError::Validation(_))
        ));
        assert!(matches!(
            parse("search_documents", json!({"query": "a", "vector": [1.0]})),
            Err(BrokerError::Validation(_))
        ));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert!(matches!(
            Operation::parse("list_tables", Some(&json!([1, 2]))),
            Err(BrokerError::Validation(_))
        ));
        assert_eq!(
            Operation::parse("list_tables", None).unwrap(),
            Operation::Relational(RelationalOp::ListTables)
        );
    }

    #[test]
    fn test_request_domain_follows_name() {
        let request = OperationRequest::new("get_document", json!({"document_id": "a"}));
        assert_eq!(request.domain().unwrap(), Domain::Vector);
        assert_eq!(request.validate().unwrap().domain(), Domain::Vector);

        let request = OperationRequest::new("describe_table", json!({"table": "users"}));
        assert_eq!(request.domain().unwrap(), Domain::Relational);
    }
}
