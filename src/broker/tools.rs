//! Tool catalogue advertised to agents.

use super::operation::ToolName;
use serde::Serialize;
use serde_json::{json, Value};

/// A tool an agent may call, with its JSON Schema.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Definition for a single tool.
pub fn definition(tool: ToolName) -> ToolDefinition {
    let (description, input_schema) = match tool {
        ToolName::CreateRecord => (
            "Insert a new record into a table. Returns the id of the created row.",
            json!({
                "type": "object",
                "properties": {
                    "table": {
                        "type": "string",
                        "description": "Table name"
                    },
                    "data": {
                        "type": "object",
                        "description": "Column names mapped to the values to insert"
                    }
                },
                "required": ["table", "data"]
            }),
        ),
        ToolName::ReadRecords => (
            "Read records from a table, optionally filtered by column equality.",
            json!({
                "type": "object",
                "properties": {
                    "table": {
                        "type": "string",
                        "description": "Table name"
                    },
                    "filters": {
                        "type": "object",
                        "description": "Column names mapped to the values rows must equal"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of records",
                        "default": 100
                    }
                },
                "required": ["table"]
            }),
        ),
        ToolName::UpdateRecord => (
            "Update the records of a table that match the filters. \
                Filters are required; unscoped updates are rejected.",
            json!({
                "type": "object",
                "properties": {
                    "table": {
                        "type": "string",
                        "description": "Table name"
                    },
                    "filters": {
                        "type": "object",
                        "description": "Column names mapped to the values rows must equal (at least one)"
                    },
                    "data": {
                        "type": "object",
                        "description": "Column names mapped to their new values"
                    }
                },
                "required": ["table", "filters", "data"]
            }),
        ),
        ToolName::ExecuteQuery => (
            "Run a read-only SQL query (SELECT, WITH, EXPLAIN or VALUES) and return the rows.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A single read-only SQL statement"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolName::ListTables => (
            "List the tables in the database.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        ToolName::DescribeTable => (
            "Describe the columns of a table: name, type, nullability, default and primary key.",
            json!({
                "type": "object",
                "properties": {
                    "table": {
                        "type": "string",
                        "description": "Table name"
                    }
                },
                "required": ["table"]
            }),
        ),
        ToolName::SearchDocuments => (
            "Search the document index for content similar to a text query or an embedding vector. \
                Returns documents with relevance scores, best match first.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search text"
                    },
                    "vector": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "Query embedding, used instead of 'query'"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "default": 5
                    }
                },
                "required": []
            }),
        ),
        ToolName::ListDocuments => (
            "List indexed documents with a short preview of their content.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of documents",
                        "default": 20
                    }
                },
                "required": []
            }),
        ),
        ToolName::GetDocument => (
            "Fetch the full content and metadata of a document by its id.",
            json!({
                "type": "object",
                "properties": {
                    "document_id": {
                        "type": "string",
                        "description": "Document id as returned by search_documents or list_documents"
                    }
                },
                "required": ["document_id"]
            }),
        ),
    };

    ToolDefinition {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}
