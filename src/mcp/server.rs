//! MCP server implementation.

use super::protocol::*;
use crate::broker::ToolBroker;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "tollgate";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP server exposing the broker's tools over stdio.
pub struct McpServer {
    broker: ToolBroker,
}

impl McpServer {
    pub fn new(broker: ToolBroker) -> Self {
        Self { broker }
    }

    /// Run the MCP server (reads from stdin, writes to stdout).
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "MCP server starting with {} tool(s), scope {}",
            self.broker.tools().len(),
            self.broker.scope()
        );
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.serve(stdin.lock(), stdout.lock()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader` until EOF.
    pub async fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> anyhow::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"))
                }
            };

            if let Some(response) = response {
                writeln!(writer, "{}", serde_json::to_string(&response)?)?;
                writer.flush()?;
            }
        }

        info!("MCP client closed the connection");
        Ok(())
    }

    /// Handle a single JSON-RPC message. Notifications yield `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("MCP method {}", request.method);
        if request.is_notification() {
            if !request.method.starts_with("notifications/") && request.method != "initialized" {
                warn!("Ignoring notification for method {}", request.method);
            }
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        if let Some(params) = params.and_then(|p| serde_json::from_value::<InitializeParams>(p).ok()) {
            let client = params
                .client_info
                .map(|c| format!("{} {}", c.name, c.version.unwrap_or_default()))
                .unwrap_or_else(|| "unknown client".to_string());
            info!(
                "MCP client connected: {} (protocol {})",
                client,
                params.protocol_version.as_deref().unwrap_or("unspecified")
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        to_response(id, &result)
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.broker.tools(),
        };
        to_response(id, &result)
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, INVALID_PARAMS, &format!("Invalid params: {}", e))
                }
            },
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        let result = match self.broker.invoke(&params.name, params.arguments.as_ref()).await {
            Ok(payload) => ToolCallResult::json(&payload),
            Err(e) => ToolCallResult::error(&e),
        };

        to_response(id, &result)
    }
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::tests::fixture;
    use crate::broker::Scope;

    async fn exchange(server: &McpServer, lines: &[Value]) -> Vec<Value> {
        let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    fn payload(response: &Value) -> Value {
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_handshake_and_tool_listing() {
        let server = McpServer::new(fixture().await);
        let responses = exchange(
            &server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "test", "version": "0"}
                }}),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
                json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
            ],
        )
        .await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "tollgate");
        let tools = responses[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 9);
        assert!(tools.iter().all(|t| t.get("inputSchema").is_some()));
        assert!(tools.iter().all(|t| !t["name"].as_str().unwrap().contains("delete")));
        assert_eq!(responses[2]["id"], 3);
    }

    #[tokio::test]
    async fn test_tool_errors_carry_kind() {
        let server = McpServer::new(fixture().await);
        let responses = exchange(
            &server,
            &[
                call(1, "delete_record", json!({"table": "users", "filters": {"id": 1}})),
                call(2, "execute_query", json!({"query": "DROP TABLE users"})),
                call(3, "read_records", json!({"table": "users"})),
            ],
        )
        .await;

        assert_eq!(responses[0]["result"]["isError"], true);
        assert_eq!(payload(&responses[0])["kind"], "unknown_operation");
        assert_eq!(payload(&responses[1])["kind"], "forbidden_operation");
        assert!(responses[2]["result"].get("isError").is_none());
        assert_eq!(payload(&responses[2])["count"], 2);
    }

    #[tokio::test]
    async fn test_scoped_server_lists_only_its_domain() {
        let server = McpServer::new(fixture().await.with_scope(Scope::Relational));
        let responses = exchange(
            &server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
                call(2, "search_documents", json!({"query": "vacation"})),
            ],
        )
        .await;

        assert_eq!(responses[0]["result"]["tools"].as_array().unwrap().len(), 6);
        assert_eq!(payload(&responses[1])["kind"], "unknown_operation");
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = McpServer::new(fixture().await);
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"resources/list\"}\n{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"tools/call\"}\n";
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(responses[2]["error"]["code"], INVALID_PARAMS);
    }
}
