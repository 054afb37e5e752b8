//! HTTP API server for integration with other systems.
//!
//! Exposes the same allow-list as the MCP server: tool listing, tool
//! invocation, and task routing.

use crate::broker::ToolBroker;
use crate::cli::Output;
use crate::config::Settings;
use crate::coordinator::Classifier;
use crate::error::BrokerError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state.
struct AppState {
    broker: ToolBroker,
    classifier: Classifier,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: &Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        broker: ToolBroker::from_settings(settings)?,
        classifier: Classifier::new(&settings.coordinator),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    Output::header("Tollgate API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("List tools", "GET  /tools");
    Output::kv("Call tool", "POST /tools/{name}");
    Output::kv("Route task", "POST /route");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool))
        .route("/route", post(route_task))
        .layer(cors)
        .with_state(state)
}

#[derive(Deserialize)]
struct RouteRequest {
    task: String,
}

/// HTTP status for a broker error kind.
fn status_for(err: &BrokerError) -> StatusCode {
    match err.kind() {
        "unknown_operation" | "not_found" => StatusCode::NOT_FOUND,
        "validation_error" => StatusCode::BAD_REQUEST,
        "forbidden_operation" => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &BrokerError) -> Response {
    (
        status_for(err),
        Json(json!({ "error": err.to_string(), "kind": err.kind() })),
    )
        .into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "tools": state.broker.tools().len() }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "tools": state.broker.tools() }))
}

async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let arguments: Option<Value> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return error_response(&BrokerError::Validation(format!(
                    "request body is not valid JSON: {}",
                    e
                )))
            }
        }
    };

    match state.broker.invoke(&name, arguments.as_ref()).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn route_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    Json(state.classifier.plan(&req.task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::tests::fixture;
    use crate::config::CoordinatorSettings;

    async fn state() -> Arc<AppState> {
        Arc::new(AppState {
            broker: fixture().await,
            classifier: Classifier::new(&CoordinatorSettings::default()),
        })
    }

    async fn post(name: &str, body: &str) -> Response {
        call_tool(
            State(state().await),
            Path(name.to_string()),
            Bytes::from(body.to_string()),
        )
        .await
    }

    #[tokio::test]
    async fn test_status_codes_follow_error_kind() {
        assert_eq!(post("read_records", r#"{"table":"users"}"#).await.status(), StatusCode::OK);
        assert_eq!(post("list_tables", "").await.status(), StatusCode::OK);
        assert_eq!(post("delete_record", "{}").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            post("execute_query", r#"{"query":"DELETE FROM users"}"#).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            post("update_record", r#"{"table":"users","filters":{},"data":{"age":1}}"#)
                .await
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(post("read_records", "{oops").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            post("get_document", r#"{"document_id":"missing"}"#).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_backend_errors_are_server_errors() {
        assert_eq!(
            status_for(&BrokerError::Backend("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
