//! Bridges the broker's tool catalogue into chat-completion tool calls.

use crate::broker::{ToolBroker, ToolDefinition};
use crate::error::{BrokerError, Result};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde_json::{json, Value};

/// Convert one catalogue entry into an OpenAI function tool.
pub fn to_chat_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()),
            parameters: Some(def.input_schema.clone()),
            strict: None,
        },
    }
}

/// Tools the model may call through `broker`, respecting its scope.
pub fn tool_definitions(broker: &ToolBroker) -> Vec<ChatCompletionTool> {
    broker.tools().iter().map(to_chat_tool).collect()
}

/// Parse the raw argument string the model produced.
pub fn parse_arguments(arguments: &str) -> Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(arguments)
        .map_err(|e| BrokerError::Validation(format!("Invalid tool arguments: {}", e)))
}

/// Render a broker outcome as the text handed back to the model.
pub fn render_result(result: &Result<Value>) -> String {
    let value = match result {
        Ok(value) => value.clone(),
        Err(e) => json!({ "error": e.to_string(), "kind": e.kind() }),
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{definition, ToolName};

    #[test]
    fn test_chat_tool_carries_schema() {
        let tool = to_chat_tool(&definition(ToolName::ReadRecords));
        assert_eq!(tool.function.name, "read_records");
        let params = tool.function.parameters.unwrap();
        assert_eq!(params["required"], json!(["table"]));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"table":"users"}"#).unwrap()["table"], "users");
        assert!(matches!(
            parse_arguments("{not json"),
            Err(BrokerError::Validation(_))
        ));
    }

    #[test]
    fn test_render_error_includes_kind() {
        let rendered = render_result(&Err(BrokerError::UnknownOperation("delete_record".into())));
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["kind"], "unknown_operation");
        assert!(value["error"].as_str().unwrap().contains("delete_record"));
    }
}
