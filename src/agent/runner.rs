//! Agent runner with tool calling loop.

use super::tools::{parse_arguments, render_result, tool_definitions};
use crate::broker::{Scope, ToolBroker};
use crate::config::AgentSettings;
use crate::coordinator::{SubRequest, TaskHandler};
use crate::error::{BrokerError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

const RELATIONAL_PROMPT: &str = r#"You are a database assistant with tools for a relational database.

Guidelines:
- Use 'list_tables' and 'describe_table' before writing to a table you have not seen
- Use 'read_records' for simple lookups and 'execute_query' for aggregates or joins
- 'update_record' always needs filters that identify the rows to change
- Records cannot be deleted

Report what you did and the relevant values in your final response."#;

const VECTOR_PROMPT: &str = r#"You are a research assistant with tools for a document knowledge base.

Guidelines:
- Use 'search_documents' to find passages relevant to the question
- Use 'get_document' when a search hit needs its full content
- Use 'list_documents' if you need to know what content is available

Answer from the documents you retrieved and cite their sources."#;

const GENERAL_PROMPT: &str = r#"You are an assistant with tools for a relational database and a document knowledge base.

Use the database tools for structured records and the document tools for policies, manuals and other text.
Records cannot be deleted. Cite document sources when you use them."#;

fn system_prompt(scope: Scope) -> &'static str {
    match scope {
        Scope::Relational => RELATIONAL_PROMPT,
        Scope::Vector => VECTOR_PROMPT,
        Scope::All => GENERAL_PROMPT,
    }
}

/// LLM agent whose only side effects go through a [`ToolBroker`].
pub struct Agent {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    broker: ToolBroker,
    max_iterations: usize,
    system_prompt: String,
}

impl Agent {
    /// Create an agent over `broker`, limited to the broker's scope.
    pub fn new(broker: ToolBroker, settings: &AgentSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_secs))?,
            model: settings.model.clone(),
            system_prompt: system_prompt(broker.scope()).to_string(),
            broker,
            max_iterations: settings.max_iterations,
        })
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run the agent on a task.
    pub async fn run(&self, task: &str) -> Result<AgentResponse> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| BrokerError::Agent(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(task.to_string())
                .build()
                .map_err(|e| BrokerError::Agent(e.to_string()))?
                .into(),
        ];

        let tools = tool_definitions(&self.broker);
        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(BrokerError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages.clone())
                .tools(tools.clone())
                .build()
                .map_err(|e| BrokerError::Agent(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| BrokerError::OpenAI(format!("Agent API error: {}", e)))?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| BrokerError::Agent("No response from model".to_string()))?;

            let tool_calls = match &choice.message.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => {
                    return Ok(AgentResponse {
                        content: choice.message.content.clone().unwrap_or_default(),
                        tool_calls: tool_calls_made,
                        iterations,
                    })
                }
            };

            let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(tool_calls.clone())
                .build()
                .map_err(|e| BrokerError::Agent(e.to_string()))?;
            messages.push(assistant_msg.into());

            for tool_call in tool_calls {
                let record = self.execute_tool_call(tool_call).await;

                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&tool_call.id)
                    .content(record.result.clone())
                    .build()
                    .map_err(|e| BrokerError::Agent(e.to_string()))?;
                messages.push(tool_msg.into());

                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call through the broker.
    async fn execute_tool_call(&self, tool_call: &ChatCompletionMessageToolCall) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        let outcome = match parse_arguments(arguments) {
            Ok(args) => self.broker.invoke(name, Some(&args)).await,
            Err(e) => Err(e),
        };

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            succeeded: outcome.is_ok(),
            result: render_result(&outcome),
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    /// JSON arguments as sent by the model.
    pub arguments: String,
    pub succeeded: bool,
    /// JSON payload or error returned to the model.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Runs each coordinator sub-request with a fresh agent restricted to that
/// sub-request's domain.
pub struct AgentHandler {
    broker: ToolBroker,
    settings: AgentSettings,
}

impl AgentHandler {
    pub fn new(broker: ToolBroker, settings: AgentSettings) -> Self {
        Self { broker, settings }
    }
}

#[async_trait]
impl TaskHandler for AgentHandler {
    async fn handle(&self, request: &SubRequest) -> Result<String> {
        let broker = self.broker.clone().with_scope(request.domain.into());
        let agent = Agent::new(broker, &self.settings)?;
        let response = agent.run(&request.task).await?;

        info!(
            "{} agent finished after {} iteration(s), {} tool call(s)",
            request.domain,
            response.iterations,
            response.tool_calls.len()
        );
        Ok(response.content)
    }
}
