//! LLM agents that act only through the tool broker.
//!
//! Each agent sees the catalogue of the broker it was given, so an agent built
//! for one domain cannot call the other domain's tools.

mod runner;
mod tools;

pub use runner::{Agent, AgentHandler, AgentResponse, ToolCallRecord};
pub use tools::{parse_arguments, render_result, to_chat_tool, tool_definitions};
