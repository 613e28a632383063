//! Tool definitions
//!
//! Defines the two tools exposed to the conversational runtime.

use crate::gateway::RepoId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CHART_TOOL: &str = "chart";
pub const TEXT_TOOL: &str = "text";

/// JSON schema of a tool's input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// A tool the LLM runtime may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    /// The same definition in OpenAI function-calling format
    pub fn to_function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

fn query_schema() -> InputSchema {
    InputSchema {
        schema_type: "object".to_string(),
        properties: Some(json!({
            "query": {"type": "string", "description": "The query to provide the agent."}
        })),
        required: Some(vec!["query".to_string()]),
    }
}

/// Generate all tool definitions
pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CHART_TOOL.to_string(),
            description: "Query the GitHub metadata with the provided natural language query, \
                          and return the data as a table, which will be automatically displayed \
                          to the user in the form of a chart or table."
                .to_string(),
            input_schema: query_schema(),
        },
        ToolDefinition {
            name: TEXT_TOOL.to_string(),
            description: "Query GitHub metadata with the provided natural language query, and \
                          return a natural language answer."
                .to_string(),
            input_schema: query_schema(),
        },
    ]
}

/// System prompt steering the runtime between the two tools
pub fn router_system_prompt(repo: &RepoId) -> String {
    format!(
        "You are a helpful assistant that answers questions about the following GitHub repository:\n\n\
         Selected Repository: {repo}\n\n\
         You can use natural language queries to answer questions the user has about the repository.\n\n\
         If a question is best answered by displaying a graph/chart, use the \"{CHART_TOOL}\" tool.\n\
         If a question is about a single data point (e.g. \"who made the most recent commit?\"), use the \"{TEXT_TOOL}\" tool.\n\n\
         When printing a chart, ONLY call the provided function call. This will print the chart to the user. Do not use images."
    )
}
