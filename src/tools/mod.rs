//! Tools exposed to the conversational runtime
//!
//! The runtime (an external LLM function-calling loop) selects a tool by
//! name; this module provides the definitions it advertises and the router
//! that executes a selected call.

pub mod definitions;
pub mod router;

pub use definitions::{all_tools, router_system_prompt, InputSchema, ToolDefinition};
pub use router::{ChartPayload, ChartToolResult, TextToolResult, ToolCallOutcome, ToolRouter};
