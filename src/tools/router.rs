//! Tool router
//!
//! Dispatches "chart" and "text" tool calls to the gateway and shapes the
//! results. The router never retries; retry policy belongs to the
//! conversational runtime.

use super::definitions::{router_system_prompt, CHART_TOOL, TEXT_TOOL};
use crate::error::ToolError;
use crate::gateway::{QueryGateway, RepoId, Row};
use crate::shaper::{ChartClassifier, ChartKind, ChartSpec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CHART_HINT: &str = "The chart is being displayed to the user.";
const NO_DATA_HINT: &str = "The query returned no data. Tell the user nothing matched.";

/// Result of the "chart" tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartToolResult {
    /// Terminal: the query matched no rows, nothing to draw
    NoData {
        result_id: String,
        generated_query: String,
        hint: String,
    },
    Chart(ChartPayload),
}

/// A drawable chart with the full, unsampled row set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub chart_kind: ChartKind,
    pub title: String,
    pub result_id: String,
    pub rows: Vec<Row>,
    pub generated_query: String,
    pub hint: String,
}

impl ChartToolResult {
    pub fn result_id(&self) -> &str {
        match self {
            ChartToolResult::NoData { result_id, .. } => result_id,
            ChartToolResult::Chart(payload) => &payload.result_id,
        }
    }
}

/// Result of the "text" tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToolResult {
    pub answer: String,
    pub result_id: String,
}

/// What the host hands back to the runtime for one tool call.
///
/// Errors are folded into the value so they stay local to the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub tool_name: String,
    pub value: Value,
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

/// Handles tool calls for one repository
pub struct ToolRouter {
    gateway: Arc<dyn QueryGateway>,
    classifier: Arc<dyn ChartClassifier>,
    repo: RepoId,
}

impl ToolRouter {
    pub fn new(
        gateway: Arc<dyn QueryGateway>,
        classifier: Arc<dyn ChartClassifier>,
        repo: RepoId,
    ) -> Self {
        Self {
            gateway,
            classifier,
            repo,
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// System prompt naming this router's repository as `owner/name`
    pub fn system_prompt(&self) -> String {
        router_system_prompt(&self.repo)
    }

    /// Handle a tool call and return the result as JSON
    pub async fn handle(&self, name: &str, args: Option<Value>) -> Result<Value, ToolError> {
        let args = args.unwrap_or(json!({}));

        match name {
            CHART_TOOL => {
                let query = parse_query(name, args)?;
                Ok(serde_json::to_value(self.chart(&query).await?)?)
            }
            TEXT_TOOL => {
                let query = parse_query(name, args)?;
                Ok(serde_json::to_value(self.text(&query).await?)?)
            }
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Like [`handle`](Self::handle), but never fails: errors become a
    /// failed tool result for the runtime to surface.
    pub async fn call(&self, name: &str, args: Option<Value>) -> ToolCallOutcome {
        match self.handle(name, args).await {
            Ok(value) => ToolCallOutcome {
                tool_name: name.to_string(),
                value,
                is_error: false,
            },
            Err(e) => {
                warn!(tool = name, repo = %self.repo, error = %e, "Tool call failed");
                ToolCallOutcome {
                    tool_name: name.to_string(),
                    value: json!({ "error": e.to_string() }),
                    is_error: true,
                }
            }
        }
    }

    /// Query the gateway for rows and classify them for charting.
    ///
    /// Classification runs on the full row set and is best-effort: on
    /// failure the chart falls back to a bar chart titled after the query.
    pub async fn chart(&self, query: &str) -> Result<ChartToolResult, ToolError> {
        let result = self.gateway.tabular_query(&self.repo, query).await?;

        if result.rows.is_empty() {
            info!(repo = %self.repo, result_id = %result.result_id, "Chart query returned no rows");
            return Ok(ChartToolResult::NoData {
                result_id: result.result_id,
                generated_query: result.generated_query,
                hint: NO_DATA_HINT.to_string(),
            });
        }

        let spec = match self.classifier.classify(&result.rows).await {
            Ok(spec) => spec,
            Err(e) => {
                warn!(repo = %self.repo, error = %e, "Chart classification failed, using default");
                ChartSpec::fallback(query)
            }
        };
        let title = if spec.title.trim().is_empty() {
            query.trim().to_string()
        } else {
            spec.title
        };

        debug!(
            repo = %self.repo,
            rows = result.rows.len(),
            chart_kind = %spec.chart_kind,
            "Chart tool result ready"
        );

        Ok(ChartToolResult::Chart(ChartPayload {
            chart_kind: spec.chart_kind,
            title,
            result_id: result.result_id,
            rows: result.rows,
            generated_query: result.generated_query,
            hint: CHART_HINT.to_string(),
        }))
    }

    /// Query the gateway for a free-text answer
    pub async fn text(&self, query: &str) -> Result<TextToolResult, ToolError> {
        let result = self.gateway.text_query(&self.repo, query).await?;
        Ok(TextToolResult {
            answer: result.answer,
            result_id: result.result_id,
        })
    }
}

fn parse_query(tool: &str, args: Value) -> Result<String, ToolError> {
    let args: QueryArgs =
        serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        })?;
    if args.query.trim().is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: "query must not be empty".to_string(),
        });
    }
    Ok(args.query)
}
