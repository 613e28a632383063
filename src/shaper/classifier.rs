//! Chart classification through an LLM
//!
//! Implements `ChartClassifier` using any OpenAI-compatible
//! `/v1/chat/completions` endpoint with a JSON response format.

use super::{ChartKind, ChartSpec};
use crate::error::ClassificationError;
use crate::gateway::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about a GitHub \
repository. Identify the correct chart type for the provided data and give the chart a short \
title. Reply with a JSON object {\"type\": \"bar\" | \"line\" | \"area\", \"title\": string}.";

/// Picks a chart kind and title for a set of rows.
///
/// Best-effort: callers fall back to [`ChartSpec::fallback`] on any error.
#[async_trait]
pub trait ChartClassifier: Send + Sync {
    async fn classify(&self, rows: &[Row]) -> Result<ChartSpec, ClassificationError>;
}

/// HTTP classifier using the OpenAI chat completions API format
#[derive(Clone)]
pub struct HttpChartClassifier {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_rows: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// What the model is asked to produce
#[derive(Debug, Deserialize)]
struct Classification {
    #[serde(rename = "type")]
    kind: ChartKind,
    #[serde(default)]
    title: String,
}

impl HttpChartClassifier {
    /// # Arguments
    ///
    /// * `url` - chat completions endpoint (e.g. `https://api.openai.com/v1/chat/completions`)
    /// * `model` - model name (e.g. `gpt-4o`)
    /// * `api_key` - optional bearer token
    /// * `max_rows` - optional cap on rows sent to the provider, `None` sends all
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        max_rows: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, ClassificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
            api_key,
            max_rows,
        })
    }

    fn build_request(&self, rows: &[Row]) -> Result<CompletionRequest<'_>, ClassificationError> {
        let sent = match self.max_rows {
            Some(max) => &rows[..rows.len().min(max)],
            None => rows,
        };
        let payload = serde_json::json!({ "rows": sent, "rowCount": rows.len() });
        let content = serde_json::to_string(&payload)
            .map_err(|e| ClassificationError::Decode(e.to_string()))?;

        Ok(CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        })
    }
}

#[async_trait]
impl ChartClassifier for HttpChartClassifier {
    async fn classify(&self, rows: &[Row]) -> Result<ChartSpec, ClassificationError> {
        let body = self.build_request(rows)?;
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Decode(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ClassificationError::Empty)?;

        let parsed: Classification = serde_json::from_str(&content)
            .map_err(|e| ClassificationError::Decode(format!("{}: {}", e, content)))?;
        debug!(chart_kind = %parsed.kind, title = %parsed.title, "Chart classified");

        Ok(ChartSpec {
            chart_kind: parsed.kind,
            title: parsed.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(i: usize) -> Row {
        json!({"day": i, "stars": i * 2}).as_object().unwrap().clone()
    }

    fn classifier(max_rows: Option<usize>) -> HttpChartClassifier {
        HttpChartClassifier::new(
            "http://localhost/v1/chat/completions",
            "gpt-4o",
            None,
            max_rows,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_request_sends_every_row_by_default() {
        let rows: Vec<Row> = (0..500).map(row).collect();
        let classifier = classifier(None);
        let request = classifier.build_request(&rows).unwrap();

        let user: serde_json::Value = serde_json::from_str(&request.messages[1].content).unwrap();
        let sent = user["rows"].as_array().unwrap();
        assert_eq!(sent.len(), 500);
        assert_eq!(sent[499]["day"], 499);
        assert_eq!(user["rowCount"], 500);
    }

    #[test]
    fn test_request_caps_rows_but_reports_full_count() {
        let classifier = classifier(Some(5));
        let rows: Vec<Row> = (0..20).map(row).collect();
        let request = classifier.build_request(&rows).unwrap();

        let user: serde_json::Value = serde_json::from_str(&request.messages[1].content).unwrap();
        assert_eq!(user["rows"].as_array().unwrap().len(), 5);
        assert_eq!(user["rowCount"], 20);
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.response_format.kind, "json_object");
    }
}
