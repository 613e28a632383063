//! HTTP implementation of the query gateway
//!
//! Endpoints (all relative to the configured base URL):
//! - `POST /data?owner=&repo_name=`     → `{sql_result, sql, id}`
//! - `POST /prompt?owner=&repo_name=`   → `{text | detail, id}`
//! - `GET  /repo-info?owner=&repo_name=` → `RepoInfo`
//! - `POST /load-github-data`           → ack
//! - `POST /feedback?owner=&repo_name=` → `{pr_url?}`

use super::models::*;
use super::traits::QueryGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP gateway client.
///
/// Cheaply cloneable (shares the reqwest client internally).
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a client for `base_url` with a transport timeout per request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("repo-chat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn repo_query(repo: &RepoId) -> [(&'static str, &str); 2] {
        [("owner", repo.owner.as_str()), ("repo_name", repo.name.as_str())]
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl QueryGateway for HttpGateway {
    async fn tabular_query(
        &self,
        repo: &RepoId,
        prompt: &str,
    ) -> Result<TabularResult, GatewayError> {
        debug!(repo = %repo, prompt, "Gateway tabular query");
        let request = self
            .client
            .post(self.endpoint("data"))
            .query(&Self::repo_query(repo))
            .json(&PromptBody { prompt });

        let wire: WireTabular = self.send_json(request).await?;
        Ok(wire.into())
    }

    async fn text_query(&self, repo: &RepoId, prompt: &str) -> Result<TextResult, GatewayError> {
        debug!(repo = %repo, prompt, "Gateway text query");
        let request = self
            .client
            .post(self.endpoint("prompt"))
            .query(&Self::repo_query(repo))
            .json(&PromptBody { prompt });

        let wire: WireText = self.send_json(request).await?;
        wire.into_result()
            .ok_or_else(|| GatewayError::Decode("response has neither text nor detail".into()))
    }

    async fn repo_info(&self, repo: &RepoId) -> Result<RepoInfo, GatewayError> {
        let request = self
            .client
            .get(self.endpoint("repo-info"))
            .query(&Self::repo_query(repo));

        self.send_json(request).await
    }

    async fn trigger_import(
        &self,
        request: &ImportRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        debug!(owner = %request.owner, repo = %request.repo, "Triggering import");
        let request = self
            .client
            .post(self.endpoint("load-github-data"))
            .json(request);

        let response = self.send(request).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn submit_feedback(
        &self,
        repo: &RepoId,
        feedback: &FeedbackRequest,
    ) -> Result<FeedbackResponse, GatewayError> {
        debug!(repo = %repo, result_id = %feedback.result_id, "Submitting feedback");
        let request = self
            .client
            .post(self.endpoint("feedback"))
            .query(&Self::repo_query(repo))
            .json(feedback);

        let response = self.send(request).await?;
        let body = response.text().await?;
        // Some deployments acknowledge with an empty or plain-text body
        match serde_json::from_str::<FeedbackResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                debug!(
                    repo = %repo,
                    body = %body,
                    error = %e,
                    "Feedback response not decodable, treating as acknowledgement"
                );
                Ok(FeedbackResponse::default())
            }
        }
    }
}
