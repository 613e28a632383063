//! Trait abstraction for the remote query gateway

use super::models::*;
use crate::error::GatewayError;
use async_trait::async_trait;

/// Every gateway operation the orchestrator consumes.
///
/// Implementations must be `Send + Sync` so they can be shared across tasks
/// as `Arc<dyn QueryGateway>`:
/// - [`HttpGateway`](super::HttpGateway): the real HTTP client
/// - [`MockGateway`](super::MockGateway): scripted in-memory gateway for tests
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Run a natural-language prompt and return rows + generated query.
    /// Rows may be empty.
    async fn tabular_query(&self, repo: &RepoId, prompt: &str)
        -> Result<TabularResult, GatewayError>;

    /// Run a natural-language prompt and return a free-text answer
    async fn text_query(&self, repo: &RepoId, prompt: &str) -> Result<TextResult, GatewayError>;

    /// Fetch the import status of a repository
    async fn repo_info(&self, repo: &RepoId) -> Result<RepoInfo, GatewayError>;

    /// (Re-)trigger an import. Re-triggering is allowed and idempotent.
    async fn trigger_import(
        &self,
        request: &ImportRequest,
    ) -> Result<serde_json::Value, GatewayError>;

    /// Submit feedback on a turn. Negative feedback may start a remediation
    /// job whose pull request URL is returned when available.
    async fn submit_feedback(
        &self,
        repo: &RepoId,
        feedback: &FeedbackRequest,
    ) -> Result<FeedbackResponse, GatewayError>;
}
