//! Scripted in-memory gateway for tests
//!
//! Each operation has a canned answer set through a builder method and a call
//! counter, so tests can assert both what the orchestrator returned and how
//! many remote calls it made.

use super::models::*;
use super::traits::QueryGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted outcome of a `repo_info` call
#[derive(Debug, Clone)]
enum InfoStep {
    Info(RepoInfo),
    Fail(u16),
}

/// In-memory gateway with scripted answers.
///
/// `repo_info` answers are consumed in order; the last step repeats forever.
///
/// # Example
///
/// ```rust
/// use repo_chat::gateway::mock::success_info;
/// use repo_chat::gateway::{MockGateway, QueryGateway, RepoId};
///
/// # tokio_test::block_on(async {
/// let gateway = MockGateway::new().then_running(1).then_info(success_info());
/// let repo = RepoId::new("openai", "whisper");
///
/// assert!(!gateway.repo_info(&repo).await.unwrap().has_concluded());
/// assert!(gateway.repo_info(&repo).await.unwrap().is_fully_loaded());
/// assert_eq!(gateway.info_calls(), 2);
/// # });
/// ```
pub struct MockGateway {
    rows: Mutex<Vec<Row>>,
    generated_query: Mutex<String>,
    answer: Mutex<String>,
    result_id: Mutex<String>,
    query_failure: Mutex<Option<u16>>,
    info_script: Mutex<VecDeque<InfoStep>>,
    feedback_response: Mutex<Result<FeedbackResponse, u16>>,
    feedback_gate: Mutex<Option<Arc<Notify>>>,
    feedback_log: Mutex<Vec<(RepoId, FeedbackRequest)>>,
    import_log: Mutex<Vec<ImportRequest>>,
    tabular_calls: AtomicUsize,
    text_calls: AtomicUsize,
    info_calls: AtomicUsize,
    feedback_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            generated_query: Mutex::new("SELECT 1".to_string()),
            answer: Mutex::new(String::new()),
            result_id: Mutex::new("result-1".to_string()),
            query_failure: Mutex::new(None),
            info_script: Mutex::new(VecDeque::new()),
            feedback_response: Mutex::new(Ok(FeedbackResponse::default())),
            feedback_gate: Mutex::new(None),
            feedback_log: Mutex::new(Vec::new()),
            import_log: Mutex::new(Vec::new()),
            tabular_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
            feedback_calls: AtomicUsize::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    pub fn with_generated_query(self, query: &str) -> Self {
        *self.generated_query.lock().unwrap() = query.to_string();
        self
    }

    pub fn with_answer(self, answer: &str) -> Self {
        *self.answer.lock().unwrap() = answer.to_string();
        self
    }

    pub fn with_result_id(self, id: &str) -> Self {
        *self.result_id.lock().unwrap() = id.to_string();
        self
    }

    /// Make tabular and text queries fail with the given HTTP status
    pub fn failing_queries(self, status: u16) -> Self {
        *self.query_failure.lock().unwrap() = Some(status);
        self
    }

    /// Append a `repo_info` answer to the script
    pub fn then_info(self, info: RepoInfo) -> Self {
        self.info_script.lock().unwrap().push_back(InfoStep::Info(info));
        self
    }

    /// Append `count` RUNNING answers to the script
    pub fn then_running(self, count: usize) -> Self {
        {
            let mut script = self.info_script.lock().unwrap();
            for _ in 0..count {
                script.push_back(InfoStep::Info(running_info()));
            }
        }
        self
    }

    /// Append a failing `repo_info` answer to the script
    pub fn then_info_error(self, status: u16) -> Self {
        self.info_script.lock().unwrap().push_back(InfoStep::Fail(status));
        self
    }

    pub fn with_feedback_response(self, response: FeedbackResponse) -> Self {
        *self.feedback_response.lock().unwrap() = Ok(response);
        self
    }

    pub fn failing_feedback(self, status: u16) -> Self {
        *self.feedback_response.lock().unwrap() = Err(status);
        self
    }

    /// Hold every feedback call until the returned `Notify` is signalled
    pub fn gate_feedback(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.feedback_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn tabular_calls(&self) -> usize {
        self.tabular_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn feedback_calls(&self) -> usize {
        self.feedback_calls.load(Ordering::SeqCst)
    }

    pub fn submitted_feedback(&self) -> Vec<(RepoId, FeedbackRequest)> {
        self.feedback_log.lock().unwrap().clone()
    }

    pub fn import_requests(&self) -> Vec<ImportRequest> {
        self.import_log.lock().unwrap().clone()
    }

    fn query_failure(&self) -> Option<GatewayError> {
        self.query_failure
            .lock()
            .unwrap()
            .map(|status| GatewayError::Status {
                status,
                body: "mock failure".to_string(),
            })
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// RepoInfo for an import still in progress
pub fn running_info() -> RepoInfo {
    RepoInfo {
        pipeline_status: Some(PipelineStatus::Running),
        last_pipeline_run: None,
        loaded_issues: false,
        loaded_stars: false,
        loaded_pull_requests: false,
        loaded_commits: false,
    }
}

/// RepoInfo for a completed, fully loaded import
pub fn success_info() -> RepoInfo {
    RepoInfo {
        pipeline_status: Some(PipelineStatus::Success),
        last_pipeline_run: Some(chrono::Utc::now()),
        loaded_issues: true,
        loaded_stars: true,
        loaded_pull_requests: true,
        loaded_commits: true,
    }
}

#[async_trait]
impl QueryGateway for MockGateway {
    async fn tabular_query(
        &self,
        _repo: &RepoId,
        _prompt: &str,
    ) -> Result<TabularResult, GatewayError> {
        self.tabular_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.query_failure() {
            return Err(err);
        }
        Ok(TabularResult {
            rows: self.rows.lock().unwrap().clone(),
            generated_query: self.generated_query.lock().unwrap().clone(),
            result_id: self.result_id.lock().unwrap().clone(),
        })
    }

    async fn text_query(&self, _repo: &RepoId, _prompt: &str) -> Result<TextResult, GatewayError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.query_failure() {
            return Err(err);
        }
        Ok(TextResult {
            answer: self.answer.lock().unwrap().clone(),
            result_id: self.result_id.lock().unwrap().clone(),
        })
    }

    async fn repo_info(&self, _repo: &RepoId) -> Result<RepoInfo, GatewayError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.info_script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        match step {
            Some(InfoStep::Info(info)) => Ok(info),
            Some(InfoStep::Fail(status)) => Err(GatewayError::Status {
                status,
                body: "mock failure".to_string(),
            }),
            None => Err(GatewayError::Status {
                status: 404,
                body: "repository not found".to_string(),
            }),
        }
    }

    async fn trigger_import(
        &self,
        request: &ImportRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        self.import_log.lock().unwrap().push(request.clone());
        Ok(serde_json::json!({"status": "accepted"}))
    }

    async fn submit_feedback(
        &self,
        repo: &RepoId,
        feedback: &FeedbackRequest,
    ) -> Result<FeedbackResponse, GatewayError> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        self.feedback_log
            .lock()
            .unwrap()
            .push((repo.clone(), feedback.clone()));

        let gate = self.feedback_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.feedback_response
            .lock()
            .unwrap()
            .clone()
            .map_err(|status| GatewayError::Status {
                status,
                body: "mock failure".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_info_script_repeats_last_step() {
        let gateway = MockGateway::new().then_running(1).then_info(success_info());
        let repo = RepoId::new("o", "r");

        assert!(!gateway.repo_info(&repo).await.unwrap().has_concluded());
        assert!(gateway.repo_info(&repo).await.unwrap().has_concluded());
        assert!(gateway.repo_info(&repo).await.unwrap().has_concluded());
        assert_eq!(gateway.info_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_not_found() {
        let gateway = MockGateway::new();
        let err = gateway.repo_info(&RepoId::new("o", "r")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_failing_queries() {
        let gateway = MockGateway::new().failing_queries(503);
        let repo = RepoId::new("o", "r");
        assert!(gateway.tabular_query(&repo, "q").await.is_err());
        assert!(gateway.text_query(&repo, "q").await.is_err());
        assert_eq!(gateway.tabular_calls(), 1);
        assert_eq!(gateway.text_calls(), 1);
    }
}
