//! Feedback relay
//!
//! Submits thumbs up / thumbs down feedback to the gateway and tracks the
//! remediation job (a pull request) that negative feedback may start.
//!
//! The remediation state is an observable cell: `Pending` is published
//! before the network call is issued and replaced by `Done` once every
//! negative submission in flight has settled, whether it succeeded, failed,
//! or was dropped mid-flight.

use crate::conversation::Turn;
use crate::gateway::{FeedbackRequest, QueryGateway, RepoId, Sentiment, NO_RESULT_ID};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Feedback on one conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Id of the tool result the turn produced, `None` if there was none
    pub result_id: Option<String>,
    pub sentiment: Sentiment,
    pub message: String,
}

/// Correlation id sent with feedback on `turn`
pub fn result_id_for_turn(turn: &Turn) -> String {
    turn.result_id()
}

impl FeedbackEvent {
    /// Feedback on a finished conversation turn
    pub fn for_turn(turn: &Turn, sentiment: Sentiment, message: impl Into<String>) -> Self {
        let result_id = result_id_for_turn(turn);
        Self {
            result_id: (result_id != NO_RESULT_ID).then_some(result_id),
            sentiment,
            message: message.into(),
        }
    }

    fn into_request(self) -> FeedbackRequest {
        FeedbackRequest {
            result_id: self
                .result_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| NO_RESULT_ID.to_string()),
            sentiment: self.sentiment,
            message: self.message,
        }
    }
}

/// Progress of the remediation job started by negative feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemediationState {
    /// No negative feedback submitted yet
    Idle,
    Pending,
    Done { pr_url: Option<String> },
}

impl RemediationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RemediationState::Pending)
    }
}

/// What `submit` reports back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub pr_url: Option<String>,
}

#[derive(Debug, Default)]
struct InFlight {
    count: usize,
    /// Latest pull request link reported while submissions overlapped
    pr_url: Option<String>,
}

/// Remediation cell shared by a relay and its pending submissions
struct RemediationCell {
    state: watch::Sender<RemediationState>,
    in_flight: Mutex<InFlight>,
}

impl RemediationCell {
    fn new() -> Self {
        let (state, _) = watch::channel(RemediationState::Idle);
        Self {
            state,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    fn begin(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.count += 1;
        self.state.send_replace(RemediationState::Pending);
    }

    /// `Done` is published only when the last submission in flight settles
    fn finish(&self, pr_url: Option<String>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.count = in_flight.count.saturating_sub(1);
        if pr_url.is_some() {
            in_flight.pr_url = pr_url;
        }
        if in_flight.count == 0 {
            let pr_url = in_flight.pr_url.take();
            self.state.send_replace(RemediationState::Done { pr_url });
        }
    }
}

/// Settles one submission, as `pr_url: None` unless settled explicitly
struct PendingGuard {
    cell: Arc<RemediationCell>,
    settled: bool,
}

impl PendingGuard {
    fn settle(mut self, pr_url: Option<String>) {
        self.settled = true;
        self.cell.finish(pr_url);
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.cell.finish(None);
        }
    }
}

/// Relays feedback for one repository
pub struct FeedbackRelay {
    gateway: Arc<dyn QueryGateway>,
    repo: RepoId,
    cell: Arc<RemediationCell>,
}

impl FeedbackRelay {
    pub fn new(gateway: Arc<dyn QueryGateway>, repo: RepoId) -> Self {
        Self {
            gateway,
            repo,
            cell: Arc::new(RemediationCell::new()),
        }
    }

    /// Observe remediation state changes
    pub fn subscribe(&self) -> watch::Receiver<RemediationState> {
        self.cell.state.subscribe()
    }

    pub fn state(&self) -> RemediationState {
        self.cell.state.borrow().clone()
    }

    /// Publish `Pending` for negative feedback. Runs synchronously, before
    /// any network call is issued.
    fn begin(&self, sentiment: Sentiment) -> Option<PendingGuard> {
        (sentiment == Sentiment::Negative).then(|| {
            self.cell.begin();
            PendingGuard {
                cell: self.cell.clone(),
                settled: false,
            }
        })
    }

    /// Submit feedback and wait for the gateway to settle.
    ///
    /// Never fails: submission errors are logged and reported as an outcome
    /// without a pull request link.
    pub async fn submit(&self, event: FeedbackEvent) -> FeedbackOutcome {
        let guard = self.begin(event.sentiment);
        send(self.gateway.as_ref(), &self.repo, event.into_request(), guard).await
    }

    /// Fire-and-forget variant of [`submit`](Self::submit).
    ///
    /// `Pending` is already published when this returns.
    pub fn submit_detached(&self, event: FeedbackEvent) -> JoinHandle<FeedbackOutcome> {
        let guard = self.begin(event.sentiment);
        let gateway = self.gateway.clone();
        let repo = self.repo.clone();
        tokio::spawn(async move { send(gateway.as_ref(), &repo, event.into_request(), guard).await })
    }
}

async fn send(
    gateway: &dyn QueryGateway,
    repo: &RepoId,
    request: FeedbackRequest,
    guard: Option<PendingGuard>,
) -> FeedbackOutcome {
    let pr_url = match gateway.submit_feedback(repo, &request).await {
        Ok(response) => {
            info!(
                repo = %repo,
                result_id = %request.result_id,
                sentiment = ?request.sentiment,
                pr_url = ?response.pr_url,
                "Feedback submitted"
            );
            response.pr_url
        }
        Err(e) => {
            warn!(repo = %repo, result_id = %request.result_id, error = %e, "Feedback submission failed");
            None
        }
    };

    if let Some(guard) = guard {
        guard.settle(pr_url.clone());
    }
    FeedbackOutcome { pr_url }
}
