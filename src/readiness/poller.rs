//! Import readiness poller
//!
//! `Polling → {Ready, TimedOut, Errored, Cancelled}`. Every fetch and every
//! sleep races the cancellation token and the budget deadline, so no fetch
//! or timer outlives teardown.

use crate::error::{GatewayError, ReadinessError};
use crate::gateway::{QueryGateway, RepoId, RepoInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing of one readiness wait window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wall-clock budget of one wait window
    pub budget: Duration,
    /// Delay between two status fetches
    pub interval: Duration,
    /// The window ends this much before the budget is exhausted
    pub margin: Duration,
}

impl PollerConfig {
    /// Time after which a window gives up
    pub fn deadline(&self) -> Duration {
        self.budget.saturating_sub(self.margin)
    }

    /// A window must leave time to poll and ticks must be spaced
    pub fn validate(&self) -> Result<(), String> {
        if self.budget <= self.margin {
            return Err(format!(
                "readiness budget ({:?}) must exceed the margin ({:?})",
                self.budget, self.margin
            ));
        }
        if self.interval.is_zero() {
            return Err("readiness interval must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(60),
            interval: Duration::from_secs(1),
            margin: Duration::from_secs(5),
        }
    }
}

/// Terminal state of one wait window
#[derive(Debug)]
pub enum PollOutcome {
    /// An import attempt has concluded (this includes FAILED runs)
    Ready(RepoInfo),
    TimedOut { elapsed: Duration, fetches: u32 },
    Errored(GatewayError),
    Cancelled,
}

pub struct ReadinessPoller {
    gateway: Arc<dyn QueryGateway>,
    config: PollerConfig,
}

impl ReadinessPoller {
    pub fn new(gateway: Arc<dyn QueryGateway>, config: PollerConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run one wait window
    pub async fn poll(&self, repo: &RepoId, cancel: &CancellationToken) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.config.deadline();
        let mut fetches: u32 = 0;

        debug!(repo = %repo, budget = ?self.config.budget, "Readiness poll started");

        loop {
            // The first fetch of a window is never pre-empted by the deadline
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(repo),
                _ = tokio::time::sleep_until(deadline), if fetches > 0 => {
                    return self.timed_out(repo, started, fetches)
                }
                res = self.gateway.repo_info(repo) => res,
            };
            fetches += 1;

            match fetched {
                Err(e) => {
                    warn!(repo = %repo, error = %e, "Readiness fetch failed");
                    return PollOutcome::Errored(e);
                }
                Ok(info) if info.has_concluded() => {
                    info!(repo = %repo, fetches, status = ?info.pipeline_status, "Repository ready");
                    return PollOutcome::Ready(info);
                }
                Ok(info) => {
                    debug!(repo = %repo, fetches, status = ?info.pipeline_status, "Import still running");
                }
            }

            if Instant::now() >= deadline {
                return self.timed_out(repo, started, fetches);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(repo),
                _ = tokio::time::sleep_until(deadline) => return self.timed_out(repo, started, fetches),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// Wait until the repository is ready, re-issuing the wait after each
    /// timed-out window.
    ///
    /// `max_attempts = None` keeps retrying until ready, errored, or
    /// cancelled.
    pub async fn wait_until_ready(
        &self,
        repo: &RepoId,
        cancel: &CancellationToken,
        max_attempts: Option<u32>,
    ) -> Result<RepoInfo, ReadinessError> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.poll(repo, cancel).await {
                PollOutcome::Ready(info) => return Ok(info),
                PollOutcome::Errored(e) => return Err(ReadinessError::Fetch(e)),
                PollOutcome::Cancelled => return Err(ReadinessError::Cancelled),
                PollOutcome::TimedOut { .. } => {
                    if max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(ReadinessError::TimedOut { attempts });
                    }
                    info!(repo = %repo, attempts, "Import still running, restarting wait");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                        _ = tokio::time::sleep(self.config.interval) => {}
                    }
                }
            }
        }
    }

    fn cancelled(&self, repo: &RepoId) -> PollOutcome {
        debug!(repo = %repo, "Readiness poll cancelled");
        PollOutcome::Cancelled
    }

    fn timed_out(&self, repo: &RepoId, started: Instant, fetches: u32) -> PollOutcome {
        let elapsed = started.elapsed();
        info!(repo = %repo, ?elapsed, fetches, "Readiness poll timed out");
        PollOutcome::TimedOut { elapsed, fetches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{running_info, success_info};
    use crate::gateway::{MockGateway, PipelineStatus};

    fn repo() -> RepoId {
        RepoId::new("langchain-ai", "langchain")
    }

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.budget, Duration::from_secs(60));
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.deadline(), Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_k_running_ticks() {
        let gateway = Arc::new(MockGateway::new().then_running(4).then_info(success_info()));
        let poller = ReadinessPoller::new(gateway.clone(), PollerConfig::default());

        let outcome = poller.poll(&repo(), &CancellationToken::new()).await;
        assert!(matches!(outcome, PollOutcome::Ready(_)));
        assert_eq!(gateway.info_calls(), 5);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(gateway.info_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_import_counts_as_ready() {
        let mut failed = running_info();
        failed.pipeline_status = Some(PipelineStatus::Failed);
        failed.last_pipeline_run = Some(chrono::Utc::now());
        let gateway = Arc::new(MockGateway::new().then_info(failed));
        let poller = ReadinessPoller::new(gateway, PollerConfig::default());

        match poller.poll(&repo(), &CancellationToken::new()).await {
            PollOutcome::Ready(info) => {
                assert_eq!(info.pipeline_status, Some(PipelineStatus::Failed))
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_budget() {
        let gateway = Arc::new(MockGateway::new().then_running(1));
        let config = PollerConfig::default();
        let poller = ReadinessPoller::new(gateway.clone(), config);

        match poller.poll(&repo(), &CancellationToken::new()).await {
            PollOutcome::TimedOut { elapsed, fetches } => {
                assert!(elapsed <= config.budget);
                assert!(elapsed >= config.deadline());
                assert_eq!(fetches as usize, gateway.info_calls());
            }
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_errored() {
        let gateway = Arc::new(MockGateway::new().then_running(2).then_info_error(500));
        let poller = ReadinessPoller::new(gateway.clone(), PollerConfig::default());

        let outcome = poller.poll(&repo(), &CancellationToken::new()).await;
        assert!(matches!(outcome, PollOutcome::Errored(ref e) if e.status() == Some(500)));
        assert_eq!(gateway.info_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let gateway = Arc::new(MockGateway::new().then_running(1));
        let poller = ReadinessPoller::new(gateway.clone(), PollerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(poller.poll(&repo(), &cancel).await, PollOutcome::Cancelled));
        assert_eq!(gateway.info_calls(), 0);
    }

    #[test]
    fn test_validate_rejects_empty_window_and_zero_interval() {
        assert!(PollerConfig::default().validate().is_ok());

        let no_window = PollerConfig {
            budget: Duration::from_secs(5),
            ..PollerConfig::default()
        };
        assert!(no_window.validate().is_err());

        let no_interval = PollerConfig {
            interval: Duration::ZERO,
            ..PollerConfig::default()
        };
        assert!(no_interval.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_length_window_still_fetches_once() {
        let gateway = Arc::new(MockGateway::new().then_info(success_info()));
        let config = PollerConfig {
            budget: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            margin: Duration::from_secs(5),
        };
        let poller = ReadinessPoller::new(gateway.clone(), config);

        let info = poller
            .wait_until_ready(&repo(), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(info.is_fully_loaded());
        assert_eq!(gateway.info_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_length_window_spaces_retries() {
        let gateway = Arc::new(MockGateway::new().then_running(1));
        let config = PollerConfig {
            budget: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            margin: Duration::from_secs(5),
        };
        let poller = ReadinessPoller::new(gateway.clone(), config);

        let started = Instant::now();
        let err = poller
            .wait_until_ready(&repo(), &CancellationToken::new(), Some(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::TimedOut { attempts: 4 }));
        assert_eq!(gateway.info_calls(), 4);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_window_is_reissued_until_ready() {
        let gateway = Arc::new(MockGateway::new().then_running(70).then_info(success_info()));
        let poller = ReadinessPoller::new(gateway.clone(), PollerConfig::default());

        let info = poller
            .wait_until_ready(&repo(), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(info.is_fully_loaded());
        assert_eq!(gateway.info_calls(), 71);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_gives_up_after_max_attempts() {
        let gateway = Arc::new(MockGateway::new().then_running(1));
        let poller = ReadinessPoller::new(gateway, PollerConfig::default());

        let err = poller
            .wait_until_ready(&repo(), &CancellationToken::new(), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::TimedOut { attempts: 2 }));
    }
}
