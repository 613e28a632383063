//! Repository import readiness
//!
//! Before a conversation may start, the host waits for the repository's
//! import pipeline to conclude. [`ReadinessPoller`] runs the bounded wait;
//! [`ReadinessHandle`] ties a background wait to the lifetime of its
//! consumer so that dropping the handle tears the poll down.

pub mod poller;

pub use poller::{PollOutcome, PollerConfig, ReadinessPoller};

use crate::error::ReadinessError;
use crate::gateway::{RepoId, RepoInfo};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A readiness wait running in the background.
///
/// Dropping the handle cancels the wait.
pub struct ReadinessHandle {
    task: JoinHandle<Result<RepoInfo, ReadinessError>>,
    cancel: CancellationToken,
    guard: DropGuard,
}

impl ReadinessHandle {
    /// Spawn `wait_until_ready` for `repo` on the current runtime
    pub fn spawn(poller: Arc<ReadinessPoller>, repo: RepoId, max_attempts: Option<u32>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            poller.wait_until_ready(&repo, &token, max_attempts).await
        });
        Self {
            task,
            guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Stop polling; the pending `wait` resolves to `Cancelled`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the background poll to finish
    pub async fn wait(self) -> Result<RepoInfo, ReadinessError> {
        let Self { task, guard, .. } = self;
        let result = task.await.unwrap_or(Err(ReadinessError::Cancelled));
        // Finished on its own: nothing left to cancel
        let _ = guard.disarm();
        result
    }
}
