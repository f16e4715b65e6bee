//! Task group with shared cancellation and aggregated errors.
//!
//! A [`TaskGroup`] spawns tasks onto the tokio runtime, hands each of them the
//! same [`CancellationToken`], and collects every error any of them returns.
//! [`TaskGroup::wait`] joins all tasks before reporting, so no error is lost
//! and no task outlives the group.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{FetchError, FetchResult};

/// A group of concurrently running fallible tasks.
pub struct TaskGroup {
    tasks: JoinSet<()>,
    token: CancellationToken,
    errors: Arc<Mutex<Vec<FetchError>>>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    /// Creates an empty group with a fresh cancellation token.
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            token: CancellationToken::new(),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The token shared by every task in the group.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the shared token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the shared token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of tasks spawned and not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Records a failure detected outside of any task.
    pub fn record(&self, error: FetchError) {
        self.errors.lock().push(error);
    }

    /// Spawns a task; its error, if any, is collected.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = FetchResult<()>> + Send + 'static,
    {
        let errors = Arc::clone(&self.errors);
        self.tasks.spawn(async move {
            if let Err(e) = task.await {
                errors.lock().push(e);
            }
        });
    }

    /// Waits for every task and returns all collected errors.
    pub async fn wait(mut self) -> Vec<FetchError> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Download task did not complete");
                self.record(FetchError::TaskPanicked(e.to_string()));
            }
        }

        let mut errors = self.errors.lock();
        std::mem::take(&mut *errors)
    }
}
