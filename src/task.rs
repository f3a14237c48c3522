//! Background task handles with cooperative cancellation.
//!
//! Scans and searches run on tokio tasks. Each carries a
//! [`CancellationToken`] that the work checks at safe points (between files,
//! between queries), so a superseded job stops early instead of racing its
//! successor. Tasks spawned under a parent token also stop when the parent
//! is cancelled, which is how the app winds down all background work at once.

use std::future::Future;

use tokio::task::JoinHandle;
pub use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// `?`-friendly cancellation checks.
pub trait CancelCheck {
    /// `Err(Error::Cancelled)` once cancelled.
    fn check(&self) -> Result<()>;
}

impl CancelCheck for CancellationToken {
    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A spawned task together with the token that cancels it.
#[derive(Debug)]
pub struct Task<T> {
    handle: JoinHandle<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> Task<T> {
    /// Spawn `work` on the tokio runtime with a child of `parent`.
    /// Cancelling the task leaves the parent alone; cancelling the parent
    /// cancels the task.
    pub fn spawn_under<F, Fut>(parent: &CancellationToken, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(work(token.clone()));
        Self { handle, token }
    }

    /// Ask the task to stop at its next check.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for the task's output.
    pub async fn join(self) -> Result<T> {
        Ok(self.handle.await?)
    }
}
