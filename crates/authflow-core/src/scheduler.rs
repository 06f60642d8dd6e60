//! Cancelable repeating tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a task started by [`schedule`].
///
/// Cancelling is synchronous: once [`cancel`](Self::cancel) returns, the
/// callback is never invoked again, and an invocation suspended at an
/// `.await` is dropped at that point instead of resuming. Dropping the
/// handle cancels the task.
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "Scheduled task ended abnormally");
            }
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `callback` every `interval`, first after one full interval.
///
/// Ticks that would overlap a slow callback are delayed, never bunched up.
pub fn schedule<F, Fut>(interval: Duration, mut callback: F) -> CancelHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick
        timer.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => break,
                _ = timer.tick() => {}
            }

            tokio::select! {
                biased;
                () = cancelled.cancelled() => break,
                () = callback() => {}
            }
        }
        debug!("Scheduled task stopped");
    });

    CancelHandle {
        token,
        task: Some(task),
    }
}
