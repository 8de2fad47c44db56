//! Cancellable background tasks bound to their owner's lifetime.
//!
//! Every recurring or delayed activity (QR status polling, the SMS countdown,
//! the post-check captcha refresh) runs inside a [`TaskSlot`]. Cancellation is
//! cooperative: the task selects on its token, and dropping or replacing the
//! slot trips the token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A spawned task that is cancelled when the slot is dropped
#[derive(Debug)]
pub struct TaskSlot {
    token: CancellationToken,
}

impl TaskSlot {
    /// Spawn a task that receives its own cancellation token
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        tokio::spawn(task(token.clone()));
        Self { token }
    }

    /// Run `work` once after `delay`, unless cancelled first
    pub fn delayed<Fut>(delay: Duration, work: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(move |token| async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => work.await,
            }
        })
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_delayed_runs_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _slot = TaskSlot::delayed(Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_work() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let slot = TaskSlot::delayed(Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        });
        drop(slot);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
