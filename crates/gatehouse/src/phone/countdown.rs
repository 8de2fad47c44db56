//! Resend countdown for SMS codes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::timer::TaskSlot;

const TICK: Duration = Duration::from_secs(1);

/// Seconds remaining before another code may be requested
#[derive(Debug)]
pub struct Countdown {
    remaining: Arc<watch::Sender<u32>>,
    timer: Mutex<Option<TaskSlot>>,
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(watch::Sender::new(0)),
            timer: Mutex::new(None),
        }
    }

    /// Start counting down from `secs`, one step per second. Restarting
    /// cancels the previous run.
    pub fn start(&self, secs: u32) {
        let mut timer = self.timer.lock();
        timer.take();
        self.remaining.send_replace(secs);
        if secs == 0 {
            return;
        }

        let remaining = Arc::clone(&self.remaining);
        *timer = Some(TaskSlot::spawn(move |token| async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
            for left in (0..secs).rev() {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if token.is_cancelled() {
                    return;
                }
                remaining.send_replace(left);
            }
            tracing::debug!("SMS countdown finished");
        }));
    }

    /// Stop the timer, leaving the displayed value where it is
    pub fn cancel(&self) {
        self.timer.lock().take();
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.remaining() > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.subscribe()
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}
