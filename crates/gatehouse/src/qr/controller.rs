//! QR login session state machine.
//!
//! ```text
//! loading ──created──▶ ready ──scanned──▶ scanned
//!    │                   │                   │
//!    └─failed─▶ expired ◀┴──────expired──────┤
//!                        └─success─▶ confirmed◀┘
//! ```
//!
//! `refresh` returns any state to `loading` with a brand-new session.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use gatehouse_common::{QrCreateOutcome, QrPhase, QrPoll, QrSession};

use crate::api::AuthApi;
use crate::notify::Notifier;
use crate::state::{AppState, LoginSuccess};
use crate::timer::TaskSlot;

const CREATE_FAILED: &str = "Failed to get QR code, please retry";

/// Polling states own the timer that drives them; leaving them stops polling.
enum Machine {
    Loading,
    Ready { session: QrSession, poller: TaskSlot },
    Scanned { session: QrSession, poller: TaskSlot },
    Confirmed,
    Expired,
    /// Torn down, nothing advances any more
    Closed,
}

impl Machine {
    fn phase(&self) -> QrPhase {
        match self {
            Self::Loading => QrPhase::Loading,
            Self::Ready { .. } => QrPhase::Ready,
            Self::Scanned { .. } => QrPhase::Scanned,
            Self::Confirmed => QrPhase::Confirmed,
            Self::Expired | Self::Closed => QrPhase::Expired,
        }
    }

    fn session(&self) -> Option<&QrSession> {
        match self {
            Self::Ready { session, .. } | Self::Scanned { session, .. } => Some(session),
            _ => None,
        }
    }
}

/// Observable view of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSnapshot {
    pub phase: QrPhase,
    /// Scannable-code payload of the live session
    pub qr_url: Option<String>,
    pub session_id: Option<String>,
    /// A session creation request is in flight
    pub refreshing: bool,
}

impl QrSnapshot {
    fn loading() -> Self {
        Self {
            phase: QrPhase::Loading,
            qr_url: None,
            session_id: None,
            refreshing: false,
        }
    }

    pub fn status_text(&self) -> &'static str {
        self.phase.status_text()
    }
}

/// Drives one QR login session at a time
pub struct QrLoginController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    notifier: Arc<dyn Notifier>,
    on_success: Arc<dyn LoginSuccess>,
    poll_interval: Duration,
    machine: Mutex<Machine>,
    /// Bumped by every refresh and by teardown; a creation that finishes
    /// under an older epoch is discarded.
    epoch: AtomicU64,
    snapshot: watch::Sender<QrSnapshot>,
    active_pollers: AtomicUsize,
}

impl QrLoginController {
    /// Create an idle controller in `loading`; call [`refresh`](Self::refresh)
    /// to create the first session
    pub fn new(
        api: Arc<dyn AuthApi>,
        notifier: Arc<dyn Notifier>,
        on_success: Arc<dyn LoginSuccess>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                notifier,
                on_success,
                poll_interval,
                machine: Mutex::new(Machine::Loading),
                epoch: AtomicU64::new(0),
                snapshot: watch::Sender::new(QrSnapshot::loading()),
                active_pollers: AtomicUsize::new(0),
            }),
        }
    }

    pub fn from_state(state: &AppState, on_success: Arc<dyn LoginSuccess>) -> Self {
        Self::new(
            state.api.clone(),
            state.notifier.clone(),
            on_success,
            state.config.qr_poll_interval(),
        )
    }

    /// Create the controller and its first session
    pub async fn mount(state: &AppState, on_success: Arc<dyn LoginSuccess>) -> Self {
        let controller = Self::from_state(state, on_success);
        controller.refresh().await;
        controller
    }

    /// Abandon the current session and create a new one.
    ///
    /// Returns the phase once this refresh settles (or is superseded).
    pub async fn refresh(&self) -> QrPhase {
        self.inner.create_session().await
    }

    /// Stop polling for good. Called automatically on drop.
    pub fn teardown(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let mut machine = self.inner.machine.lock();
        if !matches!(*machine, Machine::Closed) {
            tracing::debug!(phase = ?machine.phase(), "QR login torn down");
        }
        *machine = Machine::Closed;
    }

    pub fn snapshot(&self) -> QrSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> QrPhase {
        self.inner.machine.lock().phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<QrSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Number of polling tasks currently alive
    pub fn active_pollers(&self) -> usize {
        self.inner.active_pollers.load(Ordering::SeqCst)
    }
}

impl Drop for QrLoginController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Inner {
    fn publish(&self, machine: &Machine, refreshing: bool) {
        let session = machine.session();
        self.snapshot.send_replace(QrSnapshot {
            phase: machine.phase(),
            qr_url: session.map(|s| s.qr_url.clone()),
            session_id: session.map(|s| s.session_id.clone()),
            refreshing,
        });
    }

    async fn create_session(self: &Arc<Self>) -> QrPhase {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut machine = self.machine.lock();
            if matches!(*machine, Machine::Closed) {
                return QrPhase::Expired;
            }
            // Dropping a polling state here cancels its timer.
            *machine = Machine::Loading;
            self.publish(&machine, true);
        }

        tracing::debug!(epoch = epoch, "Creating QR login session");
        let result = self.api.create_qr_session().await;

        let mut machine = self.machine.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch = epoch, "QR session creation superseded");
            return machine.phase();
        }

        *machine = match result {
            Ok(QrCreateOutcome::Created(session)) => {
                tracing::info!(session_id = %session.session_id, "QR login session created");
                let poller = self.spawn_poller(session.session_id.clone());
                Machine::Ready { session, poller }
            }
            Ok(QrCreateOutcome::Refused { message }) => {
                tracing::warn!(message = ?message, "QR login session refused");
                let notice = message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(CREATE_FAILED);
                self.notifier.error(notice);
                Machine::Expired
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "QR login session creation failed");
                self.notifier.error(CREATE_FAILED);
                Machine::Expired
            }
        };
        self.publish(&machine, false);
        machine.phase()
    }

    fn spawn_poller(self: &Arc<Self>, session_id: String) -> TaskSlot {
        let inner = Arc::clone(self);
        TaskSlot::spawn(move |token| poll_session(inner, session_id, token))
    }

    /// Apply one poll result. `Break` ends the polling loop.
    fn apply_poll(&self, session_id: &str, poll: QrPoll) -> ControlFlow<()> {
        let mut machine = self.machine.lock();
        if machine.session().map(|s| s.session_id.as_str()) != Some(session_id) {
            return ControlFlow::Break(());
        }

        match poll {
            QrPoll::Pending => ControlFlow::Continue(()),
            QrPoll::Scanned => {
                let current = std::mem::replace(&mut *machine, Machine::Loading);
                *machine = match current {
                    Machine::Ready { session, poller } => {
                        tracing::info!(session_id = %session_id, "QR code scanned");
                        Machine::Scanned { session, poller }
                    }
                    other => other,
                };
                self.publish(&machine, false);
                ControlFlow::Continue(())
            }
            QrPoll::Expired => {
                tracing::info!(session_id = %session_id, "QR login session expired");
                *machine = Machine::Expired;
                self.publish(&machine, false);
                ControlFlow::Break(())
            }
            QrPoll::Confirmed { token } => {
                *machine = Machine::Confirmed;
                self.publish(&machine, false);
                drop(machine);

                tracing::info!(session_id = %session_id, "QR login confirmed");
                self.on_success.logged_in(&token);
                ControlFlow::Break(())
            }
        }
    }
}

async fn poll_session(inner: Arc<Inner>, session_id: String, token: CancellationToken) {
    inner.active_pollers.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(session_id = %session_id, "QR status polling started");

    let mut ticker =
        tokio::time::interval_at(Instant::now() + inner.poll_interval, inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = inner.api.qr_status(&session_id) => result,
        };

        match result {
            Ok(poll) => {
                if inner.apply_poll(&session_id, poll).is_break() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "QR status check failed");
            }
        }
    }

    inner.active_pollers.fetch_sub(1, Ordering::SeqCst);
    tracing::debug!(session_id = %session_id, "QR status polling stopped");
}
