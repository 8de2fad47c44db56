//! Captcha widget state and the fetch/check request cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use gatehouse_common::{
    CaptchaChallenge, CaptchaCheckForm, ChallengeOutcome, CheckOutcome, ClickPoint, GatehouseError,
};

use super::CaptchaObserver;
use crate::api::AuthApi;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::timer::TaskSlot;

const LOAD_FAILED: &str = "Failed to load captcha";
const CHECK_FAILED: &str = "Captcha verification failed";
const CHECK_PASSED: &str = "Verification passed";

/// Everything a frontend needs to draw the widget
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptchaView {
    pub visible: bool,
    /// Set after a failed check, cleared on open and on pass
    pub error: bool,
    /// Most recently loaded challenge
    pub challenge: Option<CaptchaChallenge>,
    /// The challenge has been submitted once and awaits replacement
    pub consumed: bool,
}

/// Outcome of a solution submission that reached the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    Passed,
    Failed,
}

/// Click-captcha controller
pub struct CaptchaController {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn CaptchaObserver>,
    view: watch::Sender<CaptchaView>,
    refresh_delay: Duration,
    /// Delayed post-check refetch; replacing it cancels the previous one
    pending_refresh: Mutex<Option<TaskSlot>>,
}

impl CaptchaController {
    pub fn new(
        api: Arc<dyn AuthApi>,
        notifier: Arc<dyn Notifier>,
        observer: Arc<dyn CaptchaObserver>,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                notifier,
                observer,
                view: watch::Sender::new(CaptchaView::default()),
                refresh_delay,
                pending_refresh: Mutex::new(None),
            }),
        }
    }

    pub fn from_state(state: &AppState, observer: Arc<dyn CaptchaObserver>) -> Self {
        Self::new(
            state.api.clone(),
            state.notifier.clone(),
            observer,
            state.config.captcha_refresh_delay(),
        )
    }

    /// Show the widget and load a challenge for it
    pub async fn open(&self) -> Result<(), GatehouseError> {
        self.inner.view.send_modify(|view| {
            view.visible = true;
            view.error = false;
        });
        self.inner.observer.visibility_changed(true);
        self.inner.request_challenge().await
    }

    /// Hide the widget. The owner is always told.
    pub fn close(&self) {
        self.inner.view.send_modify(|view| view.visible = false);
        self.inner.observer.visibility_changed(false);
    }

    /// Fetch a new challenge. On failure the previous challenge stays in place.
    pub async fn request_challenge(&self) -> Result<(), GatehouseError> {
        self.inner.request_challenge().await
    }

    /// User asked for a different image
    pub async fn refresh(&self) -> Result<(), GatehouseError> {
        self.inner.request_challenge().await
    }

    /// Submit clicks against the current challenge.
    ///
    /// `extra` travels JSON-encoded as `extraData`. No minimum number of
    /// points is enforced; the backend rejects degenerate submissions.
    ///
    /// Each challenge is checked at most once. Until a new challenge has
    /// been loaded, further submissions fail with [`GatehouseError::Busy`].
    pub async fn submit_solution(
        &self,
        points: &[ClickPoint],
        extra: &Value,
    ) -> Result<SolveResult, GatehouseError> {
        let key = self.inner.claim_challenge().ok_or_else(|| {
            GatehouseError::Busy("captcha challenge already used, load a new one".to_string())
        })?;
        let form = match CaptchaCheckForm::new(points, &key, extra) {
            Ok(form) => form,
            Err(e) => {
                self.inner.release_challenge(&key);
                return Err(e);
            }
        };

        tracing::debug!(key = %key, points = points.len(), "Submitting captcha solution");

        match self.inner.api.check_challenge(&form).await {
            Ok(CheckOutcome::Passed { message }) => {
                let notice = message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(CHECK_PASSED);
                self.inner.notifier.success(notice);
                self.inner.view.send_modify(|view| {
                    view.visible = false;
                    view.error = false;
                });
                self.inner.observer.visibility_changed(false);
                self.inner.observer.solved();

                tracing::info!(key = %key, "Captcha passed");
                schedule_refresh(&self.inner);
                Ok(SolveResult::Passed)
            }
            Ok(CheckOutcome::Failed { code, message }) => {
                tracing::debug!(key = %key, code = ?code, message = ?message, "Captcha check failed");
                self.inner.notifier.error(CHECK_FAILED);
                self.inner.view.send_modify(|view| view.error = true);

                schedule_refresh(&self.inner);
                Ok(SolveResult::Failed)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Captcha check request failed");
                self.inner.notifier.error(CHECK_FAILED);
                // The check never completed, so the challenge stays usable.
                self.inner.release_challenge(&key);
                Err(e)
            }
        }
    }

    pub fn view(&self) -> CaptchaView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptchaView> {
        self.inner.view.subscribe()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.view.borrow().visible
    }
}

impl Drop for CaptchaController {
    fn drop(&mut self) {
        self.inner.pending_refresh.lock().take();
    }
}

impl Inner {
    /// Mark the current challenge consumed and return its key, unless there
    /// is none or it was already used
    fn claim_challenge(&self) -> Option<String> {
        let mut claimed = None;
        self.view.send_if_modified(|view| match &view.challenge {
            Some(challenge) if !view.consumed => {
                view.consumed = true;
                claimed = Some(challenge.key.clone());
                true
            }
            _ => false,
        });
        claimed
    }

    fn release_challenge(&self, key: &str) {
        self.view.send_if_modified(|view| {
            let current = view.consumed && view.challenge.as_ref().is_some_and(|c| c.key == key);
            if current {
                view.consumed = false;
            }
            current
        });
    }

    async fn request_challenge(&self) -> Result<(), GatehouseError> {
        match self.api.fetch_challenge().await {
            Ok(ChallengeOutcome::Issued(challenge)) => {
                tracing::debug!(key = %challenge.key, "Captcha challenge loaded");
                self.view.send_modify(|view| {
                    view.challenge = Some(challenge);
                    view.consumed = false;
                });
                Ok(())
            }
            Ok(ChallengeOutcome::Refused { code, message }) => {
                tracing::warn!(code = code, message = ?message, "Captcha challenge refused");
                self.notifier.error(LOAD_FAILED);
                Err(GatehouseError::Rejected(
                    message.unwrap_or_else(|| format!("captcha fetch returned code {code}")),
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Captcha challenge fetch failed");
                self.notifier.error(LOAD_FAILED);
                Err(e)
            }
        }
    }
}

/// Refetch a challenge after the refresh delay so the widget starts clean
/// next time it is shown. Runs even when the widget is hidden.
fn schedule_refresh(inner: &Arc<Inner>) {
    let target = Arc::clone(inner);
    let slot = TaskSlot::delayed(inner.refresh_delay, async move {
        if let Err(e) = target.request_challenge().await {
            tracing::debug!(error = %e, "Post-check captcha refresh failed");
        }
    });
    *inner.pending_refresh.lock() = Some(slot);
}
