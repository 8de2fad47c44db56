//! Phone login form: captcha-gated code requests and code submission.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;

use gatehouse_common::{ClickPoint, GatehouseError};

use super::countdown::Countdown;
use super::is_valid_phone;
use super::submit::{BackendSubmitter, CodeSubmitter, DelegateSubmitter};
use crate::captcha::{CaptchaController, CaptchaObserver, SolveResult};
use crate::notify::Notifier;
use crate::state::{AppState, LoginSuccess};

/// Starts the resend countdown once the captcha is solved
struct CaptchaGate {
    countdown: Arc<Countdown>,
    seconds: u32,
}

impl CaptchaObserver for CaptchaGate {
    fn visibility_changed(&self, visible: bool) {
        tracing::debug!(visible = visible, "Captcha visibility changed");
    }

    fn solved(&self) {
        tracing::info!(seconds = self.seconds, "SMS code requested, starting countdown");
        self.countdown.start(self.seconds);
    }
}

#[derive(Debug, Default)]
struct PhoneForm {
    phone: String,
    code: String,
}

/// Lowers the in-flight flag however the submission ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Phone + SMS code login flow
pub struct PhoneLoginFlow {
    notifier: Arc<dyn Notifier>,
    on_success: Arc<dyn LoginSuccess>,
    submitter: Arc<dyn CodeSubmitter>,
    captcha: CaptchaController,
    countdown: Arc<Countdown>,
    form: Mutex<PhoneForm>,
    in_flight: AtomicBool,
}

impl PhoneLoginFlow {
    /// Flow that logs in against the backend
    pub fn new(state: &AppState, on_success: Arc<dyn LoginSuccess>) -> Self {
        let submitter = Arc::new(BackendSubmitter::new(state.api.clone()));
        Self::with_submitter(state, on_success, submitter)
    }

    /// Flow whose submissions go to `handler` instead of the backend
    pub fn with_delegate<F>(state: &AppState, on_success: Arc<dyn LoginSuccess>, handler: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        Self::with_submitter(state, on_success, Arc::new(DelegateSubmitter::new(handler)))
    }

    pub fn with_submitter(
        state: &AppState,
        on_success: Arc<dyn LoginSuccess>,
        submitter: Arc<dyn CodeSubmitter>,
    ) -> Self {
        let countdown = Arc::new(Countdown::new());
        let gate = Arc::new(CaptchaGate {
            countdown: countdown.clone(),
            seconds: state.config.sms_countdown_secs,
        });

        Self {
            notifier: state.notifier.clone(),
            on_success,
            submitter,
            captcha: CaptchaController::from_state(state, gate),
            countdown,
            form: Mutex::new(PhoneForm::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn set_phone(&self, phone: impl Into<String>) {
        self.form.lock().phone = phone.into();
    }

    pub fn set_code(&self, code: impl Into<String>) {
        self.form.lock().code = code.into();
    }

    pub fn phone(&self) -> String {
        self.form.lock().phone.clone()
    }

    pub fn code(&self) -> String {
        self.form.lock().code.clone()
    }

    /// The send-code action is enabled
    pub fn can_send_code(&self) -> bool {
        !self.countdown.is_running() && !self.is_submitting()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<u32> {
        self.countdown.subscribe()
    }

    pub fn captcha(&self) -> &CaptchaController {
        &self.captcha
    }

    /// Validate the phone number and open the captcha gate.
    ///
    /// An invalid number is reported locally and the captcha stays closed.
    pub async fn request_code(&self) -> Result<(), GatehouseError> {
        if !self.can_send_code() {
            return Err(GatehouseError::Busy(format!(
                "resend available in {}s",
                self.countdown.remaining()
            )));
        }

        let phone = self.phone();
        if !is_valid_phone(&phone) {
            let err = GatehouseError::InvalidPhone;
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        tracing::debug!("Opening captcha before sending SMS code");
        self.captcha.open().await
    }

    /// Check captcha clicks; the phone number rides along so the backend
    /// sends the SMS once the check passes.
    pub async fn solve_captcha(&self, points: &[ClickPoint]) -> Result<SolveResult, GatehouseError> {
        let extra = json!({ "phone": self.phone() });
        self.captcha.submit_solution(points, &extra).await
    }

    /// Submit phone and code through the configured strategy
    pub async fn submit(&self) -> Result<(), GatehouseError> {
        let (phone, code) = {
            let form = self.form.lock();
            (form.phone.clone(), form.code.clone())
        };

        let missing = if phone.is_empty() {
            Some("phone number")
        } else if code.is_empty() {
            Some("verification code")
        } else {
            None
        };
        if let Some(field) = missing {
            let err = GatehouseError::MissingInput(field.to_string());
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        let _guard = if self.submitter.holds_in_flight() {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                return Err(GatehouseError::Busy("login already in progress".to_string()));
            }
            Some(InFlight(&self.in_flight))
        } else {
            None
        };

        match self.submitter.submit(&phone, &code).await {
            Ok(Some(token)) => {
                tracing::info!("Phone login succeeded");
                self.on_success.logged_in(&token);
                Ok(())
            }
            Ok(None) => {
                tracing::debug!("Phone login handed to delegate");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "Phone login failed");
                self.notifier.error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Stop the countdown timer
    pub fn teardown(&self) {
        self.countdown.cancel();
    }
}

impl Drop for PhoneLoginFlow {
    fn drop(&mut self) {
        self.teardown();
    }
}
