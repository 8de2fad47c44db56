//! In-crate test doubles.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use gatehouse_common::{
    CaptchaChallenge, CaptchaCheckForm, ChallengeOutcome, CheckOutcome, GatehouseError,
    LoginOutcome, LoginRequest, QrCreateOutcome, QrPoll, QrSession,
};

use crate::api::AuthApi;
use crate::captcha::CaptchaObserver;
use crate::config::AppConfig;
use crate::navigate::WatchNavigator;
use crate::notify::RecordingNotifier;
use crate::state::AppState;
use crate::storage::MemoryStore;

type Scripted<T> = Mutex<VecDeque<Result<T, GatehouseError>>>;

/// Scripted backend. Each endpoint pops a queued reply, falling back to a
/// happy-path default when its queue is empty.
#[derive(Default)]
pub(crate) struct FakeApi {
    challenges: Scripted<ChallengeOutcome>,
    checks: Scripted<CheckOutcome>,
    sessions: Scripted<QrCreateOutcome>,
    statuses: Scripted<QrPoll>,
    logins: Scripted<LoginOutcome>,
    /// Session creations wait on these, in call order
    session_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,

    challenge_calls: AtomicUsize,
    session_calls: AtomicUsize,
    check_forms: Mutex<Vec<CaptchaCheckForm>>,
    login_requests: Mutex<Vec<LoginRequest>>,
    polled: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_challenge(&self, reply: Result<ChallengeOutcome, GatehouseError>) {
        self.challenges.lock().push_back(reply);
    }

    pub fn push_check(&self, reply: Result<CheckOutcome, GatehouseError>) {
        self.checks.lock().push_back(reply);
    }

    pub fn push_session(&self, reply: Result<QrCreateOutcome, GatehouseError>) {
        self.sessions.lock().push_back(reply);
    }

    /// Hold the next session creation until the returned sender fires
    pub fn gate_session(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.session_gates.lock().push_back(rx);
        tx
    }

    pub fn push_status(&self, reply: Result<QrPoll, GatehouseError>) {
        self.statuses.lock().push_back(reply);
    }

    pub fn push_login(&self, reply: Result<LoginOutcome, GatehouseError>) {
        self.logins.lock().push_back(reply);
    }

    pub fn challenge_calls(&self) -> usize {
        self.challenge_calls.load(Ordering::SeqCst)
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> usize {
        self.check_forms.lock().len()
    }

    pub fn last_check(&self) -> Option<CaptchaCheckForm> {
        self.check_forms.lock().last().cloned()
    }

    pub fn login_requests(&self) -> Vec<LoginRequest> {
        self.login_requests.lock().clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.polled.lock().clone()
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, GatehouseError> {
        self.login_requests.lock().push(request.clone());
        self.logins.lock().pop_front().unwrap_or_else(|| {
            Ok(LoginOutcome::Authenticated {
                token: "tok_default".to_string(),
            })
        })
    }

    async fn fetch_challenge(&self) -> Result<ChallengeOutcome, GatehouseError> {
        let n = self.challenge_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.challenges.lock().pop_front().unwrap_or_else(|| {
            Ok(ChallengeOutcome::Issued(CaptchaChallenge {
                key: format!("key-{n}"),
                image: "aW1hZ2U=".to_string(),
                thumb: "dGh1bWI=".to_string(),
            }))
        })
    }

    async fn check_challenge(
        &self,
        form: &CaptchaCheckForm,
    ) -> Result<CheckOutcome, GatehouseError> {
        self.check_forms.lock().push(form.clone());
        self.checks.lock().pop_front().unwrap_or_else(|| {
            Ok(CheckOutcome::Passed {
                message: Some("ok".to_string()),
            })
        })
    }

    async fn create_qr_session(&self) -> Result<QrCreateOutcome, GatehouseError> {
        let n = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let reply = self.sessions.lock().pop_front().unwrap_or_else(|| {
            Ok(QrCreateOutcome::Created(QrSession {
                session_id: format!("sid-{n}"),
                qr_url: format!("https://x/qr-{n}.png"),
            }))
        });

        let gate = self.session_gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        reply
    }

    async fn qr_status(&self, session_id: &str) -> Result<QrPoll, GatehouseError> {
        self.polled.lock().push(session_id.to_string());
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or(Ok(QrPoll::Pending))
    }
}

/// Records every captcha hook invocation
#[derive(Default)]
pub(crate) struct RecordingObserver {
    visibility: Mutex<Vec<bool>>,
    solved: AtomicUsize,
}

impl RecordingObserver {
    pub fn visibility(&self) -> Vec<bool> {
        self.visibility.lock().clone()
    }

    pub fn solved_count(&self) -> usize {
        self.solved.load(Ordering::SeqCst)
    }
}

impl CaptchaObserver for RecordingObserver {
    fn visibility_changed(&self, visible: bool) {
        self.visibility.lock().push(visible);
    }

    fn solved(&self) {
        self.solved.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fully in-memory application state around a fake backend
pub(crate) struct TestHarness {
    pub api: Arc<FakeApi>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<WatchNavigator>,
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let api = Arc::new(FakeApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(MemoryStore::new());
        let navigator = Arc::new(WatchNavigator::new());
        let state = AppState::from_parts(
            config,
            api.clone(),
            notifier.clone(),
            store.clone(),
            navigator.clone(),
        );
        Self {
            api,
            notifier,
            store,
            navigator,
            state,
        }
    }
}
