//! The login page: bootstrap redirect, flow selection and the shared
//! success handler.

use std::sync::Arc;

use clap::ValueEnum;

use gatehouse_common::GatehouseError;
use gatehouse_common::constants::{APP_ROOT, TOKEN_STORAGE_KEY};

use crate::navigate::{Navigation, Navigator};
use crate::notify::Notifier;
use crate::phone::PhoneLoginFlow;
use crate::qr::QrLoginController;
use crate::state::{AppState, LoginSuccess};
use crate::storage::TokenStore;

const SAVE_FAILED: &str = "Failed to save login, please try again";

/// Which login flow is mounted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoginMethod {
    /// Phone number and SMS code
    Phone,
    /// WeChat QR code
    #[default]
    Wechat,
}

impl LoginMethod {
    pub fn other(self) -> Self {
        match self {
            Self::Phone => Self::Wechat,
            Self::Wechat => Self::Phone,
        }
    }
}

/// The mounted flow. Dropping it tears its timers down.
pub enum ActiveFlow {
    Phone(PhoneLoginFlow),
    Wechat(QrLoginController),
}

/// Persists the token, then routes to the application root
struct PersistAndRedirect {
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl LoginSuccess for PersistAndRedirect {
    fn logged_in(&self, token: &str) {
        if let Err(e) = self.store.set(TOKEN_STORAGE_KEY, token) {
            tracing::error!(error = %e, kind = ?e.kind(), "Failed to persist credential token");
            self.notifier.error(SAVE_FAILED);
            return;
        }

        tracing::info!("Login succeeded, entering application");
        self.navigator.navigate(Navigation::Route(APP_ROOT.to_string()));
    }
}

/// Login page hosting exactly one flow at a time
pub struct LoginPage {
    state: AppState,
    on_success: Arc<dyn LoginSuccess>,
    method: LoginMethod,
    flow: Option<ActiveFlow>,
}

impl LoginPage {
    /// Mount the page.
    ///
    /// A user who already holds a token, or a deployment with authentication
    /// switched off, is sent straight to the application and no flow mounts.
    pub async fn mount(state: AppState, method: LoginMethod) -> Self {
        let on_success: Arc<dyn LoginSuccess> = Arc::new(PersistAndRedirect {
            store: state.store.clone(),
            notifier: state.notifier.clone(),
            navigator: state.navigator.clone(),
        });

        let mut page = Self {
            state,
            on_success,
            method,
            flow: None,
        };

        if page.should_bypass() {
            page.state
                .navigator
                .navigate(Navigation::FullPage(APP_ROOT.to_string()));
            return page;
        }

        page.flow = Some(page.build(method).await);
        page
    }

    fn should_bypass(&self) -> bool {
        if self.state.config.auth_disabled() {
            tracing::info!("Authentication disabled, skipping login");
            return true;
        }

        match self.state.store.token() {
            Ok(Some(token)) if !token.is_empty() => {
                tracing::info!("Existing session found, skipping login");
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored credential");
                false
            }
        }
    }

    async fn build(&self, method: LoginMethod) -> ActiveFlow {
        tracing::debug!(method = ?method, "Mounting login flow");
        match method {
            LoginMethod::Phone => {
                ActiveFlow::Phone(PhoneLoginFlow::new(&self.state, self.on_success.clone()))
            }
            LoginMethod::Wechat => ActiveFlow::Wechat(
                QrLoginController::mount(&self.state, self.on_success.clone()).await,
            ),
        }
    }

    /// Switch to the other flow, tearing the current one down first
    pub async fn toggle(&mut self) -> LoginMethod {
        self.switch_to(self.method.other()).await;
        self.method
    }

    pub async fn switch_to(&mut self, method: LoginMethod) {
        if self.flow.is_none() || self.method == method {
            return;
        }

        drop(self.flow.take());
        self.method = method;
        self.flow = Some(self.build(method).await);
    }

    pub fn method(&self) -> LoginMethod {
        self.method
    }

    /// True when mount redirected instead of showing a flow
    pub fn is_redirected(&self) -> bool {
        self.flow.is_none()
    }

    pub fn flow(&self) -> Option<&ActiveFlow> {
        self.flow.as_ref()
    }

    pub fn phone(&self) -> Option<&PhoneLoginFlow> {
        match &self.flow {
            Some(ActiveFlow::Phone(flow)) => Some(flow),
            _ => None,
        }
    }

    pub fn wechat(&self) -> Option<&QrLoginController> {
        match &self.flow {
            Some(ActiveFlow::Wechat(controller)) => Some(controller),
            _ => None,
        }
    }

    /// Footer compliance string, when configured
    pub fn icp_number(&self) -> Option<&str> {
        self.state.config.icp_number.as_deref()
    }

    /// Forget the stored credential
    pub fn logout(&self) -> Result<(), GatehouseError> {
        self.state.store.remove(TOKEN_STORAGE_KEY)?;
        tracing::info!("Stored credential removed");
        Ok(())
    }
}
