//! Strategies for turning phone + code into a session.

use std::sync::Arc;

use async_trait::async_trait;

use gatehouse_common::{GatehouseError, LoginOutcome, LoginRequest};

use crate::api::AuthApi;

const LOGIN_FAILED: &str = "Login failed, please try again";

/// Submits a phone number and SMS code
#[async_trait]
pub trait CodeSubmitter: Send + Sync {
    /// Whether the flow keeps its in-flight flag raised while `submit` runs
    fn holds_in_flight(&self) -> bool {
        true
    }

    /// Returns the credential token when this strategy authenticated the
    /// user itself, `None` when it handed the form to someone else.
    async fn submit(&self, phone: &str, code: &str) -> Result<Option<String>, GatehouseError>;
}

/// Logs in against the backend's `/api/login`
pub struct BackendSubmitter {
    api: Arc<dyn AuthApi>,
}

impl BackendSubmitter {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CodeSubmitter for BackendSubmitter {
    async fn submit(&self, phone: &str, code: &str) -> Result<Option<String>, GatehouseError> {
        let request = LoginRequest {
            phone: phone.to_string(),
            code: code.to_string(),
        };

        match self.api.login(&request).await? {
            LoginOutcome::Authenticated { token } => Ok(Some(token)),
            LoginOutcome::Refused { message } => Err(GatehouseError::Rejected(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| LOGIN_FAILED.to_string()),
            )),
        }
    }
}

/// Hands the form to a caller-supplied handler and returns immediately
pub struct DelegateSubmitter {
    handler: Arc<dyn Fn(&str, &str) + Send + Sync>,
}

impl DelegateSubmitter {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl CodeSubmitter for DelegateSubmitter {
    fn holds_in_flight(&self) -> bool {
        false
    }

    async fn submit(&self, phone: &str, code: &str) -> Result<Option<String>, GatehouseError> {
        (self.handler)(phone, code);
        Ok(None)
    }
}
