//! Backend API seam.
//!
//! Controllers talk to the authentication backend only through [`AuthApi`].
//! [`HttpBackend`] is the real implementation; tests substitute their own.

use async_trait::async_trait;

use gatehouse_common::{
    CaptchaCheckForm, ChallengeOutcome, CheckOutcome, GatehouseError, LoginOutcome, LoginRequest,
    QrCreateOutcome, QrPoll,
};

mod http;

pub use http::HttpBackend;

/// The endpoints the login flows depend on
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /api/login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, GatehouseError>;

    /// Fetch a fresh click-captcha challenge
    async fn fetch_challenge(&self) -> Result<ChallengeOutcome, GatehouseError>;

    /// Submit a captcha solution
    async fn check_challenge(&self, form: &CaptchaCheckForm)
    -> Result<CheckOutcome, GatehouseError>;

    /// `POST /api/auth/wechat/qr-code`
    async fn create_qr_session(&self) -> Result<QrCreateOutcome, GatehouseError>;

    /// `GET /api/auth/wechat/status/{session_id}`
    async fn qr_status(&self, session_id: &str) -> Result<QrPoll, GatehouseError>;
}
