//! reqwest-backed implementation of [`AuthApi`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use gatehouse_common::constants::endpoints;
use gatehouse_common::{
    CaptchaCheckForm, ChallengeOutcome, ChallengeResponse, CheckOutcome, CheckResponse,
    GatehouseError, LoginOutcome, LoginRequest, LoginResponse, QrCodeResponse, QrCreateOutcome,
    QrPoll, QrStatusResponse,
};

use super::AuthApi;
use crate::config::AppConfig;

/// HTTP client for the authentication backend
///
/// Attaches the stored credential (if any) as a bearer token, the same way
/// every other request from the application does.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    login_url: String,
    captcha_get_url: String,
    captcha_check_url: String,
    qr_code_url: String,
    status_url_prefix: String,
    credential: Option<String>,
}

/// Error body some endpoints return alongside a non-2xx status
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &AppConfig, credential: Option<String>) -> Result<Self, GatehouseError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatehouseError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            login_url: config.resolve_url(endpoints::LOGIN),
            captcha_get_url: config.resolve_url(&config.captcha_get_url),
            captcha_check_url: config.resolve_url(&config.captcha_check_url),
            qr_code_url: config.resolve_url(endpoints::WECHAT_QR_CODE),
            status_url_prefix: config.resolve_url(endpoints::WECHAT_STATUS_PREFIX),
            credential,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.credential.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode a JSON reply, mapping failures onto the error taxonomy
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatehouseError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatehouseError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(status, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatehouseError::Decode(e.to_string()))
    }
}

async fn rejection(status: reqwest::StatusCode, response: Response) -> GatehouseError {
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty());

    tracing::debug!(status = %status, message = ?message, "Backend returned error status");

    GatehouseError::Rejected(message.unwrap_or_else(|| format!("HTTP {status}")))
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, GatehouseError> {
        let builder = self.request(Method::POST, &self.login_url).json(request);
        let response: LoginResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn fetch_challenge(&self) -> Result<ChallengeOutcome, GatehouseError> {
        let builder = self.request(Method::GET, &self.captcha_get_url);
        let response: ChallengeResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn check_challenge(
        &self,
        form: &CaptchaCheckForm,
    ) -> Result<CheckOutcome, GatehouseError> {
        let builder = self.request(Method::POST, &self.captcha_check_url).form(form);
        let response: CheckResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn create_qr_session(&self) -> Result<QrCreateOutcome, GatehouseError> {
        let builder = self
            .request(Method::POST, &self.qr_code_url)
            .json(&serde_json::json!({}));
        let response: QrCodeResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn qr_status(&self, session_id: &str) -> Result<QrPoll, GatehouseError> {
        let url = format!(
            "{}{}",
            self.status_url_prefix,
            urlencoding::encode(session_id)
        );
        let response: QrStatusResponse = self.send_json(self.request(Method::GET, &url)).await?;
        QrPoll::try_from(response)
    }
}
