//! Wire contracts and typed outcomes shared across Gatehouse components.
//!
//! Every backend endpoint has a loosely-shaped `*Response` struct that mirrors
//! what the server actually sends, plus an exhaustive outcome enum that the
//! controllers work with. Conversions live here so truthy-field checks never
//! leak into the state machines.

use serde::{Deserialize, Serialize};

use crate::error::GatehouseError;

// === Phone login ===

/// Body of `POST /api/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub code: String,
}

/// Nested `{token}` object carried by login and QR status replies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub token: Option<String>,
}

/// Raw reply of `POST /api/login`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub data: Option<TokenData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a phone + code login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Backend issued a credential token
    Authenticated { token: String },
    /// Backend answered without a token
    Refused { message: Option<String> },
}

impl From<LoginResponse> for LoginOutcome {
    fn from(response: LoginResponse) -> Self {
        match response.data.and_then(|d| d.token) {
            Some(token) if !token.is_empty() => Self::Authenticated { token },
            _ => Self::Refused {
                message: response.message,
            },
        }
    }
}

// === Click captcha ===

/// A click on the challenge image, in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

impl ClickPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for ClickPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Flatten clicks into `x1,y1,x2,y2,...`. An empty slice yields an empty string.
pub fn flatten_points(points: &[ClickPoint]) -> String {
    points
        .iter()
        .flat_map(|p| [p.x, p.y])
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Raw reply of the captcha fetch endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub thumb_base64: Option<String>,
    #[serde(default)]
    pub captcha_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A challenge as held by the client. There is no answer on this side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// Opaque key echoed back on submission
    pub key: String,
    /// Master image the user clicks on (base64, possibly a data URL)
    pub image: String,
    /// Thumbnail showing which characters to click
    pub thumb: String,
}

/// Result of a captcha fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Issued(CaptchaChallenge),
    Refused { code: i64, message: Option<String> },
}

impl From<ChallengeResponse> for ChallengeOutcome {
    fn from(response: ChallengeResponse) -> Self {
        // An absent code counts as zero on this endpoint.
        match response.code.unwrap_or(0) {
            0 => Self::Issued(CaptchaChallenge {
                key: response.captcha_key.unwrap_or_default(),
                image: response.image_base64.unwrap_or_default(),
                thumb: response.thumb_base64.unwrap_or_default(),
            }),
            code => Self::Refused {
                code,
                message: response.message,
            },
        }
    }
}

/// Form body of the captcha check endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaCheckForm {
    pub dots: String,
    pub key: String,
    #[serde(rename = "extraData")]
    pub extra_data: String,
}

impl CaptchaCheckForm {
    /// Build the form for a solution attempt against `key`
    pub fn new(
        points: &[ClickPoint],
        key: &str,
        extra: &serde_json::Value,
    ) -> Result<Self, GatehouseError> {
        let extra_data = serde_json::to_string(extra)
            .map_err(|e| GatehouseError::Decode(format!("extra data: {e}")))?;
        Ok(Self {
            dots: flatten_points(points),
            key: key.to_string(),
            extra_data,
        })
    }
}

/// Raw reply of the captcha check endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a captcha check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed { message: Option<String> },
    Failed { code: Option<i64>, message: Option<String> },
}

impl From<CheckResponse> for CheckOutcome {
    fn from(response: CheckResponse) -> Self {
        // Only an explicit zero passes; a missing code is a failure.
        match response.code {
            Some(0) => Self::Passed {
                message: response.message,
            },
            code => Self::Failed {
                code,
                message: response.message,
            },
        }
    }
}

// === WeChat QR login ===

/// `data` object of the QR session creation reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrCodeData {
    #[serde(default)]
    pub qr_url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Raw reply of `POST /api/auth/wechat/qr-code`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrCodeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<QrCodeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A server-tracked QR login session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSession {
    pub session_id: String,
    /// Scannable-code payload (image URL)
    pub qr_url: String,
}

/// Result of a QR session creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrCreateOutcome {
    Created(QrSession),
    Refused { message: Option<String> },
}

impl From<QrCodeResponse> for QrCreateOutcome {
    fn from(response: QrCodeResponse) -> Self {
        if !response.success {
            return Self::Refused {
                message: response.message,
            };
        }
        match response.data {
            Some(QrCodeData {
                qr_url: Some(qr_url),
                session_id: Some(session_id),
            }) => Self::Created(QrSession { session_id, qr_url }),
            _ => Self::Refused {
                message: response.message,
            },
        }
    }
}

/// Raw reply of `GET /api/auth/wechat/status/{session_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrStatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<TokenData>,
}

/// What a single status poll observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPoll {
    /// Nothing actionable yet (includes unsuccessful and unknown replies)
    Pending,
    Scanned,
    Confirmed { token: String },
    Expired,
}

impl TryFrom<QrStatusResponse> for QrPoll {
    type Error = GatehouseError;

    fn try_from(response: QrStatusResponse) -> Result<Self, Self::Error> {
        if !response.success {
            return Ok(Self::Pending);
        }
        match response.status.as_deref() {
            Some("scanned") => Ok(Self::Scanned),
            Some("expired") => Ok(Self::Expired),
            Some("success") => response
                .data
                .and_then(|d| d.token)
                .map(|token| Self::Confirmed { token })
                .ok_or_else(|| {
                    GatehouseError::Decode("confirmed session carried no token".to_string())
                }),
            _ => Ok(Self::Pending),
        }
    }
}

/// Observable phase of a QR login session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrPhase {
    Loading,
    Ready,
    Scanned,
    Confirmed,
    Expired,
}

impl QrPhase {
    /// Returns true if no further automatic transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Expired)
    }

    /// Prompt shown under the code for this phase
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Loading => "Loading QR code...",
            Self::Ready => "Scan with WeChat to log in",
            Self::Scanned => "Scanned, confirm the login on your phone",
            Self::Confirmed => "Login confirmed",
            Self::Expired => "QR code expired, refresh to try again",
        }
    }
}
