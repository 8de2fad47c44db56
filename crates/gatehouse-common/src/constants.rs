//! Shared constants for Gatehouse components.

/// Default backend base URL (the dev proxy target for `/api`)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8082";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default location of the durable key-value store
pub const DEFAULT_STORAGE_PATH: &str = ".gatehouse/storage.json";

/// Storage key holding the credential token
pub const TOKEN_STORAGE_KEY: &str = "token";

/// Application root, the target of every post-login navigation
pub const APP_ROOT: &str = "/";

/// `AUTH_ACCESS` value that turns authentication off entirely
pub const AUTH_DISABLED: &str = "0";

/// QR session status poll interval (seconds)
pub const QR_POLL_INTERVAL_SECS: u64 = 2;

/// Seconds before another SMS code may be requested
pub const SMS_COUNTDOWN_SECS: u32 = 60;

/// Delay before a fresh captcha is fetched after a check (milliseconds)
pub const CAPTCHA_REFRESH_DELAY_MS: u64 = 1000;

/// Simplified mainland China mobile number pattern (ASCII digits only)
pub const PHONE_PATTERN: &str = r"^1[3-9][0-9]{9}$";

/// Backend endpoint paths
pub mod endpoints {
    /// Phone + code login: POST {phone, code}
    pub const LOGIN: &str = "/api/login";

    /// Click-captcha challenge fetch
    pub const CAPTCHA_GET: &str = "/api/captcha/click-basic";

    /// Click-captcha solution check (form-encoded)
    pub const CAPTCHA_CHECK: &str = "/api/captcha/click-basic/check";

    /// WeChat QR session creation: POST {}
    pub const WECHAT_QR_CODE: &str = "/api/auth/wechat/qr-code";

    /// WeChat QR session status: GET {prefix}{session_id}
    pub const WECHAT_STATUS_PREFIX: &str = "/api/auth/wechat/status/";
}

/// Environment variable names
pub mod env {
    /// Prefix for configuration overrides (`GATEHOUSE_API_BASE_URL`, ...)
    pub const CONFIG_PREFIX: &str = "GATEHOUSE";

    /// Footer compliance string
    pub const ICP_NUMBER: &str = "ICP_NUMBER";

    /// Authentication switch; `"0"` disables login entirely
    pub const AUTH_ACCESS: &str = "AUTH_ACCESS";
}
