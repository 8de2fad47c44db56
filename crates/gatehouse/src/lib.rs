//! # Gatehouse
//!
//! Headless login client. Two flows authenticate a user against the backend:
//!
//! - phone number + SMS code, with the code request gated by a click captcha
//! - WeChat QR code, polled until the user confirms on their phone
//!
//! ```text
//! LoginPage ─┬─ PhoneLoginFlow ── CaptchaController ─┐
//!            └─ QrLoginController ───────────────────┴─ AuthApi (HTTP)
//!                     │
//!             TokenStore + Navigator
//! ```

pub mod api;
pub mod captcha;
pub mod config;
pub mod navigate;
pub mod notify;
pub mod page;
pub mod phone;
pub mod qr;
pub mod state;
pub mod storage;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, ConfigOverrides};
pub use page::{ActiveFlow, LoginMethod, LoginPage};
pub use state::{AppState, LoginSuccess};
