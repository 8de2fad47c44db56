//! WeChat QR login.
//!
//! A session is created on the backend, its code is shown to the user, and
//! the session status is polled until the user confirms in the app or the
//! code expires.

mod controller;

pub use controller::{QrLoginController, QrSnapshot};
