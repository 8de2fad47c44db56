//! Phone number + SMS code login.
//!
//! Requesting a code always goes through the click captcha; the SMS is sent
//! server-side when the captcha check carries the phone number. A resend
//! countdown then blocks further requests.

mod countdown;
mod flow;
mod submit;

use std::sync::LazyLock;

use regex::Regex;

use gatehouse_common::constants::PHONE_PATTERN;

pub use countdown::Countdown;
pub use flow::PhoneLoginFlow;
pub use submit::{BackendSubmitter, CodeSubmitter, DelegateSubmitter};

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PHONE_PATTERN).expect("phone pattern is valid"));

/// Returns true for an 11-digit mainland mobile number
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}
