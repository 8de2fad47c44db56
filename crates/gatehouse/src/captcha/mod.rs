//! Click-captcha challenge widget.
//!
//! The widget fetches a challenge (master image + thumbnail), collects the
//! user's clicks, and submits them for checking. It never knows the answer.

mod controller;
mod image;

pub use controller::{CaptchaController, CaptchaView, SolveResult};
pub use image::{decode_image, parse_points};

/// Hooks the widget's owner uses to react to it
pub trait CaptchaObserver: Send + Sync {
    /// Called on every open and close, including the close after a pass
    fn visibility_changed(&self, _visible: bool) {}

    /// Called once per passed check
    fn solved(&self) {}
}
