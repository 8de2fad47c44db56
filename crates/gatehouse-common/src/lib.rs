//! # Gatehouse Common
//!
//! Shared types, errors, and constants used across Gatehouse components.
//!
//! ## Modules
//! - `types` - Endpoint wire contracts and their typed outcomes
//! - `error` - Common error types
//! - `constants` - Endpoint paths, storage keys, timing defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ErrorKind, GatehouseError};
pub use types::*;
