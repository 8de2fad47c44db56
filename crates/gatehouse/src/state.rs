//! Application state and shared services.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{AuthApi, HttpBackend};
use crate::config::AppConfig;
use crate::navigate::Navigator;
use crate::notify::Notifier;
use crate::storage::{FileStore, TokenStore};

/// Receives the credential token once a flow has authenticated
pub trait LoginSuccess: Send + Sync {
    fn logged_in(&self, token: &str);
}

impl<F> LoginSuccess for F
where
    F: Fn(&str) + Send + Sync,
{
    fn logged_in(&self, token: &str) {
        self(token)
    }
}

/// Services shared by the login page and its flows
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Authentication backend
    pub api: Arc<dyn AuthApi>,

    /// User-visible notices
    pub notifier: Arc<dyn Notifier>,

    /// Durable key-value storage (credential token)
    pub store: Arc<dyn TokenStore>,

    /// Post-login navigation
    pub navigator: Arc<dyn Navigator>,
}

impl AppState {
    /// Build state backed by the file store and the HTTP backend
    pub fn new(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let store: Arc<dyn TokenStore> = Arc::new(FileStore::new(&config.storage_path));

        // Requests carry the stored credential when one exists.
        let credential = store.token().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read stored credential");
            None
        });

        let api: Arc<dyn AuthApi> = Arc::new(
            HttpBackend::new(&config, credential).context("Failed to create HTTP backend")?,
        );

        Ok(Self::from_parts(config, api, notifier, store, navigator))
    }

    /// Assemble state from explicit parts
    pub fn from_parts(
        config: AppConfig,
        api: Arc<dyn AuthApi>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            api,
            notifier,
            store,
            navigator,
        }
    }
}
