//! Navigation requests emitted by the login page.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// Where to go after the login page is done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// In-app route change
    Route(String),
    /// Full page load; the login page lives in a separate bundle
    FullPage(String),
}

impl Navigation {
    pub fn target(&self) -> &str {
        match self {
            Self::Route(target) | Self::FullPage(target) => target,
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, to: Navigation);
}

/// Publishes every navigation on a watch channel
#[derive(Debug)]
pub struct WatchNavigator {
    tx: watch::Sender<Option<Navigation>>,
    count: AtomicUsize,
}

impl WatchNavigator {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(None),
            count: AtomicUsize::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Navigation>> {
        self.tx.subscribe()
    }

    /// Most recent navigation, if any happened
    pub fn last(&self) -> Option<Navigation> {
        self.tx.borrow().clone()
    }

    /// Number of navigations so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for WatchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for WatchNavigator {
    fn navigate(&self, to: Navigation) {
        tracing::info!(target_path = %to.target(), navigation = ?to, "Navigating");
        self.count.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(Some(to));
    }
}
