//! Deciding, per call, whether the remote store should be tried.
//!
//! The facade asks its selector on every operation and never caches the
//! answer, so connectivity changes take effect on the very next call.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait ModeSelector: Send + Sync {
    /// `true` if the remote store is usable right now.
    fn remote_usable(&self) -> bool;
}

/// Any `Fn() -> bool` closure is a selector.
impl<F> ModeSelector for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn remote_usable(&self) -> bool {
        self()
    }
}

/// Never use the remote store.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

impl ModeSelector for LocalOnly {
    fn remote_usable(&self) -> bool {
        false
    }
}

/// A connectivity flag the host flips as the network comes and goes.
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ModeSelector for ConnectivityFlag {
    fn remote_usable(&self) -> bool {
        self.is_online()
    }
}
