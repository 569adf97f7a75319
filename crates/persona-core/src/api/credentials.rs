//! In-memory access credential.
//!
//! The bearer token lives only in process memory. It is never written to disk
//! and never logged in full (see [`mask_token`]).

use std::sync::{Arc, Mutex, PoisonError, RwLock};

type RefreshObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Holds the current access credential and the refresh observers.
#[derive(Default)]
pub struct CredentialStore {
    token: RwLock<Option<String>>,
    observers: Mutex<Vec<RefreshObserver>>,
}

impl CredentialStore {
    /// Replaces the current credential unconditionally.
    pub fn set(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Registers an observer for credentials obtained by a silent refresh.
    ///
    /// Observers accumulate; each one sees every successful refresh.
    pub fn subscribe(&self, observer: impl Fn(&str) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    pub(crate) fn notify_refreshed(&self, token: &str) {
        // Snapshot so an observer may subscribe again without deadlocking.
        let observers: Vec<RefreshObserver> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer(token);
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = self.get();
        f.debug_struct("CredentialStore")
            .field("token", &token.as_deref().map(mask_token))
            .finish_non_exhaustive()
    }
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 || !token.is_char_boundary(12) {
        return "***".to_string();
    }
    format!("{}...", &token[..12])
}
