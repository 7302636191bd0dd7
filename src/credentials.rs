//! Process-wide generation credential and quota-tier state
//!
//! Both the queue drive and the out-of-band retry path read this state at
//! the moment of use. The elevated flag only affects pacing, never
//! correctness, so plain atomics are enough; the key itself sits behind a
//! lock so a user-supplied key installed mid-batch is picked up by the very
//! next backend call.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// Shared credential state for the generation backend.
pub struct CredentialState {
    api_key: RwLock<Option<String>>,
    elevated: AtomicBool,
    selection_requested: AtomicBool,
}

impl CredentialState {
    /// Seed with the environment-provided key, if any. The default key runs
    /// at the free tier; only a user-installed key is treated as elevated.
    pub fn new(initial_key: Option<String>, elevated: bool) -> Self {
        Self {
            api_key: RwLock::new(initial_key.filter(|k| !k.is_empty())),
            elevated: AtomicBool::new(elevated),
            selection_requested: AtomicBool::new(false),
        }
    }

    /// Current API key, read fresh for every backend call.
    pub fn api_key(&self) -> Option<String> {
        self.api_key.read().clone()
    }

    /// Install a user-supplied key. Completing the selection flow is
    /// optimistically treated as granting elevated quota.
    pub fn install_key(&self, key: String) {
        *self.api_key.write() = Some(key);
        self.elevated.store(true, Ordering::SeqCst);
        self.selection_requested.store(false, Ordering::SeqCst);
    }

    pub fn has_elevated_quota(&self) -> bool {
        self.elevated.load(Ordering::SeqCst)
    }

    /// Demote to the standard tier. Called when the backend rejects the
    /// active credential.
    pub fn clear_elevated(&self) {
        self.elevated.store(false, Ordering::SeqCst);
    }

    /// Record that the user must go through key selection again.
    pub fn request_selection(&self) {
        self.selection_requested.store(true, Ordering::SeqCst);
    }

    pub fn selection_requested(&self) -> bool {
        self.selection_requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_key_elevates_and_clears_pending_selection() {
        let creds = CredentialState::new(None, false);
        assert!(!creds.has_elevated_quota());
        assert!(creds.api_key().is_none());

        creds.request_selection();
        assert!(creds.selection_requested());

        creds.install_key("user-key".to_string());
        assert!(creds.has_elevated_quota());
        assert!(!creds.selection_requested());
        assert_eq!(creds.api_key().as_deref(), Some("user-key"));
    }

    #[test]
    fn clear_elevated_keeps_key() {
        let creds = CredentialState::new(Some("env-key".to_string()), true);
        creds.clear_elevated();
        assert!(!creds.has_elevated_quota());
        assert_eq!(creds.api_key().as_deref(), Some("env-key"));
    }

    #[test]
    fn empty_initial_key_is_ignored() {
        let creds = CredentialState::new(Some(String::new()), false);
        assert!(creds.api_key().is_none());
    }
}
