//! Credential persistence and sign-out cleanup.

use std::sync::Arc;

use tracing::info;

use gather_shared::constants::{
    KEY_AUTH_TOKEN, KEY_PREFIX_ATTENDING, KEY_PREFIX_EVENT_DETAIL, KEY_PREFIX_QUERY_CACHE,
    KEY_PREFIX_STARRED,
};
use gather_shared::Credential;

use crate::persist::PersistedStore;

/// Stores the signed-in credential and knows how to erase everything a
/// session left behind.
pub struct SessionStore {
    store: Arc<PersistedStore>,
}

impl SessionStore {
    pub fn new(store: Arc<PersistedStore>) -> Self {
        Self { store }
    }

    /// The persisted credential, if any.  The real/demo split is decided
    /// here, once, at load time.
    pub fn credential(&self) -> Option<Credential> {
        let token: String = self.store.get_json(KEY_AUTH_TOKEN)?;
        Some(Credential::from_token(&token))
    }

    pub fn set_credential(&self, cred: &Credential) {
        self.store.set_json(KEY_AUTH_TOKEN, &cred.token());
    }

    /// Remove the credential and every per-user cache blob.  The shared
    /// query-cache snapshot goes too: it may contain viewer-specific
    /// lists.
    pub fn clear(&self) {
        self.store.remove(KEY_AUTH_TOKEN);
        self.store.remove_matching_prefix(KEY_PREFIX_STARRED);
        self.store.remove_matching_prefix(KEY_PREFIX_ATTENDING);
        self.store.remove_matching_prefix(KEY_PREFIX_EVENT_DETAIL);
        self.store.remove_matching_prefix(KEY_PREFIX_QUERY_CACHE);
        info!("session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_round_trip() {
        let store = Arc::new(PersistedStore::in_memory());
        let session = SessionStore::new(Arc::clone(&store));

        assert!(session.credential().is_none());

        session.set_credential(&Credential::from_token("tok_abc"));
        let cred = session.credential().unwrap();
        assert!(!cred.is_demo());
        assert_eq!(cred.token(), "tok_abc");

        session.set_credential(&Credential::from_token("demo_xyz"));
        assert!(session.credential().unwrap().is_demo());
    }

    #[test]
    fn clear_erases_per_user_blobs() {
        let store = Arc::new(PersistedStore::in_memory());
        let session = SessionStore::new(Arc::clone(&store));

        session.set_credential(&Credential::from_token("tok"));
        store.set_json("starred_events_cache_5", &vec![1i64]);
        store.set_json("event_detail_cache_9", &"blob");
        store.set_json("unrelated_key", &"stays");

        session.clear();

        assert!(session.credential().is_none());
        assert!(store.get_json::<Vec<i64>>("starred_events_cache_5").is_none());
        assert!(store.get_json::<String>("event_detail_cache_9").is_none());
        assert_eq!(store.get_json::<String>("unrelated_key").unwrap(), "stays");
    }
}
