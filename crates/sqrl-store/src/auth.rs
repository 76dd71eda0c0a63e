//! In-memory identity registry.

use std::collections::HashMap;
use std::sync::Mutex;

use sqrl_proto::SqrlIdentity;

use crate::{AuthStore, Result, StoreError};

/// The default auth store: a mutex-guarded map keyed by `idk`.
///
/// Suitable for demos and tests; a production deployment backs the
/// [`AuthStore`] trait with its account database. Concurrent updates to the
/// same identity are last-writer-wins, which the engine tolerates.
#[derive(Default)]
pub struct MemoryAuthStore {
    identities: Mutex<HashMap<String, SqrlIdentity>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(_: T) -> StoreError {
    StoreError::Backend("auth store lock poisoned".to_string())
}

impl AuthStore for MemoryAuthStore {
    fn find_identity(&self, idk: &str) -> Result<SqrlIdentity> {
        let identities = self.identities.lock().map_err(lock_err)?;
        identities.get(idk).cloned().ok_or(StoreError::NotFound)
    }

    fn save_identity(&self, identity: &SqrlIdentity) -> Result<()> {
        let mut identities = self.identities.lock().map_err(lock_err)?;
        identities.insert(identity.idk.clone(), identity.clone());
        Ok(())
    }

    fn delete_identity(&self, idk: &str) -> Result<()> {
        let mut identities = self.identities.lock().map_err(lock_err)?;
        identities.remove(idk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(idk: &str) -> SqrlIdentity {
        SqrlIdentity {
            idk: idk.to_string(),
            suk: "suk".to_string(),
            vuk: "vuk".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_find() {
        let store = MemoryAuthStore::new();
        store.save_identity(&identity("alice")).expect("save");

        let found = store.find_identity("alice").expect("find");
        assert_eq!(found.idk, "alice");
        assert_eq!(found.suk, "suk");
    }

    #[test]
    fn test_find_unknown() {
        let store = MemoryAuthStore::new();
        assert!(matches!(
            store.find_identity("nobody"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_save_replaces() {
        let store = MemoryAuthStore::new();
        store.save_identity(&identity("alice")).expect("save");

        let mut updated = identity("alice");
        updated.disabled = true;
        store.save_identity(&updated).expect("save");

        assert!(store.find_identity("alice").expect("find").disabled);
    }

    #[test]
    fn test_delete() {
        let store = MemoryAuthStore::new();
        store.save_identity(&identity("alice")).expect("save");
        store.delete_identity("alice").expect("delete");
        assert!(matches!(
            store.find_identity("alice"),
            Err(StoreError::NotFound)
        ));
        // Deleting an absent identity is not an error.
        store.delete_identity("alice").expect("delete again");
    }
}
