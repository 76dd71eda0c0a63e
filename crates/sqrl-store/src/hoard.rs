//! In-memory hoard.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sqrl_crypto::Nut;

use crate::{Hoard, HoardCache, Result, StoreError};

struct Entry {
    expires_at: Instant,
    cache: HoardCache,
}

/// The default hoard: a mutex-guarded map with per-entry deadlines.
///
/// Expired entries answer `NotFound` immediately; their memory is wiped and
/// reclaimed lazily, on the save path.
#[derive(Default)]
pub struct MemoryHoard {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryHoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_err<T>(_: T) -> StoreError {
    StoreError::Backend("hoard lock poisoned".to_string())
}

impl Hoard for MemoryHoard {
    fn save(&self, nut: &Nut, cache: HoardCache, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().map_err(lock_err)?;

        // Lazy sweep: wipe and drop anything past its deadline.
        entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                entry.cache.clear();
            }
            live
        });

        entries.insert(
            nut.as_str().to_string(),
            Entry {
                expires_at: now + ttl,
                cache,
            },
        );
        Ok(())
    }

    fn get(&self, nut: &Nut) -> Result<HoardCache> {
        let entries = self.entries.lock().map_err(lock_err)?;
        match entries.get(nut.as_str()) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.cache.clone()),
            _ => Err(StoreError::NotFound),
        }
    }

    fn get_and_delete(&self, nut: &Nut) -> Result<HoardCache> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        match entries.remove(nut.as_str()) {
            Some(mut entry) => {
                if entry.expires_at > Instant::now() {
                    Ok(entry.cache)
                } else {
                    entry.cache.clear();
                    Err(StoreError::NotFound)
                }
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::SessionState;

    fn cache_for(ip: &str) -> HoardCache {
        HoardCache {
            remote_ip: ip.to_string(),
            ..Default::default()
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_save_and_get() {
        let hoard = MemoryHoard::new();
        let nut: Nut = "abc".into();
        hoard.save(&nut, cache_for("10.0.0.1"), TTL).expect("save");

        let cache = hoard.get(&nut).expect("get");
        assert_eq!(cache.remote_ip, "10.0.0.1");
        assert_eq!(cache.state, SessionState::Issued);
        // get does not consume.
        hoard.get(&nut).expect("still present");
    }

    #[test]
    fn test_get_and_delete_consumes() {
        let hoard = MemoryHoard::new();
        let nut: Nut = "abc".into();
        hoard.save(&nut, cache_for("10.0.0.1"), TTL).expect("save");

        hoard.get_and_delete(&nut).expect("first take");
        assert!(matches!(
            hoard.get_and_delete(&nut),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_unknown_nut() {
        let hoard = MemoryHoard::new();
        assert!(matches!(
            hoard.get(&"missing".into()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_expiry() {
        let hoard = MemoryHoard::new();
        let nut: Nut = "abc".into();
        hoard
            .save(&nut, cache_for("ip"), Duration::from_millis(10))
            .expect("save");

        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(hoard.get(&nut), Err(StoreError::NotFound)));
        assert!(matches!(
            hoard.get_and_delete(&nut),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_sweep_reclaims_expired() {
        let hoard = MemoryHoard::new();
        hoard
            .save(&"old".into(), cache_for("ip"), Duration::from_millis(1))
            .expect("save");
        std::thread::sleep(Duration::from_millis(10));

        hoard.save(&"new".into(), cache_for("ip"), TTL).expect("save");
        assert_eq!(hoard.len(), 1);
    }

    #[test]
    fn test_overwrite_same_nut() {
        let hoard = MemoryHoard::new();
        let nut: Nut = "abc".into();
        hoard.save(&nut, cache_for("first"), TTL).expect("save");
        hoard.save(&nut, cache_for("second"), TTL).expect("save");
        assert_eq!(hoard.get(&nut).expect("get").remote_ip, "second");
    }

    #[test]
    fn test_concurrent_get_and_delete_single_winner() {
        let hoard = Arc::new(MemoryHoard::new());
        let nut: Nut = "contested".into();
        hoard.save(&nut, cache_for("ip"), TTL).expect("save");

        let wins = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hoard = hoard.clone();
                let nut = nut.clone();
                let wins = wins.clone();
                std::thread::spawn(move || {
                    if hoard.get_and_delete(&nut).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
