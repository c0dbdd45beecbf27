//! Per-accessory serialization

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use mox_protocol::AccessoryKey;

type LockMap = DashMap<AccessoryKey, Arc<Mutex<()>>>;

/// One async mutex per accessory key
///
/// Holding the guard across a lookup, send and save keeps the
/// read-modify-write of one accessory from interleaving with another
/// worker touching the same key. Different keys never block each other.
///
/// Entries only live while someone holds or waits on them, so keys seen
/// once from the network do not accumulate.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Arc<LockMap>,
}

impl KeyLocks {
    pub(crate) async fn lock(&self, key: AccessoryKey) -> KeyGuard {
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive hold on one accessory key, evicted from the map on drop
/// when nobody else is queued behind it
#[derive(Debug)]
pub(crate) struct KeyGuard {
    key: AccessoryKey,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc count only reflects the map
        // and any waiters.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mox_protocol::{ChannelId, ModuleId};
    use std::time::Duration;

    fn key(channel: u8) -> AccessoryKey {
        AccessoryKey::new(ModuleId::new(0, 0, 1), ChannelId::new(channel))
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::default());
        let guard = locks.lock(key(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(key(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire the lock")
            .unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLocks::default();
        let _first = locks.lock(key(1)).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(key(2))).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_evicted() {
        let locks = KeyLocks::default();
        for channel in 0..=255u8 {
            let _guard = locks.lock(key(channel)).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(KeyLocks::default());
        let guard = locks.lock(key(7)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(key(7)).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        // The waiter still holds a clone of the mutex, so the entry stays.
        assert_eq!(locks.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(locks.len(), 0);
    }
}
