//! Best-effort distributed lock on top of the unified [`Cache`].

use std::time::Duration;

use crate::cache::kv::Cache;

/// A held lock. Dropping this does not release the lock — call
/// [`DistributedLock::release`] explicitly, since release requires an
/// async round-trip to the cache.
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub key: String,
    pub owner: String,
}

pub struct DistributedLock;

impl DistributedLock {
    /// Attempt to acquire `key` for `owner` with the given TTL. Returns
    /// `None` if another owner currently holds it.
    pub async fn acquire(cache: &Cache, key: &str, owner: &str, ttl_sec: u64) -> Option<LockHandle> {
        let lock_key = format!("lock:{key}");
        if let Some(existing) = cache.get_string(&lock_key).await {
            if existing != owner {
                return None;
            }
        }
        cache.set_string(&lock_key, owner, Some(ttl_sec)).await;
        Some(LockHandle {
            key: lock_key,
            owner: owner.to_string(),
        })
    }

    /// Release only removes the entry when the stored owner token
    /// matches (spec §4.1).
    pub async fn release(cache: &Cache, handle: &LockHandle) {
        if cache.get_string(&handle.key).await.as_deref() == Some(handle.owner.as_str()) {
            cache.del(&handle.key).await;
        }
    }

    /// Poll the cache briefly for another worker's result at
    /// `result_key`, used when the lock is held elsewhere (spec §4.4
    /// step 7, §5 "waiter polls the cache briefly for the other
    /// holder's result").
    pub async fn poll_for_result<T>(
        cache: &Cache,
        result_key: &str,
        attempts: u32,
        interval: Duration,
    ) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        for _ in 0..attempts {
            if let Some(value) = cache.get_value::<T>(result_key).await {
                return Some(value);
            }
            tokio::time::sleep(interval).await;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_owner_is_refused_while_held() {
        let cache = Cache::new();
        let first = DistributedLock::acquire(&cache, "reasoner:x", "worker-1", 30)
            .await
            .unwrap();
        assert!(DistributedLock::acquire(&cache, "reasoner:x", "worker-2", 30)
            .await
            .is_none());
        DistributedLock::release(&cache, &first).await;
        assert!(DistributedLock::acquire(&cache, "reasoner:x", "worker-2", 30)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn release_is_noop_for_mismatched_owner() {
        let cache = Cache::new();
        let handle = DistributedLock::acquire(&cache, "reasoner:y", "worker-1", 30)
            .await
            .unwrap();
        let forged = LockHandle {
            key: handle.key.clone(),
            owner: "worker-2".to_string(),
        };
        DistributedLock::release(&cache, &forged).await;
        assert!(DistributedLock::acquire(&cache, "reasoner:y", "worker-2", 30)
            .await
            .is_none());
    }
}
