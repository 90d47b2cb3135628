//! Two-tier cache: an in-process map, optionally mirrored to a remote
//! key-value store. Grounded on the teacher's `llm::cache::PromptCache`
//! (TTL-keyed `HashMap` behind a lock, hit/miss bookkeeping) generalised
//! to string/value/increment per spec §4.1.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Utc::now())
    }
}

/// Optional remote mirror. A thin trait so tests can swap in a fake
/// without a live HTTP endpoint; production uses `HttpRemoteCache`.
#[async_trait::async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64>;
}

/// `reqwest`-backed remote cache speaking a minimal REST KV protocol.
pub struct HttpRemoteCache {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpRemoteCache {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl RemoteCache for HttpRemoteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(format!("{}/get/{key}", self.endpoint))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::cache(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::cache(e.to_string()))?;
        Ok(body["result"].as_str().map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut body = serde_json::json!({ "value": value });
        if let Some(ttl) = ttl {
            body["ex"] = serde_json::json!(ttl.as_secs());
        }
        self.http
            .post(format!("{}/set/{key}", self.endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::cache(e.to_string()))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.http
            .post(format!("{}/del/{key}", self.endpoint))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::cache(e.to_string()))?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        let resp = self
            .http
            .post(format!("{}/incr/{key}", self.endpoint))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::cache(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| Error::cache(e.to_string()))?;
        let value = body["result"].as_i64().unwrap_or(0);
        if value == 1 {
            if let Some(ttl) = ttl {
                let _ = self.set(&format!("{key}:ttl-sentinel"), "1", Some(ttl)).await;
            }
        }
        Ok(value)
    }
}

/// Unified cache: in-process map always present, remote mirror optional.
/// On any remote error, falls back silently to the in-process map (§4.1).
pub struct Cache {
    local: RwLock<HashMap<String, Entry>>,
    remote: Option<Arc<dyn RemoteCache>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: None,
        }
    }

    pub fn with_remote(remote: Arc<dyn RemoteCache>) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: Some(remote),
        }
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        if let Some(remote) = &self.remote {
            if let Ok(Some(v)) = remote.get(key).await {
                return Some(v);
            }
        }
        let mut local = self.local.write().await;
        match local.get(key) {
            Some(entry) if entry.is_expired() => {
                local.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub async fn set_string(&self, key: &str, value: &str, ttl_sec: Option<u64>) {
        let ttl = ttl_sec.map(Duration::from_secs);
        if let Some(remote) = &self.remote {
            if remote.set(key, value, ttl).await.is_ok() {
                return;
            }
        }
        let expires_at = ttl_sec.map(|s| Utc::now() + chrono::Duration::seconds(s as i64));
        self.local.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub async fn del(&self, key: &str) {
        if let Some(remote) = &self.remote {
            let _ = remote.del(key).await;
        }
        self.local.write().await.remove(key);
    }

    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_string(key).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set_value<T: Serialize>(&self, key: &str, value: &T, ttl_sec: Option<u64>) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_string(key, &raw, ttl_sec).await;
        Ok(())
    }

    /// Atomic increment. Sets the TTL only when the key is freshly
    /// created (spec §4.1: "when a key is freshly created by increment,
    /// its TTL is set").
    pub async fn increment(&self, key: &str, ttl_sec: Option<u64>) -> i64 {
        if let Some(remote) = &self.remote {
            if let Ok(v) = remote.increment(key, ttl_sec.map(Duration::from_secs)).await {
                return v;
            }
        }
        let mut local = self.local.write().await;
        match local.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                let next: i64 = entry.value.parse().unwrap_or(0) + 1;
                entry.value = next.to_string();
                next
            }
            _ => {
                let expires_at = ttl_sec.map(|s| Utc::now() + chrono::Duration::seconds(s as i64));
                local.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at,
                    },
                );
                1
            }
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::new();
        cache.set_string("k", "v", None).await;
        assert_eq!(cache.get_string("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_are_deleted_on_access() {
        let cache = Cache::new();
        cache.set_string("k", "v", Some(0)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get_string("k").await, None);
    }

    #[tokio::test]
    async fn increment_sets_ttl_only_on_creation() {
        let cache = Cache::new();
        assert_eq!(cache.increment("counter", Some(60)).await, 1);
        assert_eq!(cache.increment("counter", Some(60)).await, 2);
    }

    #[tokio::test]
    async fn value_round_trips_through_json() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Plan {
            variants: Vec<String>,
        }
        let cache = Cache::new();
        let plan = Plan {
            variants: vec!["a".into(), "b".into()],
        };
        cache.set_value("plan:1", &plan, Some(60)).await.unwrap();
        let round_tripped: Option<Plan> = cache.get_value("plan:1").await;
        assert_eq!(round_tripped, Some(plan));
    }
}
