//! Cache layer (spec §4.1): a unified mapping from key to value-with-TTL,
//! backed by an in-process map and optionally mirrored to a remote KV
//! store, plus a best-effort distributed lock and a durable
//! stale-fallback recall store.

mod fallback_store;
mod kv;
mod lock;

pub use fallback_store::{FallbackStore, StaleFallbackEntry, MAX_RECENT_HASHES};
pub use kv::{Cache, HttpRemoteCache, RemoteCache};
pub use lock::{DistributedLock, LockHandle};
