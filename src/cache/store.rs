//! Two-tier in-memory cache for normalized upstream data.
//!
//! The **permanent** tier holds results that can no longer change (every game
//! final, date in the past) and never expires. The **volatile** tier holds
//! everything else with a per-entry TTL.
//!
//! There is no background reaper: expired volatile entries are swept on every
//! `put`, and an expired entry found by `get` is evicted on the spot.
//!
//! Deciding which tier a value belongs in is the fetch layer's job; the store
//! only guarantees that a permanent entry shadows a volatile one for the same key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::key::CacheKey;
use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Permanent,
    Volatile,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
    /// `None` for the permanent tier
    pub ttl: Option<Duration>,
    pub tier: Tier,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            None => true,
            // A clock that moved backwards counts as zero elapsed time.
            Some(ttl) => (now - self.stored_at).to_std().unwrap_or_default() < ttl,
        }
    }
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Permanent => "permanent",
            Tier::Volatile => "volatile",
        }
    }
}

/// Where a served value came from: a cache tier, or a fresh upstream fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOrigin {
    Permanent,
    Volatile,
    Upstream,
}

impl CacheOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOrigin::Permanent => "permanent",
            CacheOrigin::Volatile => "volatile",
            CacheOrigin::Upstream => "upstream",
        }
    }
}

impl From<Tier> for CacheOrigin {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Permanent => CacheOrigin::Permanent,
            Tier::Volatile => CacheOrigin::Volatile,
        }
    }
}

/// A value returned from the cache along with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub tier: Tier,
    pub stored_at: DateTime<Utc>,
}

/// Process-local, shareable tiered cache.
pub struct CacheStore<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        CacheStore {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

struct CacheInner<V> {
    permanent: HashMap<CacheKey, CacheEntry<V>>,
    volatile: HashMap<CacheKey, CacheEntry<V>>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        CacheStore {
            inner: Arc::new(RwLock::new(CacheInner {
                permanent: HashMap::new(),
                volatile: HashMap::new(),
            })),
            clock,
        }
    }

    /// Look up `key`. Permanent hits always return; volatile hits only while
    /// `now - stored_at < ttl`. An expired volatile entry is a miss and is evicted.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheHit<V>> {
        let now = self.clock.now();
        {
            let inner = self.inner.read().await;
            if let Some(entry) = inner.permanent.get(key) {
                debug!("cache hit (permanent): {}", key);
                return Some(hit(entry));
            }
            match inner.volatile.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    debug!("cache hit (volatile): {}", key);
                    return Some(hit(entry));
                }
                Some(_) => {}
                None => {
                    debug!("cache miss: {}", key);
                    return None;
                }
            }
        }

        let mut inner = self.inner.write().await;
        // Another writer may have refreshed it between the two locks.
        if inner
            .volatile
            .get(key)
            .is_some_and(|entry| !entry.is_fresh(now))
        {
            inner.volatile.remove(key);
            debug!("cache miss (expired, evicted): {}", key);
        }
        None
    }

    /// Store `value` under `key`. `ttl` is ignored for the permanent tier.
    /// A permanent write removes any volatile copy of the same key.
    pub async fn put(&self, key: CacheKey, value: V, tier: Tier, ttl: Duration) {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        match tier {
            Tier::Permanent => {
                if inner.volatile.remove(&key).is_some() {
                    debug!("cache promote: {}", key);
                }
                inner.permanent.insert(
                    key,
                    CacheEntry {
                        value,
                        stored_at: now,
                        ttl: None,
                        tier,
                    },
                );
            }
            Tier::Volatile => {
                inner.volatile.insert(
                    key,
                    CacheEntry {
                        value,
                        stored_at: now,
                        ttl: Some(ttl),
                        tier,
                    },
                );
            }
        }
        sweep_expired(&mut inner.volatile, now);
    }

    /// Remove every volatile entry whose TTL has elapsed. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        sweep_expired(&mut inner.volatile, now)
    }

    pub async fn is_permanent(&self, key: &CacheKey) -> bool {
        self.inner.read().await.permanent.contains_key(key)
    }

    /// (permanent, volatile) entry counts, expired entries included.
    pub async fn len(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.permanent.len(), inner.volatile.len())
    }
}

fn hit<V: Clone>(entry: &CacheEntry<V>) -> CacheHit<V> {
    CacheHit {
        value: entry.value.clone(),
        tier: entry.tier,
        stored_at: entry.stored_at,
    }
}

fn sweep_expired<V>(volatile: &mut HashMap<CacheKey, CacheEntry<V>>, now: DateTime<Utc>) -> usize {
    let before = volatile.len();
    volatile.retain(|_, entry| entry.is_fresh(now));
    let removed = before - volatile.len();
    if removed > 0 {
        debug!("cache sweep: {} expired volatile entries removed", removed);
    }
    removed
}
