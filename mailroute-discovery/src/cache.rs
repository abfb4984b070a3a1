//! Expiring caches for name-resolution results.
//!
//! Every record kind gets its own [`TtlMap`]. Entries expire a fixed time
//! after they were written; an expired entry reads as a miss and is removed
//! by the next [`ResolutionCache::sweep`].
//!
//! Maps are backed by `DashMap`, so readers and writers on different keys do
//! not contend and a reader never sees a half-written entry.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use dashmap::DashMap;
use mailroute_common::tracing;
use tokio::{task::JoinHandle, time::Instant};

/// Default lifetime of a cached answer (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    written: Instant,
}

/// A concurrent map whose entries expire `ttl` after they were written.
#[derive(Debug)]
pub struct TtlMap<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached value if it is younger than the TTL.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        (entry.written.elapsed() < self.ttl).then(|| entry.value.clone())
    }

    /// Stores `value`, replacing any previous entry and restarting its clock.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                written: Instant::now(),
            },
        );
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.written.elapsed() < self.ttl;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-kind caches shared by every resolver and derivation call.
#[derive(Debug)]
pub struct ResolutionCache {
    mail_exchangers: TtlMap<Arc<[String]>>,
    addresses: TtlMap<bool>,
    canonical_names: TtlMap<String>,
    service_targets: TtlMap<Arc<[String]>>,
    policy_records: TtlMap<bool>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResolutionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            mail_exchangers: TtlMap::new(ttl),
            addresses: TtlMap::new(ttl),
            canonical_names: TtlMap::new(ttl),
            service_targets: TtlMap::new(ttl),
            policy_records: TtlMap::new(ttl),
        }
    }

    /// MX hosts by domain, in preference order.
    #[must_use]
    pub const fn mail_exchangers(&self) -> &TtlMap<Arc<[String]>> {
        &self.mail_exchangers
    }

    /// Whether a host has an A or AAAA record.
    #[must_use]
    pub const fn addresses(&self) -> &TtlMap<bool> {
        &self.addresses
    }

    /// CNAME target by host.
    #[must_use]
    pub const fn canonical_names(&self) -> &TtlMap<String> {
        &self.canonical_names
    }

    /// SRV targets by queried service name.
    #[must_use]
    pub const fn service_targets(&self) -> &TtlMap<Arc<[String]>> {
        &self.service_targets
    }

    /// Whether a TXT marker (SPF, DKIM) was present, by queried name.
    #[must_use]
    pub const fn policy_records(&self) -> &TtlMap<bool> {
        &self.policy_records
    }

    /// Sweeps every kind and returns the total number of entries dropped.
    pub fn sweep(&self) -> usize {
        let removed = self.mail_exchangers.sweep()
            + self.addresses.sweep()
            + self.canonical_names.sweep()
            + self.service_targets.sweep()
            + self.policy_records.sweep();

        if removed > 0 {
            tracing::debug!(removed, "Swept expired resolution cache entries");
        }
        removed
    }

    /// Sweeps the cache every `interval` until the cache is dropped or the
    /// returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    tracing::debug!("Resolution cache dropped, stopping sweeper");
                    return;
                };
                cache.sweep();
            }
        })
    }
}
