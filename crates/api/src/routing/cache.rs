//! In-memory resolution cache with TTL
//!
//! Caches hostname-to-tenant resolutions to keep Domain Store reads off the
//! hot request path. Never authoritative: the store remains the source of
//! truth, and TTL expiry is the backstop when an explicit invalidation is
//! missed (e.g. a mutation in another process).

use classhq_shared::TenantId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::resolver::ResolvedTenant;

/// Default TTL for positive entries
const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default TTL for negative entries. Kept short so misses caused by a store
/// outage or a just-added domain recover quickly.
const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(10);

/// A settled resolution outcome, as cached
#[derive(Clone)]
pub enum CachedResolution {
    Found(ResolvedTenant),
    NotFound,
}

struct CacheEntry {
    resolution: CachedResolution,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Thread-safe resolution cache.
///
/// Reads take the lock briefly and clone the snapshot out, so concurrent
/// readers see either the old or the new mapping, never a partial one.
pub struct ResolutionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    negative_ttl: Duration,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL, DEFAULT_NEGATIVE_TTL)
    }

    pub fn with_ttl(ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            negative_ttl,
        }
    }

    /// Get the cached resolution for a hostname, if present and fresh
    pub fn get(&self, hostname: &str) -> Option<CachedResolution> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(hostname)?;
        if entry.is_expired() {
            None
        } else {
            Some(entry.resolution.clone())
        }
    }

    /// Cache a successful resolution
    pub fn insert(&self, hostname: &str, resolved: ResolvedTenant) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                hostname.to_string(),
                CacheEntry {
                    resolution: CachedResolution::Found(resolved),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    /// Cache a miss (hostname owned by no tenant) with the short TTL
    pub fn insert_negative(&self, hostname: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                hostname.to_string(),
                CacheEntry {
                    resolution: CachedResolution::NotFound,
                    expires_at: Instant::now() + self.negative_ttl,
                },
            );
        }
    }

    /// Drop the entry for a specific hostname
    pub fn invalidate(&self, hostname: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(hostname);
        }
    }

    /// Drop every entry resolving to a tenant (plan change, deactivation)
    pub fn invalidate_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| match &entry.resolution {
                CachedResolution::Found(resolved) => resolved.tenant.id != tenant_id,
                CachedResolution::NotFound => true,
            });
        }
    }

    /// Clear expired entries (called periodically for memory management)
    pub fn purge_expired(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| !entry.is_expired());
        }
    }

    /// Cache statistics for the admin surface
    pub fn stats(&self) -> CacheStats {
        if let Ok(entries) = self.entries.read() {
            let total = entries.len();
            let expired = entries.values().filter(|e| e.is_expired()).count();
            CacheStats {
                total_entries: total,
                expired_entries: expired,
                active_entries: total - expired,
            }
        } else {
            CacheStats::default()
        }
    }
}

/// Cache statistics
#[derive(Default, Debug, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use classhq_shared::{DomainKind, PlanTier, VerificationState};
    use std::thread::sleep;

    use crate::store::MemoryStore;

    fn resolved(hostname: &str) -> ResolvedTenant {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            hostname,
            DomainKind::Custom,
            VerificationState::Verified,
        );
        ResolvedTenant { tenant, domain }
    }

    fn found_tenant(cached: CachedResolution) -> ResolvedTenant {
        match cached {
            CachedResolution::Found(r) => r,
            CachedResolution::NotFound => panic!("expected a positive entry"),
        }
    }

    #[test]
    fn test_cache_get_insert() {
        let cache = ResolutionCache::new();
        assert!(cache.get("a.example.com").is_none());

        cache.insert("a.example.com", resolved("a.example.com"));
        let hit = found_tenant(cache.get("a.example.com").unwrap());
        assert_eq!(hit.domain.hostname, "a.example.com");
    }

    #[test]
    fn test_cache_negative() {
        let cache = ResolutionCache::new();
        cache.insert_negative("unknown.example.com");
        assert!(matches!(
            cache.get("unknown.example.com"),
            Some(CachedResolution::NotFound)
        ));
    }

    #[test]
    fn test_cache_expiration() {
        let cache = ResolutionCache::with_ttl(Duration::from_millis(50), Duration::from_millis(50));
        cache.insert("a.example.com", resolved("a.example.com"));
        assert!(cache.get("a.example.com").is_some());

        sleep(Duration::from_millis(60));
        assert!(cache.get("a.example.com").is_none());
    }

    #[test]
    fn test_negative_ttl_is_separate() {
        let cache = ResolutionCache::with_ttl(Duration::from_secs(60), Duration::from_millis(50));
        cache.insert("slow.example.com", resolved("slow.example.com"));
        cache.insert_negative("unknown.example.com");

        sleep(Duration::from_millis(60));
        // The negative entry expired; the positive one is still fresh
        assert!(cache.get("unknown.example.com").is_none());
        assert!(cache.get("slow.example.com").is_some());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = ResolutionCache::new();
        cache.insert("a.example.com", resolved("a.example.com"));
        cache.invalidate("a.example.com");
        assert!(cache.get("a.example.com").is_none());
    }

    #[test]
    fn test_cache_invalidate_tenant() {
        let cache = ResolutionCache::new();
        let a = resolved("a.example.com");
        let tenant_id = a.tenant.id;
        let mut b = a.clone();
        b.domain.hostname = "b.example.com".to_string();
        let c = resolved("c.example.com");

        cache.insert("a.example.com", a);
        cache.insert("b.example.com", b);
        cache.insert("c.example.com", c);

        cache.invalidate_tenant(tenant_id);

        assert!(cache.get("a.example.com").is_none());
        assert!(cache.get("b.example.com").is_none());
        assert!(cache.get("c.example.com").is_some());
    }

    #[test]
    fn test_purge_and_stats() {
        let cache = ResolutionCache::with_ttl(Duration::from_secs(60), Duration::from_millis(10));
        cache.insert("a.example.com", resolved("a.example.com"));
        cache.insert_negative("gone.example.com");

        sleep(Duration::from_millis(20));
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.active_entries, 1);

        cache.purge_expired();
        assert_eq!(cache.stats().total_entries, 1);
    }
}
