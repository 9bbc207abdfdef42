//! Process-local TTL response cache
//!
//! Memoizes successful read responses keyed by method + path + sorted query
//! string. Single instance shared across the request pipeline:
//! - TTL chosen by path shape (detail paths cache longer than collections)
//! - Pattern invalidation (substring match) and full clear
//! - Periodic expiry sweep driven by the caller
//!
//! The cache is best-effort and never a source of truth; it is safe to clear
//! at any time. The clock is injected so tests can control time without real
//! delays.

pub mod keys;

pub use keys::{cache_key, has_bypass_flag};

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// TTL for "detail" paths (more than 2 non-empty segments), in milliseconds.
pub const DETAIL_TTL_MS: u64 = 600_000;

/// TTL for "collection" paths, in milliseconds.
pub const COLLECTION_TTL_MS: u64 = 300_000;

/// Interval between expiry sweeps, in milliseconds.
pub const SWEEP_INTERVAL_MS: u64 = 60_000;

/// Millisecond clock source, injectable for tests.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A cached response payload with the metadata needed to rebuild it.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub payload: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
struct CacheEntry {
    payload: Bytes,
    content_type: String,
    created_at_ms: u64,
    ttl_ms: u64,
}

impl CacheEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.ttl_ms
    }
}

/// Process-wide response cache. Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// TTL heuristic: detail paths (a resource plus an identifier) get the
    /// longer freshness window, bare collection paths the shorter one. A
    /// leading `api`/`vN` mount prefix does not count as resource segments,
    /// so the split survives being mounted under `/api/v1`.
    pub fn ttl_for_path(path: &str) -> u64 {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek() == Some(&"api") {
            segments.next();
            if segments.peek().is_some_and(|s| is_version_segment(s)) {
                segments.next();
            }
        }
        if segments.count() > 1 {
            DETAIL_TTL_MS
        } else {
            COLLECTION_TTL_MS
        }
    }

    /// Returns the cached payload for `key`, or `None` on miss or expiry.
    /// Expired entries are not served; physical removal is left to `sweep`.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(self.clock.now_millis()) {
            return None;
        }
        Some(CachedResponse {
            payload: entry.payload.clone(),
            content_type: entry.content_type.clone(),
        })
    }

    /// Stores `payload` under `key` with a TTL derived from `path`.
    pub fn set(&self, key: String, path: &str, payload: Bytes, content_type: String) {
        let ttl_ms = Self::ttl_for_path(path);
        debug!(key = %key, ttl_ms, "cache set");
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                content_type,
                created_at_ms: self.clock.now_millis(),
                ttl_ms,
            },
        );
    }

    /// With no pattern, clears the whole cache; with a pattern, removes every
    /// key containing it as a substring.
    pub fn invalidate(&self, pattern: Option<&str>) {
        match pattern {
            None => {
                self.entries.clear();
                debug!("cache cleared");
            }
            Some(pat) => {
                let before = self.entries.len();
                self.entries.retain(|key, _| !key.contains(pat));
                // Concurrent inserts during retain can leave len() above the
                // snapshot, so the difference must not underflow.
                let removed = before.saturating_sub(self.entries.len());
                debug!(pattern = %pat, removed, "cache invalidated");
            }
        }
    }

    /// Removes all entries whose age exceeds their TTL. Returns the number of
    /// entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "cache sweep removed expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockClock(AtomicU64);

    impl MockClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for Arc<MockClock> {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn mock_cache() -> (ResponseCache, Arc<MockClock>) {
        let clock = Arc::new(MockClock(AtomicU64::new(0)));
        let cache = ResponseCache::with_clock(Arc::new(clock.clone()));
        (cache, clock)
    }

    fn body(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get_returns_payload() {
        let (cache, _clock) = mock_cache();
        let key = cache_key("GET", "/api/v1/listings", "");
        cache.set(key.clone(), "/api/v1/listings", body("[]"), "application/json".into());

        let hit = cache.get(&key).expect("fresh entry should be served");
        assert_eq!(hit.payload, body("[]"));
        assert_eq!(hit.content_type, "application/json");
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let (cache, clock) = mock_cache();
        let key = cache_key("GET", "/api/v1/listings", "");
        cache.set(key.clone(), "/api/v1/listings", body("[]"), "application/json".into());

        clock.advance(COLLECTION_TTL_MS + 1);
        assert!(cache.get(&key).is_none());
        // Entry still physically present until a sweep runs.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entry_at_exact_ttl_is_still_fresh() {
        let (cache, clock) = mock_cache();
        let key = cache_key("GET", "/api/v1/listings", "");
        cache.set(key.clone(), "/api/v1/listings", body("x"), "application/json".into());

        clock.advance(COLLECTION_TTL_MS);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn detail_paths_get_longer_ttl() {
        assert_eq!(ResponseCache::ttl_for_path("/listings"), COLLECTION_TTL_MS);
        assert_eq!(ResponseCache::ttl_for_path("/listings/abc-123"), DETAIL_TTL_MS);
    }

    #[test]
    fn mount_prefix_does_not_promote_collections_to_detail_ttl() {
        assert_eq!(
            ResponseCache::ttl_for_path("/api/v1/listings"),
            COLLECTION_TTL_MS
        );
        assert_eq!(
            ResponseCache::ttl_for_path("/api/v1/listings/abc-123"),
            DETAIL_TTL_MS
        );
        assert_eq!(
            ResponseCache::ttl_for_path("/api/v12/listings"),
            COLLECTION_TTL_MS
        );
        // "api" alone is only skipped as a mount prefix, never a bare "vN"
        assert_eq!(ResponseCache::ttl_for_path("/v1/listings"), DETAIL_TTL_MS);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let (cache, clock) = mock_cache();
        let stale = cache_key("GET", "/listings", "");
        cache.set(stale.clone(), "/listings", body("old"), "application/json".into());

        clock.advance(COLLECTION_TTL_MS + 1);
        let fresh = cache_key("GET", "/listings", "take=5");
        cache.set(fresh.clone(), "/listings", body("new"), "application/json".into());

        assert_eq!(cache.sweep(), 1);
        assert!(cache.get(&stale).is_none());
        assert!(cache.get(&fresh).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_survives_concurrent_inserts() {
        let (cache, clock) = mock_cache();
        for i in 0..256 {
            cache.set(
                format!("GET:/listings?i={i}"),
                "/listings",
                body("stale"),
                "application/json".into(),
            );
        }
        clock.advance(COLLECTION_TTL_MS + 1);

        // Writer races the sweeps; removed counts must never underflow even
        // when entries land mid-retain.
        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..2048 {
                    cache.set(
                        format!("GET:/listings/{i}"),
                        "/listings/fresh",
                        body("fresh"),
                        "application/json".into(),
                    );
                }
            })
        };
        for _ in 0..64 {
            cache.sweep();
            cache.invalidate(Some("?i="));
        }
        writer.join().expect("writer thread panicked");

        cache.sweep();
        assert_eq!(cache.len(), 2048);
    }

    #[test]
    fn invalidate_without_pattern_clears_everything() {
        let (cache, _clock) = mock_cache();
        cache.set(
            cache_key("GET", "/listings", ""),
            "/listings",
            body("a"),
            "application/json".into(),
        );
        cache.set(
            cache_key("GET", "/contact-channels", ""),
            "/contact-channels",
            body("b"),
            "application/json".into(),
        );

        cache.invalidate(None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_with_pattern_removes_matching_keys_only() {
        let (cache, _clock) = mock_cache();
        let listings = cache_key("GET", "/api/v1/listings", "city=Recife");
        let contact = cache_key("GET", "/api/v1/contact-channels", "");
        cache.set(listings.clone(), "/api/v1/listings", body("a"), "application/json".into());
        cache.set(
            contact.clone(),
            "/api/v1/contact-channels",
            body("b"),
            "application/json".into(),
        );

        cache.invalidate(Some("/listings"));
        assert!(cache.get(&listings).is_none());
        assert!(cache.get(&contact).is_some());
    }
}
