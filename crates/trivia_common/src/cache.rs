//! Edge cache collaborator.
//!
//! Fast-path lookup of one last-known-good question per
//! `category:difficulty` key, with an expiry plus a stale-while-
//! revalidate window. The trait keeps the concrete cache external to
//! the pipeline; the bundled implementation is an in-process LRU for
//! single-node deployments and tests.

use crate::types::Question;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry within its TTL.
    Fresh(Question),
    /// Entry past TTL but inside the stale-while-revalidate window;
    /// serveable, but the caller should refresh in the background.
    Stale(Question),
    Miss,
}

/// External edge/response cache boundary.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheLookup;
    async fn put(&self, key: &str, q: Question, ttl: Duration);
}

struct CacheEntry {
    question: Question,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

/// In-process LRU edge cache.
pub struct MemoryEdgeCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    stale_window: Duration,
}

impl MemoryEdgeCache {
    pub fn new(max_keys: usize, stale_window: Duration) -> Self {
        let cap = NonZeroUsize::new(max_keys.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            stale_window,
        }
    }
}

impl Default for MemoryEdgeCache {
    fn default() -> Self {
        Self::new(64, Duration::from_secs(300))
    }
}

#[async_trait]
impl EdgeCache for MemoryEdgeCache {
    async fn get(&self, key: &str) -> CacheLookup {
        let mut entries = self.entries.lock().unwrap();
        let entry = match entries.get(key) {
            Some(e) => e,
            None => return CacheLookup::Miss,
        };

        let age = (Utc::now() - entry.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        if age <= entry.ttl {
            CacheLookup::Fresh(entry.question.clone())
        } else if age <= entry.ttl + self.stale_window {
            CacheLookup::Stale(entry.question.clone())
        } else {
            entries.pop(key);
            CacheLookup::Miss
        }
    }

    async fn put(&self, key: &str, q: Question, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.put(
            key.to_string(),
            CacheEntry {
                question: q,
                stored_at: Utc::now(),
                ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(stem: &str) -> Question {
        Question {
            question: stem.to_string(),
            choices: vec![
                "a1".to_string(),
                "b2".to_string(),
                "c3".to_string(),
                "d4".to_string(),
            ],
            correct_index: 0,
            explanation: String::new(),
            headword: None,
            mode: None,
            answer_text: None,
            topic_key: None,
            subject_matter: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_hit() {
        let cache = MemoryEdgeCache::default();
        cache
            .put("general:easy", question("a cached question?"), Duration::from_secs(60))
            .await;
        match cache.get("general:easy").await {
            CacheLookup::Fresh(q) => assert_eq!(q.question, "a cached question?"),
            other => panic!("expected fresh hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let cache = MemoryEdgeCache::default();
        assert_eq!(cache.get("no:such").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_expired_entry_is_stale_within_window() {
        let cache = MemoryEdgeCache::new(8, Duration::from_secs(300));
        cache
            .put("k", question("an old question?"), Duration::ZERO)
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        match cache.get("k").await {
            CacheLookup::Stale(q) => assert_eq!(q.question, "an old question?"),
            other => panic!("expected stale hit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_entry_past_stale_window_is_a_miss() {
        let cache = MemoryEdgeCache::new(8, Duration::ZERO);
        cache.put("k", question("a dead question?"), Duration::ZERO).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await, CacheLookup::Miss);
    }
}
