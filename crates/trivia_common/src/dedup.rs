//! Two-tier deduplication of served questions.
//!
//! Tier 1 (request-scoped, fuzzy): compares a candidate against the
//! caller-supplied `recent` list with normalized-text heuristics.
//! Tier 2 (cross-request, exact): hashed subject keys in a durable
//! key-value store with a TTL of days, supplemented by an in-process
//! recency set between store round-trips.
//!
//! The store is optional; when it is missing or erroring the tracker
//! degrades to request-scoped checking. Never a fatal error.

use crate::store::KeyValueStore;
use crate::types::{Difficulty, Question};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Default persistence TTL for dedup records.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// In-process recency set bound; trimmed to the newest half past this.
const RECENCY_SET_MAX: usize = 1000;

/// Minimum normalized length for substring containment to count.
const CONTAINMENT_MIN_LEN: usize = 12;

/// Length ratio (shorter/longer) above which containment is a collision.
const CONTAINMENT_RATIO: f64 = 0.5;

/// Minimum length for a bare word to count as a subject token.
const LONG_WORD_MIN_LEN: usize = 8;

/// Canonical dedup subject for a question: classification fields when
/// present, otherwise the normalized stem.
pub fn subject_of(q: &Question) -> String {
    for field in [&q.subject_matter, &q.topic_key, &q.headword] {
        if let Some(value) = field {
            let normalized = normalize(value);
            if !normalized.is_empty() {
                return normalized;
            }
        }
    }
    normalize(&q.question)
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Exact dedup key: sha256 over `category:difficulty:subject`.
pub fn subject_key(category: &str, difficulty: Difficulty, subject: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(difficulty.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(subject.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fuzzy collision between a candidate and one previously served text.
fn texts_collide(candidate_norm: &str, candidate_raw: &str, recent_raw: &str) -> bool {
    let recent_norm = normalize(recent_raw);
    if candidate_norm.is_empty() || recent_norm.is_empty() {
        return false;
    }

    if candidate_norm == recent_norm {
        return true;
    }

    // Long substring containment above a similarity threshold
    let (shorter, longer) = if candidate_norm.len() <= recent_norm.len() {
        (candidate_norm, recent_norm.as_str())
    } else {
        (recent_norm.as_str(), candidate_norm)
    };
    if shorter.len() >= CONTAINMENT_MIN_LEN
        && longer.contains(shorter)
        && (shorter.len() as f64) / (longer.len() as f64) >= CONTAINMENT_RATIO
    {
        return true;
    }

    // Shared quoted or long-word subject token
    let candidate_tokens = subject_tokens(candidate_raw);
    if candidate_tokens.is_empty() {
        return false;
    }
    subject_tokens(recent_raw)
        .iter()
        .any(|t| candidate_tokens.contains(t))
}

/// Tokens likely to name the question's subject: quoted spans and
/// unusually long bare words.
fn subject_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for quote in ['\'', '"'] {
        let mut parts = text.split(quote);
        // Every second fragment is inside quotes
        parts.next();
        while let Some(inside) = parts.next() {
            let normalized = normalize(inside);
            if !normalized.is_empty() && normalized.len() <= 64 {
                tokens.push(normalized);
            }
            parts.next();
        }
    }

    for word in normalize(text).split(' ') {
        if word.len() >= LONG_WORD_MIN_LEN {
            tokens.push(word.to_string());
        }
    }

    tokens.sort();
    tokens.dedup();
    tokens
}

/// Does the candidate collide with anything in the caller's `recent` list?
pub fn collides_with_recent(q: &Question, recent: &[String]) -> bool {
    let subject = subject_of(q);
    let stem_norm = normalize(&q.question);
    recent.iter().any(|r| {
        texts_collide(&subject, &q.question, r) || texts_collide(&stem_norm, &q.question, r)
    })
}

/// Cross-request dedup tracker.
pub struct DedupTracker {
    store: Option<Arc<dyn KeyValueStore>>,
    ttl: Duration,
    recent_keys: Mutex<VecDeque<String>>,
}

impl DedupTracker {
    pub fn new(store: Option<Arc<dyn KeyValueStore>>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            recent_keys: Mutex::new(VecDeque::new()),
        }
    }

    /// Tracker without a durable tier (request-scoped + in-process only).
    pub fn ephemeral() -> Self {
        Self::new(None, DEFAULT_DEDUP_TTL)
    }

    /// Pre-check: was this subject already served for the key?
    pub async fn check(&self, category: &str, difficulty: Difficulty, q: &Question) -> bool {
        let key = subject_key(category, difficulty, &subject_of(q));

        if self.recent_keys.lock().unwrap().contains(&key) {
            return true;
        }

        if let Some(store) = &self.store {
            match store.get(&key).await {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(e) => {
                    // Soft failure: degrade to the in-process tier
                    warn!("Dedup store read failed, degrading: {}", e);
                }
            }
        }

        false
    }

    /// Record a served question. Called once per response, post-shuffle.
    pub async fn record(&self, category: &str, difficulty: Difficulty, q: &Question) {
        let subject = subject_of(q);
        let key = subject_key(category, difficulty, &subject);

        {
            let mut keys = self.recent_keys.lock().unwrap();
            keys.push_back(key.clone());
            if keys.len() > RECENCY_SET_MAX {
                // Keep the newest half
                let keep_from = keys.len() / 2;
                let kept: VecDeque<String> = keys.split_off(keep_from);
                *keys = kept;
                debug!("Trimmed dedup recency set to {} entries", keys.len());
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.put(&key, &subject, self.ttl).await {
                warn!("Dedup store write failed: {}", e);
            }
        }
    }
}
