//! Warm pool of ready-made questions.
//!
//! Per-`category:difficulty` bounded FIFO, process-local and ephemeral.
//! Losing it on restart is fine: the pool is a latency optimization,
//! never the source of correctness. Concurrent pop/push races are
//! tolerated; persistent dedup is the authoritative guard.

use crate::dedup;
use crate::types::Question;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default per-key capacity.
pub const DEFAULT_POOL_CAPACITY: usize = 6;

pub struct QuestionPool {
    entries: Mutex<HashMap<String, VecDeque<Question>>>,
    capacity: usize,
}

impl Default for QuestionPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl QuestionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a question unless an identical stem is already pooled.
    /// Evicts the oldest entry when over capacity.
    pub fn push(&self, key: &str, q: Question) {
        let mut entries = self.entries.lock().unwrap();
        let queue = entries.entry(key.to_string()).or_default();

        if queue.iter().any(|existing| existing.question == q.question) {
            return;
        }

        queue.push_back(q);
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }

    /// Remove and return the earliest entry.
    pub fn pop(&self, key: &str) -> Option<Question> {
        let mut entries = self.entries.lock().unwrap();
        entries.get_mut(key).and_then(|queue| queue.pop_front())
    }

    /// Pop the first entry that does not collide with `recent`,
    /// discarding colliding entries along the way. The scan is bounded
    /// by the configured capacity, so every pooled entry is reachable.
    pub fn pop_non_colliding(&self, key: &str, recent: &[String]) -> Option<Question> {
        for _ in 0..self.capacity {
            let candidate = self.pop(key)?;
            if !dedup::collides_with_recent(&candidate, recent) {
                return Some(candidate);
            }
            // Colliding entry is discarded, try the next one
        }
        None
    }

    /// Current depth for a key.
    pub fn depth(&self, key: &str) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|q| q.len()).unwrap_or(0)
    }
}
