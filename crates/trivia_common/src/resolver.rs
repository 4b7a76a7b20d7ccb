//! Source resolution: cache, pool, generation, bank, in that order.
//!
//! `resolve` never fails except for the optional advisory rate limit.
//! Every collaborator error is downgraded to "this source is
//! unavailable, try the next", and the fallback bank always succeeds,
//! so the state machine always reaches `Done` with a question.
//!
//! Whatever branch wins, the question is shuffled and recorded with
//! the dedup tracker before it is returned.

use crate::bank::FallbackBank;
use crate::cache::{CacheLookup, EdgeCache};
use crate::dedup::{self, DedupTracker};
use crate::engine::GenerationEngine;
use crate::pool::QuestionPool;
use crate::shuffle;
use crate::types::{GenerationRequest, QuestionSource, Resolution};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TTL for edge-cache writes after a successful generation.
    pub cache_ttl: Duration,
    /// Write freshly generated questions to the edge cache.
    pub write_cache: bool,
    /// Advisory per-caller lock. Never required for correctness.
    pub advisory_lock_enabled: bool,
    pub advisory_lock_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(120),
            write_cache: true,
            advisory_lock_enabled: false,
            advisory_lock_ttl: Duration::from_millis(2500),
        }
    }
}

/// The only user-visible failure: a rapid duplicate submission hit the
/// advisory lock. Callers should retry after the hint.
#[derive(Debug, Clone, Error)]
#[error("rate limited, retry in {retry_after:?}")]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// Resolution state machine. `Done` is implicit in breaking the loop
/// with a question and source tag.
enum ResolveState {
    CacheCheck,
    PoolCheck,
    Generate,
    Fallback,
}

pub struct SourceResolver {
    pool: Arc<QuestionPool>,
    cache: Arc<dyn EdgeCache>,
    engine: Arc<GenerationEngine>,
    bank: Arc<FallbackBank>,
    dedup: Arc<DedupTracker>,
    config: ResolverConfig,
    /// Advisory lock expiries, keyed by caller:category:difficulty
    locks: Mutex<HashMap<String, Instant>>,
}

impl SourceResolver {
    pub fn new(
        pool: Arc<QuestionPool>,
        cache: Arc<dyn EdgeCache>,
        engine: Arc<GenerationEngine>,
        bank: Arc<FallbackBank>,
        dedup: Arc<DedupTracker>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            pool,
            cache,
            engine,
            bank,
            dedup,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one request to a validated, shuffled, recorded question.
    pub async fn resolve(&self, req: &GenerationRequest) -> Result<Resolution, RateLimited> {
        self.try_advisory_lock(req)?;

        let key = req.pool_key();
        let mut state = if req.force_generate {
            ResolveState::Generate
        } else {
            ResolveState::CacheCheck
        };
        let mut retries = 0;
        let mut last_error = None;

        let (question, source) = loop {
            match state {
                ResolveState::CacheCheck => {
                    match self.cache.get(&key).await {
                        CacheLookup::Fresh(q) if !dedup::collides_with_recent(&q, &req.recent) => {
                            break (q, QuestionSource::Cache);
                        }
                        CacheLookup::Stale(q) if !dedup::collides_with_recent(&q, &req.recent) => {
                            // Serve stale, refresh behind the response
                            self.spawn_replenish(req, true);
                            break (q, QuestionSource::Cache);
                        }
                        _ => state = ResolveState::PoolCheck,
                    }
                }
                ResolveState::PoolCheck => {
                    match self.pool.pop_non_colliding(&key, &req.recent) {
                        Some(q) => {
                            self.spawn_replenish(req, false);
                            break (q, QuestionSource::Pool);
                        }
                        None => state = ResolveState::Generate,
                    }
                }
                ResolveState::Generate => {
                    let report = self.engine.attempt(req).await;
                    retries = report.tries;
                    last_error = report.last_error;
                    match report.question {
                        Some(q) => {
                            self.pool.push(&key, q.clone());
                            if self.config.write_cache {
                                self.cache.put(&key, q.clone(), self.config.cache_ttl).await;
                            }
                            break (q, QuestionSource::Generated);
                        }
                        None => {
                            debug!("Generation exhausted for {}, falling back", key);
                            state = ResolveState::Fallback;
                        }
                    }
                }
                ResolveState::Fallback => {
                    break (
                        self.bank.select(&key, &req.recent, req.seed),
                        QuestionSource::Fallback,
                    );
                }
            }
        };

        let shuffled = shuffle::shuffle_choices(&question, req.seed);
        self.dedup
            .record(&req.category, req.difficulty, &shuffled)
            .await;

        info!(
            "Resolved {} from {} ({} tries)",
            key,
            source.as_str(),
            retries
        );

        Ok(Resolution {
            question: shuffled,
            source,
            retries,
            last_error,
            pool_depth: self.pool.depth(&key),
        })
    }

    /// Fire-and-forget pool top-up. Failures never reach the caller.
    /// With `refresh_cache` the fresh question also replaces the edge
    /// cache entry, so a stale hit is actually revalidated.
    fn spawn_replenish(&self, req: &GenerationRequest, refresh_cache: bool) {
        let engine = Arc::clone(&self.engine);
        let pool = Arc::clone(&self.pool);
        let cache = Arc::clone(&self.cache);
        let cache_ttl = self.config.cache_ttl;
        let write_cache = refresh_cache && self.config.write_cache;

        let mut replenish_req = req.clone();
        replenish_req.seed = rand::random();
        replenish_req.force_generate = false;
        let key = replenish_req.pool_key();

        tokio::spawn(async move {
            let report = engine.attempt(&replenish_req).await;
            match report.question {
                Some(q) => {
                    if write_cache {
                        cache.put(&key, q.clone(), cache_ttl).await;
                    }
                    pool.push(&key, q);
                    debug!("Replenished pool for {}", key);
                }
                None => {
                    debug!(
                        "Pool replenishment for {} failed: {:?}",
                        key, report.last_error
                    );
                }
            }
        });
    }

    fn try_advisory_lock(&self, req: &GenerationRequest) -> Result<(), RateLimited> {
        if !self.config.advisory_lock_enabled {
            return Ok(());
        }
        let caller = match &req.caller_id {
            Some(c) => c,
            None => return Ok(()),
        };

        let lock_key = format!("{}:{}", caller, req.pool_key());
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|_, expires| *expires > now);

        if let Some(expires) = locks.get(&lock_key) {
            let retry_after = expires.saturating_duration_since(now);
            warn!("Advisory lock engaged for {}", lock_key);
            return Err(RateLimited { retry_after });
        }

        locks.insert(lock_key, now + self.config.advisory_lock_ttl);
        Ok(())
    }
}
