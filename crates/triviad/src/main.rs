//! Triviad - Trivia question daemon
//!
//! Serves one request type: a valid, fresh, shuffled multiple-choice
//! question for a category and difficulty. Stays up no matter what
//! the text-generation backend does.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use triviad::config::Config;
use triviad::server::{self, AppState};
use trivia_common::{
    DedupTracker, FallbackBank, GenerationEngine, HttpTextGenerator, KeyValueStore,
    MemoryEdgeCache, QuestionPool, SourceResolver, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Triviad v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();

    // Durable dedup tier is optional: a broken database degrades to
    // request-scoped deduplication, it never stops the daemon
    let store: Option<Arc<dyn KeyValueStore>> = if config.dedup.enabled {
        match SqliteStore::open(PathBuf::from(&config.dedup.db_path)).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("Dedup store unavailable, degrading: {}", e);
                None
            }
        }
    } else {
        None
    };

    let dedup = Arc::new(DedupTracker::new(store, config.dedup_ttl()));
    let generator = Arc::new(HttpTextGenerator::new(config.generator_config()));
    let engine = Arc::new(GenerationEngine::new(
        generator,
        Arc::clone(&dedup),
        config.engine_config(),
    ));
    let pool = Arc::new(QuestionPool::new(config.pipeline.pool_capacity));
    let cache = Arc::new(MemoryEdgeCache::new(
        64,
        std::time::Duration::from_secs(config.pipeline.cache_stale_secs),
    ));

    let resolver = Arc::new(SourceResolver::new(
        pool,
        cache,
        engine,
        Arc::new(FallbackBank::builtin()),
        dedup,
        config.resolver_config(),
    ));

    let state = AppState::new(resolver, config.pipeline.recent_window);

    info!("Triviad ready");
    server::run(state, &config.server.bind_addr).await
}
