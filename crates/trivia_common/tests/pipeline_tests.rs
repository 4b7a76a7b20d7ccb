//! End-to-end resolution scenarios against fake collaborators.
//!
//! Covers the full source ladder: cache, warm pool, live generation,
//! and the static bank, plus the invariants every served question
//! must satisfy regardless of which source produced it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use trivia_common::cache::{CacheLookup, EdgeCache, MemoryEdgeCache};
use trivia_common::engine::EngineConfig;
use trivia_common::generator::{FakeResponse, FakeTextGenerator, GeneratorError};
use trivia_common::store::MemoryStore;
use trivia_common::validator;
use trivia_common::{
    DedupTracker, Difficulty, FallbackBank, GenerationEngine, GenerationRequest, QuestionPool,
    QuestionSource, Resolution, ResolverConfig, SourceResolver,
};

struct Pipeline {
    resolver: SourceResolver,
    pool: Arc<QuestionPool>,
    cache: Arc<MemoryEdgeCache>,
    generator: Arc<FakeTextGenerator>,
}

fn pipeline(generator: FakeTextGenerator, engine_config: EngineConfig) -> Pipeline {
    let generator = Arc::new(generator);
    let pool = Arc::new(QuestionPool::default());
    let cache = Arc::new(MemoryEdgeCache::default());
    let dedup = Arc::new(DedupTracker::new(
        Some(Arc::new(MemoryStore::new())),
        Duration::from_secs(3600),
    ));
    let engine = Arc::new(GenerationEngine::new(
        Arc::clone(&generator) as Arc<dyn trivia_common::TextGenerator>,
        Arc::clone(&dedup),
        engine_config,
    ));
    let resolver = SourceResolver::new(
        Arc::clone(&pool),
        Arc::clone(&cache) as Arc<dyn EdgeCache>,
        engine,
        Arc::new(FallbackBank::builtin()),
        dedup,
        ResolverConfig::default(),
    );
    Pipeline {
        resolver,
        pool,
        cache,
        generator,
    }
}

fn question_json(stem: &str, subject: &str) -> String {
    serde_json::json!({
        "question": stem,
        "choices": ["alpha", "bravo", "charlie", "delta"],
        "correct_index": 1,
        "explanation": "because",
        "answer_text": "bravo",
        "subject_matter": subject,
    })
    .to_string()
}

fn assert_valid(resolution: &Resolution, category: &str) {
    let q = &resolution.question;
    assert_eq!(q.choices.len(), 4);
    assert!(q.correct_index < q.choices.len());
    assert!(!q.choices[q.correct_index].is_empty());
    assert_eq!(validator::validate(q, category), Ok(()));
}

// Scenario: generation succeeds on the first try.
#[tokio::test]
async fn test_generated_question_served_with_relocated_answer() {
    let p = pipeline(
        FakeTextGenerator::always_text(question_json("Which letter comes after A?", "letters")),
        EngineConfig::default(),
    );
    let req = GenerationRequest::new("general", Difficulty::Easy, 7);

    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Generated);
    assert_valid(&resolution, "general");
    // correct_index follows the originally-correct text through the shuffle
    assert_eq!(
        resolution.question.choices[resolution.question.correct_index],
        "bravo"
    );
    assert_eq!(resolution.retries, 1);
}

// Scenario: the generation collaborator fails on every attempt.
#[tokio::test]
async fn test_fallback_when_generation_always_fails() {
    let p = pipeline(
        FakeTextGenerator::always_error(GeneratorError::Http("connection refused".to_string())),
        EngineConfig::default(),
    );
    let req = GenerationRequest::new("general", Difficulty::Easy, 7);

    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Fallback);
    assert_valid(&resolution, "general");
    assert!(resolution.last_error.unwrap().contains("connection refused"));
}

// Scenario: recent already contains the only matching bank entry.
#[tokio::test]
async fn test_bank_substitutes_when_all_entries_collide() {
    let p = pipeline(
        FakeTextGenerator::always_error(GeneratorError::Empty),
        EngineConfig::default(),
    );
    // history:medium has a single builtin entry
    let mut req = GenerationRequest::new("history", Difficulty::Medium, 3);
    req.recent = vec!["In which year did the Berlin Wall fall?".to_string()];

    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Fallback);
    assert_valid(&resolution, "history");
}

// Scenario: force_generate bypasses a populated pool.
#[tokio::test]
async fn test_force_generate_bypasses_pool() {
    let p = pipeline(
        FakeTextGenerator::always_text(question_json("Which letter comes after A?", "letters")),
        EngineConfig::default(),
    );
    let req = {
        let mut r = GenerationRequest::new("general", Difficulty::Easy, 7);
        r.force_generate = true;
        r
    };

    // Populate the pool for the same key
    let pooled: trivia_common::Question =
        serde_json::from_str(&question_json("A pooled question, unused?", "pooled")).unwrap();
    p.pool.push("general:easy", pooled);
    assert_eq!(p.pool.depth("general:easy"), 1);

    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Generated);
    assert!(p.generator.call_count() >= 1);
    // The pooled entry was never popped (generation also pushed a copy)
    assert!(p.pool.depth("general:easy") >= 1);
}

// Scenario: a duplicate subject within the TTL window is rejected and
// an alternate question is returned.
#[tokio::test]
async fn test_second_resolution_rejects_duplicate_subject() {
    let p = pipeline(
        FakeTextGenerator::new(vec![
            FakeResponse::Text(question_json("Which letter comes after A?", "letters")),
            FakeResponse::Text(question_json("Which letter comes after A?", "letters")),
            FakeResponse::Text(question_json("Which digit comes after one?", "digits")),
        ]),
        EngineConfig::default(),
    );
    let req = {
        let mut r = GenerationRequest::new("general", Difficulty::Easy, 7);
        // Bypass cache and pool so the tracker is what decides
        r.force_generate = true;
        r
    };

    let first = p.resolver.resolve(&req).await.unwrap();
    assert_eq!(first.question.subject_matter.as_deref(), Some("letters"));

    let second = p.resolver.resolve(&req).await.unwrap();
    assert_eq!(second.source, QuestionSource::Generated);
    assert_eq!(second.question.subject_matter.as_deref(), Some("digits"));
    assert_eq!(second.retries, 2);
}

// A warm pool entry is served directly and triggers a background
// replenishment that never blocks the response.
#[tokio::test]
async fn test_pool_hit_serves_and_replenishes() {
    let p = pipeline(
        FakeTextGenerator::always_text(question_json("Which digit comes after one?", "digits")),
        EngineConfig::default(),
    );
    let pooled: trivia_common::Question =
        serde_json::from_str(&question_json("Which letter comes after A?", "letters")).unwrap();
    p.pool.push("general:easy", pooled);

    let req = GenerationRequest::new("general", Difficulty::Easy, 7);
    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Pool);
    assert_valid(&resolution, "general");

    // The fire-and-forget replenishment eventually refills the pool
    for _ in 0..50 {
        if p.pool.depth("general:easy") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(p.generator.call_count() >= 1);
    assert!(p.pool.depth("general:easy") >= 1);
}

// A stale cache hit serves immediately and the background refresh
// replaces the cached entry, so later requests get the fresh question.
#[tokio::test]
async fn test_stale_cache_hit_revalidates_entry() {
    let p = pipeline(
        FakeTextGenerator::always_text(question_json("Which digit comes after one?", "digits")),
        EngineConfig::default(),
    );
    let aging: trivia_common::Question =
        serde_json::from_str(&question_json("Which letter comes after A?", "letters")).unwrap();
    // Zero TTL puts the entry past freshness but inside the stale window
    p.cache.put("general:easy", aging, Duration::ZERO).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let req = GenerationRequest::new("general", Difficulty::Easy, 7);
    let resolution = p.resolver.resolve(&req).await.unwrap();

    assert_eq!(resolution.source, QuestionSource::Cache);
    assert_eq!(resolution.question.question, "Which letter comes after A?");

    // The background refresh writes the fresh question back to the cache
    for _ in 0..100 {
        if let CacheLookup::Fresh(q) = p.cache.get("general:easy").await {
            assert_eq!(q.question, "Which digit comes after one?");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache entry was never revalidated");
}

// Property: an always-timing-out collaborator still terminates within
// the sum of the per-attempt budgets (plus scheduling slack).
#[tokio::test]
async fn test_termination_under_permanent_timeout() {
    let p = pipeline(
        FakeTextGenerator::always_hangs(),
        EngineConfig {
            max_tries: 3,
            attempt_budget: Duration::from_millis(50),
        },
    );
    let req = GenerationRequest::new("science", Difficulty::Medium, 11);

    let start = Instant::now();
    let resolution = p.resolver.resolve(&req).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(resolution.source, QuestionSource::Fallback);
    assert_valid(&resolution, "science");
    assert!(
        elapsed < Duration::from_secs(2),
        "resolution took {:?}",
        elapsed
    );
}

// Second request for the same key is served from cache or pool, not
// regenerated.
#[tokio::test]
async fn test_fast_path_after_generation() {
    let p = pipeline(
        FakeTextGenerator::always_text(question_json("Which letter comes after A?", "letters")),
        EngineConfig::default(),
    );
    let req = GenerationRequest::new("general", Difficulty::Easy, 7);

    let first = p.resolver.resolve(&req).await.unwrap();
    assert_eq!(first.source, QuestionSource::Generated);

    let second = p.resolver.resolve(&req).await.unwrap();
    assert_eq!(second.source, QuestionSource::Cache);
    assert_valid(&second, "general");
}

// Identical seed and pre-shuffle question give identical output order.
#[tokio::test]
async fn test_resolution_shuffle_is_deterministic() {
    for _ in 0..2 {
        let p = pipeline(
            FakeTextGenerator::always_text(question_json(
                "Which letter comes after A?",
                "letters",
            )),
            EngineConfig::default(),
        );
        let mut req = GenerationRequest::new("general", Difficulty::Easy, 1234);
        req.force_generate = true;

        let a = p.resolver.resolve(&req).await.unwrap();
        assert_eq!(
            a.question.choices,
            trivia_common::shuffle::shuffle_choices(
                &serde_json::from_str(&question_json("Which letter comes after A?", "letters"))
                    .unwrap(),
                1234
            )
            .choices
        );
    }
}
