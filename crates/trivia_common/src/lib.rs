//! Trivia Common - The question acquisition pipeline.
//!
//! One job: produce a valid, fresh, shuffled multiple-choice question
//! for a category and difficulty, no matter how the text-generation
//! collaborator behaves. Sources are tried in priority order (edge
//! cache, warm pool, live generation, static bank) and every result
//! passes validation, seeded shuffling, and dedup recording.

pub mod bank;
pub mod cache;
pub mod dedup;
pub mod engine;
pub mod generator;
pub mod json_extract;
pub mod pool;
pub mod prompts;
pub mod resolver;
pub mod shuffle;
pub mod store;
pub mod types;
pub mod validator;

pub use bank::FallbackBank;
pub use cache::{CacheLookup, EdgeCache, MemoryEdgeCache};
pub use dedup::DedupTracker;
pub use engine::{EngineConfig, GenerationEngine};
pub use generator::{
    FakeTextGenerator, GeneratorConfig, GeneratorError, HttpTextGenerator, TextGenerator,
};
pub use pool::QuestionPool;
pub use resolver::{RateLimited, ResolverConfig, SourceResolver};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::{
    Difficulty, DictionaryMode, GenerationRequest, Question, QuestionSource, Resolution,
};
