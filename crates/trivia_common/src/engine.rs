//! Bounded, retried question generation.
//!
//! Each attempt derives its own seed, races the generator against a
//! time budget, then runs the extraction ladder, the validator, and
//! the dedup pre-check. Outcomes are inspected by one uniform driver
//! loop; there is no special-casing buried inside the attempt body
//! except the documented final-attempt collision acceptance.
//!
//! Exhausting all attempts is not an error: the engine reports
//! "no result" and the resolver falls through to the bank.

use crate::dedup::{self, DedupTracker};
use crate::generator::{GeneratorError, TextGenerator};
use crate::json_extract::{self, ExtractError};
use crate::prompts;
use crate::types::{GenerationRequest, Question};
use crate::validator::{self, ValidationReason};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Prime stride between attempt seeds: retries are reproducible but
/// sample differently from one another.
pub const SEED_STRIDE: u64 = 7919;

/// Why one attempt failed. Every variant is retryable.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator unavailable: {0}")]
    Collaborator(#[from] GeneratorError),

    #[error("no question object in output: {0}")]
    Parse(#[from] ExtractError),

    #[error("output does not match the question schema: {0}")]
    Schema(String),

    #[error("validation rejected candidate: {0}")]
    Validation(#[from] ValidationReason),

    #[error("duplicate subject collision")]
    Duplicate,
}

/// Per-attempt result inspected by the driver loop.
enum AttemptOutcome {
    Success(Question),
    Retry(AttemptError),
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_tries: u32,
    /// Budget for one generator call; the call is abandoned (not
    /// cancelled) when it elapses.
    pub attempt_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            attempt_budget: Duration::from_secs(4),
        }
    }
}

/// Outcome of a full attempt run, with diagnostics for the response.
#[derive(Debug)]
pub struct AttemptReport {
    pub question: Option<Question>,
    pub tries: u32,
    pub last_error: Option<String>,
}

pub struct GenerationEngine {
    generator: Arc<dyn TextGenerator>,
    dedup: Arc<DedupTracker>,
    config: EngineConfig,
}

impl GenerationEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        dedup: Arc<DedupTracker>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator,
            dedup,
            config,
        }
    }

    /// Drive up to `max_tries` attempts. `None` question means the
    /// caller should fall through to the next source.
    pub async fn attempt(&self, req: &GenerationRequest) -> AttemptReport {
        let mut last_error = None;

        for i in 0..self.config.max_tries {
            let is_last = i + 1 == self.config.max_tries;
            match self.run_attempt(req, i, is_last).await {
                AttemptOutcome::Success(q) => {
                    return AttemptReport {
                        question: Some(q),
                        tries: i + 1,
                        last_error,
                    };
                }
                AttemptOutcome::Retry(e) => {
                    debug!("Generation attempt {} failed: {}", i, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        AttemptReport {
            question: None,
            tries: self.config.max_tries,
            last_error,
        }
    }

    async fn run_attempt(
        &self,
        req: &GenerationRequest,
        attempt: u32,
        is_last: bool,
    ) -> AttemptOutcome {
        let seed = req.seed.wrapping_add(attempt as u64 * SEED_STRIDE);
        let prompt = prompts::build_generation_prompt(req);

        let call = self.generator.generate(&prompt, seed);
        let raw = match tokio::time::timeout(self.config.attempt_budget, call).await {
            // Budget elapsed: abandon the attempt, the underlying call
            // may keep running detached
            Err(_) => return AttemptOutcome::Retry(AttemptError::Timeout(self.config.attempt_budget)),
            Ok(Err(e)) => return AttemptOutcome::Retry(e.into()),
            Ok(Ok(text)) => text,
        };

        let value = match json_extract::extract_json_object(&raw) {
            Ok(v) => v,
            Err(e) => return AttemptOutcome::Retry(e.into()),
        };

        let mut question: Question = match serde_json::from_value(value) {
            Ok(q) => q,
            Err(e) => return AttemptOutcome::Retry(AttemptError::Schema(e.to_string())),
        };

        validator::normalize_defaults(&mut question, &req.category);
        if let Err(reason) = validator::validate(&question, &req.category) {
            return AttemptOutcome::Retry(reason.into());
        }

        let collides = dedup::collides_with_recent(&question, &req.recent)
            || self
                .dedup
                .check(&req.category, req.difficulty, &question)
                .await;
        if collides {
            if is_last {
                // Accept rather than fail the whole request: bounded
                // latency wins over perfect novelty here
                warn!(
                    "Serving duplicate subject on final attempt for {}",
                    req.pool_key()
                );
            } else {
                return AttemptOutcome::Retry(AttemptError::Duplicate);
            }
        }

        AttemptOutcome::Success(question)
    }
}
