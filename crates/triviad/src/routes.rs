//! API routes for triviad.
//!
//! One request type: give me a question. Everything in the body is
//! optional and defaulted, so `{}` is a valid request. The only
//! non-200 path is the advisory rate limit.

use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use trivia_common::{Difficulty, GenerationRequest, Question, QuestionSource};
use uuid::Uuid;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Question Routes
// ============================================================================

/// Request body; every field has a server-side default. Unrecognized
/// or mistyped values are recovered by defaulting, never rejected, so
/// `{"difficulty": "expert"}` is treated like an absent difficulty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub recent: Vec<String>,
    #[serde(default, deserialize_with = "lenient_seed")]
    pub seed: Option<u64>,
    #[serde(default, rename = "forceGen")]
    pub force_generate: bool,
    #[serde(default)]
    pub caller_id: Option<String>,
}

fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Option<Difficulty>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_seed<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64())
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub question: Question,
    pub source: QuestionSource,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub pool_depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub retry_after_ms: u64,
}

pub fn question_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/question", post(get_question))
}

async fn get_question(
    State(state): State<AppStateArc>,
    Json(req): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>, (StatusCode, Json<RateLimitedResponse>)> {
    let start = Instant::now();

    // Input errors are recovered by defaulting, never surfaced
    let mut recent = req.recent;
    if recent.len() > state.recent_window {
        // Keep the most recent entries
        recent = recent.split_off(recent.len() - state.recent_window);
    }

    let request = GenerationRequest {
        category: req
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "general".to_string()),
        difficulty: req.difficulty.unwrap_or_default(),
        recent,
        seed: req.seed.unwrap_or_else(rand::random),
        force_generate: req.force_generate,
        caller_id: req.caller_id,
    };

    let resolution = state.resolver.resolve(&request).await.map_err(|e| {
        let body = RateLimitedResponse {
            error: "try again shortly".to_string(),
            retry_after_ms: e.retry_after.as_millis() as u64,
        };
        (StatusCode::TOO_MANY_REQUESTS, Json(body))
    })?;

    info!(
        "[Q]  {} {} from {} in {}ms",
        request.category,
        request.difficulty,
        resolution.source.as_str(),
        start.elapsed().as_millis()
    );

    Ok(Json(QuestionResponse {
        id: Uuid::new_v4(),
        question: resolution.question,
        source: resolution.source,
        retries: resolution.retries,
        last_error: resolution.last_error.map(truncate_error),
        pool_depth: resolution.pool_depth,
    }))
}

/// Keep diagnostic errors transport-friendly.
fn truncate_error(e: String) -> String {
    const MAX: usize = 200;
    if e.len() <= MAX {
        e
    } else {
        let mut cut = MAX;
        while !e.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &e[..cut])
    }
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
