//! Core types for the question acquisition pipeline.
//!
//! A `Question` is the unit everything else moves around: generated by
//! the LLM, pooled, cached, validated, shuffled, and finally served.

use serde::{Deserialize, Serialize};

/// Question difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dictionary question mode (only meaningful for the `dictionary` category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryMode {
    Definition,
    Synonym,
}

impl DictionaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DictionaryMode::Definition => "definition",
            DictionaryMode::Synonym => "synonym",
        }
    }
}

/// A multiple-choice trivia question.
///
/// Invariant: `choices[correct_index]` is the factually correct entry,
/// and when `answer_text` is set it equals that entry case-insensitively.
/// The validator enforces this; the shuffler preserves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,

    /// Dictionary category: the word being asked about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headword: Option<String>,
    /// Dictionary category: definition or synonym question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DictionaryMode>,
    /// Redundant copy of the correct choice text, used for cross-checking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    /// Short topic identifier, preferred dedup subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_matter: Option<String>,
}

impl Question {
    /// Text of the correct choice, if `correct_index` is in bounds.
    pub fn correct_choice(&self) -> Option<&str> {
        self.choices.get(self.correct_index).map(|s| s.as_str())
    }
}

/// One resolution request, immutable for the duration of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub category: String,
    pub difficulty: Difficulty,
    /// Previously served question texts/subjects, most recent kept
    pub recent: Vec<String>,
    pub seed: u64,
    pub force_generate: bool,
    /// Optional caller identity for the advisory lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(category: impl Into<String>, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            category: category.into(),
            difficulty,
            recent: Vec::new(),
            seed,
            force_generate: false,
            caller_id: None,
        }
    }

    /// Key used for the pool, edge cache, and dedup partitions.
    pub fn pool_key(&self) -> String {
        format!("{}:{}", self.category, self.difficulty)
    }
}

/// Where a served question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    Cache,
    Pool,
    Generated,
    Fallback,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Cache => "cache",
            QuestionSource::Pool => "pool",
            QuestionSource::Generated => "generated",
            QuestionSource::Fallback => "fallback",
        }
    }
}

/// Terminal state of a resolution: a validated, shuffled, recorded
/// question plus provenance and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub question: Question,
    pub source: QuestionSource,
    /// Generation attempts consumed (0 when served from cache/pool/bank)
    pub retries: u32,
    /// Last generation failure, truncated for transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Warm pool depth for the requested key after resolution
    pub pool_depth: usize,
}
