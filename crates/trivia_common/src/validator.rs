//! Candidate question validation.
//!
//! Structural checks first, then category-specific rules. Validation
//! returns a diagnostic reason instead of failing hard; the attempt
//! engine treats any reason as a retryable rejection. Missing optional
//! classification fields are defaulted, never rejected.

use crate::types::{DictionaryMode, Question};
use thiserror::Error;

/// Stem length window, in characters.
const MIN_QUESTION_LEN: usize = 8;
const MAX_QUESTION_LEN: usize = 200;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("question text length {0} outside {MIN_QUESTION_LEN}..={MAX_QUESTION_LEN}")]
    QuestionLength(usize),

    #[error("expected {expected} choices, got {got}")]
    ChoiceCount { expected: usize, got: usize },

    #[error("choice {0} is empty")]
    EmptyChoice(usize),

    #[error("choices {0} and {1} are duplicates")]
    DuplicateChoices(usize, usize),

    #[error("correct_index {index} out of bounds for {len} choices")]
    CorrectIndexOutOfBounds { index: usize, len: usize },

    #[error("answer_text does not match choices[correct_index]")]
    AnswerTextMismatch,

    #[error("dictionary question missing headword")]
    MissingHeadword,

    #[error("dictionary question missing mode")]
    MissingMode,

    #[error("question stem does not reference the headword")]
    StemMissingHeadword,

    #[error("question stem does not reference the {0} mode")]
    StemMissingMode(&'static str),

    #[error("synonym choice {0} is not a single token")]
    SynonymChoiceNotSingleToken(usize),

    #[error("synonym answer equals the headword")]
    SynonymAnswerIsHeadword,

    #[error("definition choice {0} is not a multi-word phrase")]
    DefinitionChoiceNotPhrase(usize),

    #[error("definition choice {0} equals the headword")]
    DefinitionChoiceIsHeadword(usize),
}

/// Structural strictness. The default profile demands exactly four
/// choices; looser profiles accept any count at or above a floor.
#[derive(Debug, Clone, Copy)]
pub struct ValidationProfile {
    pub exact_choices: Option<usize>,
    pub min_choices: usize,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            exact_choices: Some(4),
            min_choices: 2,
        }
    }
}

impl ValidationProfile {
    /// Accept any choice count >= 2 instead of exactly four.
    pub fn loose() -> Self {
        Self {
            exact_choices: None,
            min_choices: 2,
        }
    }
}

/// Fill in optional classification fields so downstream code never
/// sees missing metadata. Does not touch anything validation checks.
pub fn normalize_defaults(q: &mut Question, category: &str) {
    if q.explanation.trim().is_empty() {
        q.explanation = "No explanation provided.".to_string();
    }
    if q.topic_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
        q.topic_key = Some(category.to_string());
    }
    if q
        .subject_matter
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        q.subject_matter = None;
    }
}

/// Validate a candidate with the default profile.
pub fn validate(q: &Question, category: &str) -> Result<(), ValidationReason> {
    validate_with_profile(q, category, ValidationProfile::default())
}

/// Validate a candidate question for `category`.
pub fn validate_with_profile(
    q: &Question,
    category: &str,
    profile: ValidationProfile,
) -> Result<(), ValidationReason> {
    let stem_len = q.question.trim().chars().count();
    if stem_len < MIN_QUESTION_LEN || stem_len > MAX_QUESTION_LEN {
        return Err(ValidationReason::QuestionLength(stem_len));
    }

    if let Some(expected) = profile.exact_choices {
        if q.choices.len() != expected {
            return Err(ValidationReason::ChoiceCount {
                expected,
                got: q.choices.len(),
            });
        }
    } else if q.choices.len() < profile.min_choices {
        return Err(ValidationReason::ChoiceCount {
            expected: profile.min_choices,
            got: q.choices.len(),
        });
    }

    for (i, choice) in q.choices.iter().enumerate() {
        if choice.trim().is_empty() {
            return Err(ValidationReason::EmptyChoice(i));
        }
    }

    // Pairwise distinct, case-insensitively
    for i in 0..q.choices.len() {
        for j in (i + 1)..q.choices.len() {
            if q.choices[i].trim().eq_ignore_ascii_case(q.choices[j].trim()) {
                return Err(ValidationReason::DuplicateChoices(i, j));
            }
        }
    }

    if q.correct_index >= q.choices.len() {
        return Err(ValidationReason::CorrectIndexOutOfBounds {
            index: q.correct_index,
            len: q.choices.len(),
        });
    }

    // answer_text mismatch is a rejection, never auto-corrected
    if let Some(answer) = &q.answer_text {
        let correct = &q.choices[q.correct_index];
        if !answer.trim().eq_ignore_ascii_case(correct.trim()) {
            return Err(ValidationReason::AnswerTextMismatch);
        }
    }

    if category.eq_ignore_ascii_case("dictionary") {
        validate_dictionary(q)?;
    }

    Ok(())
}

/// Category extension for `dictionary` questions.
fn validate_dictionary(q: &Question) -> Result<(), ValidationReason> {
    let headword = match q.headword.as_deref().map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return Err(ValidationReason::MissingHeadword),
    };
    let mode = q.mode.ok_or(ValidationReason::MissingMode)?;

    let stem_lower = q.question.to_lowercase();
    if !stem_lower.contains(&headword.to_lowercase()) {
        return Err(ValidationReason::StemMissingHeadword);
    }
    if !stem_lower.contains(mode.as_str()) {
        return Err(ValidationReason::StemMissingMode(mode.as_str()));
    }

    match mode {
        DictionaryMode::Synonym => {
            for (i, choice) in q.choices.iter().enumerate() {
                if choice.trim().split_whitespace().count() != 1 {
                    return Err(ValidationReason::SynonymChoiceNotSingleToken(i));
                }
            }
            if q.choices[q.correct_index]
                .trim()
                .eq_ignore_ascii_case(headword)
            {
                return Err(ValidationReason::SynonymAnswerIsHeadword);
            }
        }
        DictionaryMode::Definition => {
            for (i, choice) in q.choices.iter().enumerate() {
                if choice.trim().split_whitespace().count() < 2 {
                    return Err(ValidationReason::DefinitionChoiceNotPhrase(i));
                }
                if choice.trim().eq_ignore_ascii_case(headword) {
                    return Err(ValidationReason::DefinitionChoiceIsHeadword(i));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_question() -> Question {
        Question {
            question: "Which planet is known as the Red Planet?".to_string(),
            choices: vec![
                "Mars".to_string(),
                "Venus".to_string(),
                "Jupiter".to_string(),
                "Mercury".to_string(),
            ],
            correct_index: 0,
            explanation: "Iron oxide gives Mars its color.".to_string(),
            headword: None,
            mode: None,
            answer_text: Some("Mars".to_string()),
            topic_key: Some("planets".to_string()),
            subject_matter: Some("Mars".to_string()),
        }
    }

    #[test]
    fn test_valid_question_passes() {
        assert_eq!(validate(&valid_question(), "general"), Ok(()));
    }

    #[test]
    fn test_short_stem_rejected() {
        let mut q = valid_question();
        q.question = "Short?".to_string();
        assert!(matches!(
            validate(&q, "general"),
            Err(ValidationReason::QuestionLength(_))
        ));
    }

    #[test]
    fn test_wrong_choice_count_rejected() {
        let mut q = valid_question();
        q.choices.pop();
        assert!(matches!(
            validate(&q, "general"),
            Err(ValidationReason::ChoiceCount { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn test_loose_profile_accepts_two_choices() {
        let mut q = valid_question();
        q.choices.truncate(2);
        assert_eq!(
            validate_with_profile(&q, "general", ValidationProfile::loose()),
            Ok(())
        );
    }

    #[test]
    fn test_case_insensitive_duplicates_rejected() {
        let mut q = valid_question();
        q.choices[2] = "MARS".to_string();
        assert!(matches!(
            validate(&q, "general"),
            Err(ValidationReason::DuplicateChoices(0, 2))
        ));
    }

    #[test]
    fn test_out_of_bounds_index_rejected() {
        let mut q = valid_question();
        q.correct_index = 4;
        assert!(matches!(
            validate(&q, "general"),
            Err(ValidationReason::CorrectIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_answer_text_mismatch_rejected_not_corrected() {
        let mut q = valid_question();
        q.answer_text = Some("Venus".to_string());
        assert_eq!(
            validate(&q, "general"),
            Err(ValidationReason::AnswerTextMismatch)
        );
        // The candidate itself is untouched
        assert_eq!(q.correct_index, 0);
    }

    #[test]
    fn test_answer_text_match_is_case_insensitive() {
        let mut q = valid_question();
        q.answer_text = Some("mars".to_string());
        assert_eq!(validate(&q, "general"), Ok(()));
    }

    #[test]
    fn test_normalize_defaults_fills_metadata() {
        let mut q = valid_question();
        q.explanation = String::new();
        q.topic_key = None;
        normalize_defaults(&mut q, "science");
        assert!(!q.explanation.is_empty());
        assert_eq!(q.topic_key.as_deref(), Some("science"));
    }

    fn dictionary_synonym() -> Question {
        Question {
            question: "Which word is a synonym of 'gregarious'?".to_string(),
            choices: vec![
                "sociable".to_string(),
                "hostile".to_string(),
                "silent".to_string(),
                "weary".to_string(),
            ],
            correct_index: 0,
            explanation: "Gregarious means fond of company.".to_string(),
            headword: Some("gregarious".to_string()),
            mode: Some(DictionaryMode::Synonym),
            answer_text: Some("sociable".to_string()),
            topic_key: Some("gregarious".to_string()),
            subject_matter: None,
        }
    }

    #[test]
    fn test_dictionary_synonym_passes() {
        assert_eq!(validate(&dictionary_synonym(), "dictionary"), Ok(()));
    }

    #[test]
    fn test_dictionary_missing_headword_rejected() {
        let mut q = dictionary_synonym();
        q.headword = None;
        assert_eq!(
            validate(&q, "dictionary"),
            Err(ValidationReason::MissingHeadword)
        );
    }

    #[test]
    fn test_dictionary_stem_must_mention_headword() {
        let mut q = dictionary_synonym();
        q.question = "Which word is a synonym of the given word?".to_string();
        assert_eq!(
            validate(&q, "dictionary"),
            Err(ValidationReason::StemMissingHeadword)
        );
    }

    #[test]
    fn test_synonym_choices_must_be_single_tokens() {
        let mut q = dictionary_synonym();
        q.choices[1] = "very hostile".to_string();
        assert!(matches!(
            validate(&q, "dictionary"),
            Err(ValidationReason::SynonymChoiceNotSingleToken(1))
        ));
    }

    #[test]
    fn test_synonym_answer_must_differ_from_headword() {
        let mut q = dictionary_synonym();
        q.choices[0] = "gregarious".to_string();
        q.answer_text = Some("gregarious".to_string());
        assert_eq!(
            validate(&q, "dictionary"),
            Err(ValidationReason::SynonymAnswerIsHeadword)
        );
    }

    #[test]
    fn test_definition_choices_must_be_phrases() {
        let q = Question {
            question: "What is the definition of 'ephemeral'?".to_string(),
            choices: vec![
                "lasting a very short time".to_string(),
                "ephemeral".to_string(),
                "extremely large in size".to_string(),
                "full of bright color".to_string(),
            ],
            correct_index: 0,
            explanation: String::new(),
            headword: Some("ephemeral".to_string()),
            mode: Some(DictionaryMode::Definition),
            answer_text: None,
            topic_key: None,
            subject_matter: None,
        };
        assert!(matches!(
            validate(&q, "dictionary"),
            Err(ValidationReason::DefinitionChoiceNotPhrase(1))
        ));
    }

    #[test]
    fn test_non_dictionary_category_skips_dictionary_rules() {
        let mut q = valid_question();
        q.headword = Some("unused".to_string());
        assert_eq!(validate(&q, "general"), Ok(()));
    }
}
