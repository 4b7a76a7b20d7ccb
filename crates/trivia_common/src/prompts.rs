//! Prompt assembly for question generation.
//!
//! One prompt per attempt: category and difficulty wording, the JSON
//! shape the extractor expects, and anti-duplicate hints drawn from
//! the caller's recent history.

use crate::types::{Difficulty, GenerationRequest};

/// How many recent subjects to name in the anti-duplicate hint.
const MAX_AVOID_HINTS: usize = 12;

/// Build the generation prompt for one attempt.
pub fn build_generation_prompt(req: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Write one multiple-choice trivia question.\n\
         Category: {}\n\
         Difficulty: {}\n\n\
         Respond with a single JSON object and nothing else:\n\
         {{\n\
           \"question\": \"...\",\n\
           \"choices\": [\"...\", \"...\", \"...\", \"...\"],\n\
           \"correct_index\": 0,\n\
           \"explanation\": \"...\",\n\
           \"answer_text\": \"...\",\n\
           \"topic_key\": \"...\",\n\
           \"subject_matter\": \"...\"\n\
         }}\n\n\
         Exactly 4 distinct choices. \"answer_text\" must equal the correct choice.\n",
        req.category,
        difficulty_wording(req.difficulty),
    );

    if req.category.eq_ignore_ascii_case("dictionary") {
        prompt.push_str(
            "This is a dictionary question: also include \"headword\" and \
             \"mode\" (\"definition\" or \"synonym\"), mention both the \
             headword and the mode in the question text, and follow the \
             mode's choice style (synonym: single words; definition: \
             multi-word phrases).\n",
        );
    }

    let avoid: Vec<&str> = req
        .recent
        .iter()
        .rev()
        .take(MAX_AVOID_HINTS)
        .map(|s| s.as_str())
        .collect();
    if !avoid.is_empty() {
        prompt.push_str("\nDo not repeat or paraphrase any of these already-served questions:\n");
        for item in avoid {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
    }

    prompt
}

fn difficulty_wording(d: Difficulty) -> &'static str {
    match d {
        Difficulty::Easy => "easy (common knowledge)",
        Difficulty::Medium => "medium (requires some familiarity)",
        Difficulty::Hard => "hard (specialist knowledge)",
    }
}
