//! Deterministic choice shuffling.
//!
//! Reorders a question's choices with a seeded Fisher-Yates pass, then
//! relocates `correct_index` by finding the original correct choice's
//! text in the shuffled list. The index is never assumed invariant.
//!
//! The generator sits behind `SeedSequence` so the algorithm can be
//! swapped without touching call sites.

use crate::types::Question;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A seeded source of bounded indices. Same seed, same sequence.
pub trait SeedSequence {
    fn from_seed(seed: u64) -> Self
    where
        Self: Sized;

    /// Uniform index in `0..bound`. `bound` must be non-zero.
    fn next_index(&mut self, bound: usize) -> usize;
}

/// Default sequence backed by rand's `StdRng`.
pub struct StdSeedSequence {
    rng: StdRng,
}

impl SeedSequence for StdSeedSequence {
    fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn next_index(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }
}

/// Shuffle choices with the default sequence.
pub fn shuffle_choices(q: &Question, seed: u64) -> Question {
    shuffle_choices_with::<StdSeedSequence>(q, seed)
}

/// Shuffle `q`'s choices and fix up `correct_index`.
pub fn shuffle_choices_with<S: SeedSequence>(q: &Question, seed: u64) -> Question {
    let mut shuffled = q.clone();
    let original_correct = match q.correct_choice() {
        Some(text) => text.to_string(),
        // Out-of-bounds index should have been caught by validation;
        // pass the question through untouched rather than crash.
        None => return shuffled,
    };

    let mut seq = S::from_seed(seed);
    let n = shuffled.choices.len();

    // Fisher-Yates, back to front
    for i in (1..n).rev() {
        let j = seq.next_index(i + 1);
        shuffled.choices.swap(i, j);
    }

    // Relocate by text; on (validator-excluded) ties the first match wins
    if let Some(new_index) = shuffled
        .choices
        .iter()
        .position(|c| c == &original_correct)
    {
        shuffled.correct_index = new_index;
    }

    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator;

    fn sample() -> Question {
        Question {
            question: "Which planet is known as the Red Planet?".to_string(),
            choices: vec![
                "Mars".to_string(),
                "Venus".to_string(),
                "Jupiter".to_string(),
                "Mercury".to_string(),
            ],
            correct_index: 0,
            explanation: "Iron oxide.".to_string(),
            headword: None,
            mode: None,
            answer_text: Some("Mars".to_string()),
            topic_key: None,
            subject_matter: None,
        }
    }

    #[test]
    fn test_correct_index_follows_answer() {
        for seed in 0..50 {
            let shuffled = shuffle_choices(&sample(), seed);
            assert_eq!(shuffled.choices[shuffled.correct_index], "Mars");
        }
    }

    #[test]
    fn test_same_seed_same_permutation() {
        let a = shuffle_choices(&sample(), 42);
        let b = shuffle_choices(&sample(), 42);
        assert_eq!(a.choices, b.choices);
        assert_eq!(a.correct_index, b.correct_index);
    }

    #[test]
    fn test_different_seeds_eventually_differ() {
        let base = shuffle_choices(&sample(), 1);
        let differs = (2..20).any(|s| shuffle_choices(&sample(), s).choices != base.choices);
        assert!(differs);
    }

    #[test]
    fn test_choices_are_a_permutation() {
        let shuffled = shuffle_choices(&sample(), 7);
        let mut original = sample().choices;
        let mut got = shuffled.choices.clone();
        original.sort();
        got.sort();
        assert_eq!(original, got);
    }

    #[test]
    fn test_validity_preserved_by_shuffle() {
        let q = sample();
        assert!(validator::validate(&q, "general").is_ok());
        for seed in 0..20 {
            let shuffled = shuffle_choices(&q, seed);
            assert!(validator::validate(&shuffled, "general").is_ok());
        }
    }

    #[test]
    fn test_duplicate_choice_texts_do_not_crash() {
        let mut q = sample();
        q.choices[1] = "Mars".to_string();
        let shuffled = shuffle_choices(&q, 3);
        // First textual match wins
        assert_eq!(shuffled.choices[shuffled.correct_index], "Mars");
    }

    #[test]
    fn test_out_of_bounds_index_passes_through() {
        let mut q = sample();
        q.correct_index = 99;
        let shuffled = shuffle_choices(&q, 3);
        assert_eq!(shuffled.correct_index, 99);
        assert_eq!(shuffled.choices, q.choices);
    }
}
