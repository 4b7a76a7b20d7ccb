//! Static fallback bank.
//!
//! The last resort of every resolution: a preloaded, non-empty set of
//! fully valid questions partitioned by `category:difficulty`, with
//! `general:easy` as the default partition. Selection is seeded and
//! prefers entries that avoid the caller's recent history, but the
//! bank's only hard contract is "always returns a valid question".

use crate::dedup;
use crate::shuffle::{SeedSequence, StdSeedSequence};
use crate::types::{Difficulty, Question};
use std::collections::HashMap;

/// Default partition used when a category has no static entries.
pub const DEFAULT_PARTITION: &str = "general:easy";

pub struct FallbackBank {
    partitions: HashMap<String, Vec<Question>>,
}

impl Default for FallbackBank {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackBank {
    /// Bank with custom partitions. Any partition map missing
    /// `general:easy` gets the builtin default partition added, which
    /// keeps the non-empty contract true by construction.
    pub fn new(mut partitions: HashMap<String, Vec<Question>>) -> Self {
        partitions.retain(|_, v| !v.is_empty());
        partitions
            .entry(DEFAULT_PARTITION.to_string())
            .or_insert_with(builtin_default_partition);
        Self { partitions }
    }

    /// The builtin curated bank.
    pub fn builtin() -> Self {
        let mut partitions: HashMap<String, Vec<Question>> = HashMap::new();
        partitions.insert(DEFAULT_PARTITION.to_string(), builtin_default_partition());
        partitions.insert(
            "science:medium".to_string(),
            vec![
                entry(
                    "Which gas makes up most of Earth's atmosphere?",
                    ["Nitrogen", "Oxygen", "Carbon dioxide", "Argon"],
                    0,
                    "About 78% of the atmosphere is nitrogen.",
                    "atmosphere",
                ),
                entry(
                    "What unit measures electrical resistance?",
                    ["Ohm", "Volt", "Ampere", "Watt"],
                    0,
                    "Resistance is measured in ohms.",
                    "electricity",
                ),
            ],
        );
        partitions.insert(
            "history:medium".to_string(),
            vec![entry(
                "In which year did the Berlin Wall fall?",
                ["1989", "1979", "1991", "1985"],
                0,
                "The wall fell on 9 November 1989.",
                "berlin wall",
            )],
        );
        Self { partitions }
    }

    /// Pick a question for the key, preferring one that does not
    /// collide with `recent`. Falls back to the default partition when
    /// the key has no entries, and to any entry when all collide.
    pub fn select(&self, key: &str, recent: &[String], seed: u64) -> Question {
        let partition = self
            .partitions
            .get(key)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| &self.partitions[DEFAULT_PARTITION]);

        let mut seq = StdSeedSequence::from_seed(seed);
        let start = seq.next_index(partition.len());

        // Round-robin from the seeded start, first non-colliding wins
        for offset in 0..partition.len() {
            let candidate = &partition[(start + offset) % partition.len()];
            if !dedup::collides_with_recent(candidate, recent) {
                return candidate.clone();
            }
        }

        // Everything collides: any valid entry beats no entry
        partition[start].clone()
    }

    /// Total number of stored questions.
    pub fn len(&self) -> usize {
        self.partitions.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry(
    stem: &str,
    choices: [&str; 4],
    correct_index: usize,
    explanation: &str,
    topic_key: &str,
) -> Question {
    Question {
        question: stem.to_string(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
        correct_index,
        explanation: explanation.to_string(),
        headword: None,
        mode: None,
        answer_text: Some(choices[correct_index].to_string()),
        topic_key: Some(topic_key.to_string()),
        subject_matter: Some(topic_key.to_string()),
    }
}

fn builtin_default_partition() -> Vec<Question> {
    vec![
        entry(
            "Which planet is known as the Red Planet?",
            ["Mars", "Venus", "Jupiter", "Mercury"],
            0,
            "Iron oxide dust gives Mars its reddish color.",
            "mars",
        ),
        entry(
            "How many continents are there on Earth?",
            ["Seven", "Five", "Six", "Eight"],
            0,
            "The usual count is seven continents.",
            "continents",
        ),
        entry(
            "What is the largest ocean on Earth?",
            ["Pacific", "Atlantic", "Indian", "Arctic"],
            0,
            "The Pacific covers about a third of the surface.",
            "oceans",
        ),
        entry(
            "Which animal is the tallest living land animal?",
            ["Giraffe", "Elephant", "Ostrich", "Moose"],
            0,
            "Adult giraffes stand up to 5.5 meters tall.",
            "giraffe",
        ),
    ]
}
