//! Offline lexicon classifier.
//!
//! Scores words against an embedded Portuguese/English word list and turns
//! the accumulated positive and negative mass into a probability triple.
//! Used when no model endpoint is configured.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{ClassifierError, ClassifierResult, SentimentClassifier};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_else(|e| {
        tracing::error!(error = %e, "embedded sentiment lexicon is invalid");
        HashMap::new()
    })
});

/// Lexicon mass at which a snippet is half neutral, half polar.
const HALF_POLAR_MASS: f64 = 2.0;

/// How many preceding tokens a negator reaches.
const NEGATION_REACH: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (positive mass, negative mass) with negation applied.
    /// A negator in the previous 1..=3 tokens flips the sign of a word.
    pub fn masses(&self, text: &str) -> (f64, f64) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut pos = 0.0;
        let mut neg = 0.0;

        for i in 0..tokens.len() {
            let base = self.word_score(&tokens[i]);
            if base == 0 {
                continue;
            }
            let negated =
                (1..=NEGATION_REACH).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let adj = if negated { -base } else { base };
            if adj > 0 {
                pos += adj as f64;
            } else {
                neg += (-adj) as f64;
            }
        }

        (pos, neg)
    }

    fn probabilities(&self, text: &str) -> (f64, f64, f64) {
        let (pos_mass, neg_mass) = self.masses(text);
        let total = pos_mass + neg_mass;
        if total == 0.0 {
            return (0.0, 0.0, 1.0);
        }
        let neu = HALF_POLAR_MASS / (HALF_POLAR_MASS + total);
        let polar = 1.0 - neu;
        (polar * pos_mass / total, polar * neg_mass / total, neu)
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierResult, ClassifierError> {
        let (pos, neg, neu) = self.probabilities(text);
        ClassifierResult::new(pos, neg, neu)
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens, lower-case (Unicode aware, keeps accents).
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "without"
            | "cannot"
            | "não"
            | "nao"
            | "nunca"
            | "nem"
            | "jamais"
            | "sem"
    )
}
