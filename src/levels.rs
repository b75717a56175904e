//! # Sentiment Levels
//! The 7-level ordered scale shared by the distribution builder, the score
//! calibrator and the feedback ledger.
//!
//! Ordering matters: the canonical index (0 = very_negative .. 6 = very_positive)
//! breaks ties when picking the dominant level and is the unit of label shifts
//! in feedback calibration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of levels on the scale.
pub const LEVEL_COUNT: usize = 7;

/// Width of one level band on the 0–100 score scale (~14.3 points).
pub const BAND_WIDTH: f64 = 100.0 / LEVEL_COUNT as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLevel {
    VeryNegative,
    Negative,
    SlightlyNegative,
    Neutral,
    SlightlyPositive,
    Positive,
    VeryPositive,
}

impl SentimentLevel {
    /// Canonical order, most negative first.
    pub const ALL: [SentimentLevel; LEVEL_COUNT] = [
        SentimentLevel::VeryNegative,
        SentimentLevel::Negative,
        SentimentLevel::SlightlyNegative,
        SentimentLevel::Neutral,
        SentimentLevel::SlightlyPositive,
        SentimentLevel::Positive,
        SentimentLevel::VeryPositive,
    ];

    /// 0-based position in the canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// snake_case name used on the wire and in the ledger.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryNegative => "very_negative",
            Self::Negative => "negative",
            Self::SlightlyNegative => "slightly_negative",
            Self::Neutral => "neutral",
            Self::SlightlyPositive => "slightly_positive",
            Self::Positive => "positive",
            Self::VeryPositive => "very_positive",
        }
    }

    /// Human-facing label for the dashboard ("Very Negative").
    pub fn display_label(self) -> &'static str {
        match self {
            Self::VeryNegative => "Very Negative",
            Self::Negative => "Negative",
            Self::SlightlyNegative => "Slightly Negative",
            Self::Neutral => "Neutral",
            Self::SlightlyPositive => "Slightly Positive",
            Self::Positive => "Positive",
            Self::VeryPositive => "Very Positive",
        }
    }

    /// CSS class form ("very-negative").
    pub fn css_class(self) -> String {
        self.as_str().replace('_', "-")
    }

    pub fn is_positive(self) -> bool {
        self > Self::Neutral
    }

    pub fn is_negative(self) -> bool {
        self < Self::Neutral
    }

    /// Map a 0–100 score to the level whose band contains it.
    /// Bands are equal-width; 100.0 lands in the top band.
    pub fn from_score(score: f64) -> Self {
        let s = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            50.0
        };
        let idx = ((s / BAND_WIDTH).floor() as usize).min(LEVEL_COUNT - 1);
        Self::ALL[idx]
    }

    /// Closest known level name for an unrecognized label, for log hints.
    pub fn closest_to(raw: &str) -> SentimentLevel {
        let key = normalize_label(raw);
        let mut best = SentimentLevel::Neutral;
        let mut best_sim = f64::MIN;
        for lvl in Self::ALL {
            let sim = strsim::jaro_winkler(&key, lvl.as_str());
            if sim > best_sim {
                best_sim = sim;
                best = lvl;
            }
        }
        best
    }
}

impl fmt::Display for SentimentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sentiment level: {0:?}")]
pub struct UnknownLevel(pub String);

impl FromStr for SentimentLevel {
    type Err = UnknownLevel;

    /// Accepts `very_negative`, `Very Negative` and `very-negative`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_label(s);
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == key)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// Lowercase, trim, and fold spaces/dashes into underscores.
fn normalize_label(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
