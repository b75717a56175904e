//! The externally visible analysis artifact.

use serde::Serialize;

use crate::distribution::LevelDistribution;
use crate::levels::SentimentLevel;

/// Score, label and full level distribution for one conversation.
///
/// Built once per conversation and never mutated; refinement produces a new
/// value through [`AnalysisResult::refined`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    score: f64,
    sentiment_label: SentimentLevel,
    level_scores: LevelDistribution,
    refined: bool,
}

impl AnalysisResult {
    /// Score is clamped into [0, 100]; a non-finite score becomes 50.
    pub fn new(score: f64, sentiment_label: SentimentLevel, level_scores: LevelDistribution) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            50.0
        };
        Self {
            score,
            sentiment_label,
            level_scores,
            refined: false,
        }
    }

    /// The canonical result for conversations with nothing to score.
    pub fn neutral_default() -> Self {
        Self::new(50.0, SentimentLevel::Neutral, LevelDistribution::neutral())
    }

    /// Copy with an adjusted score and label, flagged as refined.
    pub fn refined(&self, score: f64, sentiment_label: SentimentLevel) -> Self {
        Self {
            refined: true,
            ..Self::new(score, sentiment_label, self.level_scores)
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn sentiment_label(&self) -> SentimentLevel {
        self.sentiment_label
    }

    pub fn level_scores(&self) -> &LevelDistribution {
        &self.level_scores
    }

    pub fn is_refined(&self) -> bool {
        self.refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_default_shape() {
        let r = AnalysisResult::neutral_default();
        assert_eq!(r.score(), 50.0);
        assert_eq!(r.sentiment_label(), SentimentLevel::Neutral);
        assert_eq!(r.level_scores().get(SentimentLevel::Neutral), 1.0);
        assert!(!r.is_refined());
    }

    #[test]
    fn json_shape() {
        let v = serde_json::to_value(AnalysisResult::neutral_default()).unwrap();
        assert_eq!(v["score"], serde_json::json!(50.0));
        assert_eq!(v["sentiment_label"], serde_json::json!("neutral"));
        assert_eq!(v["level_scores"]["neutral"], serde_json::json!(1.0));
        assert_eq!(v["refined"], serde_json::json!(false));
    }

    #[test]
    fn score_is_clamped() {
        let d = LevelDistribution::neutral();
        assert_eq!(AnalysisResult::new(130.0, SentimentLevel::Neutral, d).score(), 100.0);
        assert_eq!(AnalysisResult::new(f64::NAN, SentimentLevel::Neutral, d).score(), 50.0);
    }
}
