//! # Aggregation Engine
//! Combines per-snippet classifier outputs into one probability triple.
//!
//! Weighting: `intensity = max(pos, neg)`. Snippets below 0.25 intensity get a
//! flat 0.1 weight; everything else weighs `intensity²`, so one strongly
//! emotional message outweighs several mild ones instead of being averaged away.

use serde::Serialize;

use crate::classifier::ClassifierResult;

/// Intensity below which a snippet is treated as weak/ambiguous.
pub const WEAK_INTENSITY: f64 = 0.25;
/// Weight given to weak snippets.
pub const WEAK_WEIGHT: f64 = 0.1;

/// A classifier result with its influence on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedResult {
    pub probs: ClassifierResult,
    pub weight: f64,
}

impl WeightedResult {
    pub fn new(probs: ClassifierResult) -> Self {
        Self {
            weight: weight_for(&probs),
            probs,
        }
    }
}

/// Weight in [0.1, 1.0] for one snippet.
pub fn weight_for(r: &ClassifierResult) -> f64 {
    let intensity = r.intensity();
    if intensity < WEAK_INTENSITY {
        WEAK_WEIGHT
    } else {
        intensity * intensity
    }
}

/// Weighted mean of pos/neg/neu over one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateProbabilities {
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
}

impl AggregateProbabilities {
    pub fn intensity(&self) -> f64 {
        self.pos.max(self.neg)
    }

    /// `pos - neg`, in [-1, 1].
    pub fn polarity(&self) -> f64 {
        self.pos - self.neg
    }
}

/// Returns `None` when there is nothing to aggregate.
pub fn aggregate(results: &[ClassifierResult]) -> Option<AggregateProbabilities> {
    let weighted: Vec<WeightedResult> = results.iter().copied().map(WeightedResult::new).collect();
    aggregate_weighted(&weighted)
}

pub fn aggregate_weighted(weighted: &[WeightedResult]) -> Option<AggregateProbabilities> {
    let total: f64 = weighted.iter().map(|w| w.weight).sum();
    if weighted.is_empty() || total <= 0.0 {
        return None;
    }

    let (mut pos, mut neg, mut neu) = (0.0, 0.0, 0.0);
    for w in weighted {
        pos += w.probs.pos() * w.weight;
        neg += w.probs.neg() * w.weight;
        neu += w.probs.neu() * w.weight;
    }

    Some(AggregateProbabilities {
        pos: pos / total,
        neg: neg / total,
        neu: neu / total,
    })
}
