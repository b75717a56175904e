//! # Level-Distribution Builder
//! Expands an aggregated (pos, neg, neu) triple into a probability
//! distribution over the 7 levels and picks the dominant level.
//!
//! Each polar side is split by its own strength:
//!
//! | side prob   | strong | mid | slight |
//! |-------------|--------|-----|--------|
//! | > 0.7       | 0.6    | 0.3 | 0.1    |
//! | (0.4, 0.7]  | 0.2    | 0.5 | 0.3    |
//! | (0.05, 0.4] | 0.0    | 0.3 | 0.7    |
//! | ≤ 0.05      | 0      | 0   | 0      |
//!
//! Neutral is damped unless it is uncontested, countering the classifier's
//! tendency to over-predict neutral.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::DistributionError;
use crate::levels::{SentimentLevel, LEVEL_COUNT};

/// Tolerance for "sums to 1".
pub const SUM_EPSILON: f64 = 1e-6;

const SIDE_FLOOR: f64 = 0.05;

/// Probability per level, indexed by canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelDistribution {
    probs: [f64; LEVEL_COUNT],
}

impl LevelDistribution {
    /// Validates: every value finite and ≥ 0, sum within [`SUM_EPSILON`] of 1.
    pub fn new(probs: [f64; LEVEL_COUNT]) -> Result<Self, DistributionError> {
        for (i, p) in probs.iter().enumerate() {
            if !p.is_finite() || *p < 0.0 {
                return Err(DistributionError::InvalidComponent(
                    SentimentLevel::ALL[i].as_str(),
                ));
            }
        }
        let sum: f64 = probs.iter().sum();
        if (sum - 1.0).abs() > SUM_EPSILON {
            return Err(DistributionError::BadSum(sum));
        }
        Ok(Self { probs })
    }

    /// All mass on neutral.
    pub fn neutral() -> Self {
        let mut probs = [0.0; LEVEL_COUNT];
        probs[SentimentLevel::Neutral.index()] = 1.0;
        Self { probs }
    }

    pub fn get(&self, level: SentimentLevel) -> f64 {
        self.probs[level.index()]
    }

    pub fn as_array(&self) -> &[f64; LEVEL_COUNT] {
        &self.probs
    }

    pub fn iter(&self) -> impl Iterator<Item = (SentimentLevel, f64)> + '_ {
        SentimentLevel::ALL.iter().copied().zip(self.probs.iter().copied())
    }

    /// Highest-probability level; ties go to the earlier canonical level.
    pub fn dominant(&self) -> SentimentLevel {
        let mut best = 0;
        for i in 1..LEVEL_COUNT {
            if self.probs[i] > self.probs[best] {
                best = i;
            }
        }
        SentimentLevel::ALL[best]
    }
}

/// Serialized as an ordered `{level: probability}` map.
impl Serialize for LevelDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(LEVEL_COUNT))?;
        for (level, p) in self.iter() {
            map.serialize_entry(level.as_str(), &p)?;
        }
        map.end()
    }
}

/// Split one side's probability into (strong, mid, slight) shares.
fn split_side(p: f64) -> [f64; 3] {
    if p <= SIDE_FLOOR {
        [0.0; 3]
    } else if p > 0.7 {
        [0.6 * p, 0.3 * p, 0.1 * p]
    } else if p > 0.4 {
        [0.2 * p, 0.5 * p, 0.3 * p]
    } else {
        [0.0, 0.3 * p, 0.7 * p]
    }
}

fn neutral_share(neu: f64, intensity: f64) -> f64 {
    if neu > 0.5 && intensity < 0.3 {
        0.8 * neu
    } else if neu > 0.3 {
        0.4 * neu
    } else {
        0.2 * neu
    }
}

/// Build the normalized 7-level distribution for a probability triple.
///
/// Inputs are clamped to [0, 1]; an all-zero triple (a broken classifier)
/// falls back to all mass on neutral.
pub fn build(pos: f64, neg: f64, neu: f64) -> LevelDistribution {
    let sanitize = |x: f64| if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 };
    let (pos, neg, neu) = (sanitize(pos), sanitize(neg), sanitize(neu));
    let intensity = pos.max(neg);

    let [very_neg, neg_mid, slight_neg] = split_side(neg);
    let [very_pos, pos_mid, slight_pos] = split_side(pos);

    let raw = [
        very_neg,
        neg_mid,
        slight_neg,
        neutral_share(neu, intensity),
        slight_pos,
        pos_mid,
        very_pos,
    ];

    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return LevelDistribution::neutral();
    }

    let mut probs = [0.0; LEVEL_COUNT];
    for (out, v) in probs.iter_mut().zip(raw) {
        *out = v / total;
    }
    LevelDistribution { probs }
}
