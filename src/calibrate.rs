//! # Score Calibrator
//! Maps aggregated polarity onto the 0–100 score and applies the
//! feedback-derived offset.
//!
//! The score is continuous and may disagree with the dominant level of the
//! distribution; both are reported.

use crate::aggregate::AggregateProbabilities;
use crate::distribution;
use crate::feedback::CorrectionOffset;
use crate::result::AnalysisResult;
use crate::levels::SentimentLevel;

/// Round to one decimal place.
pub(crate) fn round1(x: f64) -> f64 {
    round_decimal(x, 1)
}

/// Round to two decimal places.
pub(crate) fn round2(x: f64) -> f64 {
    round_decimal(x, 2)
}

/// Round `x` to `digits` decimal places using the exact binary value of `x`,
/// ties to even. `62.55` is stored as `62.5499…` and so rounds down, where
/// `(x * 10.0).round()` would round the already-rounded product up.
fn round_decimal(x: f64, digits: u32) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    let bits = x.to_bits();
    let negative = bits >> 63 == 1;
    let exp_bits = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    // x = mantissa * 2^exp
    let (mantissa, exp) = if exp_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exp_bits - 1075)
    };
    if exp >= 0 {
        return x;
    }

    let scale = 10u128.pow(digits);
    let scaled = mantissa as u128 * scale;
    let shift = (-exp) as u32;
    // scaled < 2^60 for digits <= 2, so anything shifted this far is below one half.
    let quotient = if shift >= 127 {
        0
    } else {
        let q = scaled >> shift;
        let rem = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if rem > half || (rem == half && q % 2 == 1) {
            q + 1
        } else {
            q
        }
    };

    let magnitude = quotient as f64 / scale as f64;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// `clamp(round1((pos - neg + 1) / 2 * 100), 0, 100)`.
pub fn score(agg: &AggregateProbabilities) -> f64 {
    let sentiment_value = agg.polarity();
    round1((sentiment_value + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0)
}

/// Full result for an aggregated triple: score plus distribution and its
/// dominant level.
pub fn calibrate(agg: &AggregateProbabilities) -> AnalysisResult {
    let levels = distribution::build(agg.pos, agg.neg, agg.neu);
    AnalysisResult::new(score(agg), levels.dominant(), levels)
}

/// Shift the score by the ledger offset and re-derive the label from the
/// adjusted score. Inactive offsets leave the result untouched.
pub fn apply_offset(result: &AnalysisResult, offset: &CorrectionOffset) -> AnalysisResult {
    if !offset.is_active() {
        return result.clone();
    }
    let adjusted = round1(result.score() + offset.score_offset).clamp(0.0, 100.0);
    result.refined(adjusted, SentimentLevel::from_score(adjusted))
}
