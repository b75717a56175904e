//! Offline accuracy check of the analyzer against a labeled dataset.
//!
//! A dataset is a JSON array of conversations in any accepted shape, each
//! carrying its ground-truth level in `sentiment`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::analyzer::SentimentAnalyzer;
use crate::calibrate::round1;
use crate::levels::{SentimentLevel, LEVEL_COUNT};
use crate::result::AnalysisResult;

#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub conversation: Value,
    pub expected: SentimentLevel,
}

/// Samples without a recognizable `sentiment` are skipped with a warning.
pub fn parse_dataset(data: &str) -> anyhow::Result<Vec<LabeledSample>> {
    let items: Vec<Value> = serde_json::from_str(data)?;
    let mut samples = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let expected = item
            .get("sentiment")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<SentimentLevel>().ok());
        match expected {
            Some(expected) => samples.push(LabeledSample {
                conversation: item,
                expected,
            }),
            None => warn!(index = i, "sample has no usable sentiment label, skipped"),
        }
    }
    Ok(samples)
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LabeledSample>> {
    let data = std::fs::read_to_string(path.as_ref())
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.as_ref().display()))?;
    parse_dataset(&data)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    /// Percent of samples whose label matches exactly.
    pub exact_accuracy: f64,
    /// Percent of samples at most one level away.
    pub within_one_accuracy: f64,
    pub mean_score_by_level: BTreeMap<SentimentLevel, f64>,
    /// `confusion[expected][predicted]`, canonical order.
    pub confusion: Vec<Vec<usize>>,
}

impl EvaluationReport {
    pub fn from_pairs(pairs: &[(SentimentLevel, AnalysisResult)]) -> Self {
        let total = pairs.len();
        let mut confusion = vec![vec![0usize; LEVEL_COUNT]; LEVEL_COUNT];
        let mut scores: BTreeMap<SentimentLevel, Vec<f64>> = BTreeMap::new();
        let (mut exact, mut near) = (0usize, 0usize);

        for (expected, result) in pairs {
            let predicted = result.sentiment_label();
            confusion[expected.index()][predicted.index()] += 1;
            scores.entry(*expected).or_default().push(result.score());
            let distance = expected.index().abs_diff(predicted.index());
            if distance == 0 {
                exact += 1;
            }
            if distance <= 1 {
                near += 1;
            }
        }

        let pct = |n: usize| {
            if total == 0 {
                0.0
            } else {
                round1(n as f64 / total as f64 * 100.0)
            }
        };

        Self {
            total,
            exact_accuracy: pct(exact),
            within_one_accuracy: pct(near),
            mean_score_by_level: scores
                .into_iter()
                .map(|(level, s)| (level, round1(s.iter().sum::<f64>() / s.len() as f64)))
                .collect(),
            confusion,
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "samples:              {}", self.total);
        let _ = writeln!(out, "exact accuracy:       {:.1}%", self.exact_accuracy);
        let _ = writeln!(out, "within-one accuracy:  {:.1}%", self.within_one_accuracy);
        let _ = writeln!(out, "\nmean score by true level:");
        for (level, score) in &self.mean_score_by_level {
            let _ = writeln!(out, "  {:<18} {:>5.1}", level.display_label(), score);
        }
        let _ = writeln!(out, "\nconfusion (rows = true, cols = predicted):");
        let _ = write!(out, "{:<18}", "");
        for level in SentimentLevel::ALL {
            let _ = write!(out, "{:>6}", abbrev(level));
        }
        let _ = writeln!(out);
        for (i, row) in self.confusion.iter().enumerate() {
            let _ = write!(out, "{:<18}", SentimentLevel::ALL[i].display_label());
            for n in row {
                let _ = write!(out, "{n:>6}");
            }
            let _ = writeln!(out);
        }
        out
    }
}

fn abbrev(level: SentimentLevel) -> &'static str {
    match level {
        SentimentLevel::VeryNegative => "VN",
        SentimentLevel::Negative => "N",
        SentimentLevel::SlightlyNegative => "SN",
        SentimentLevel::Neutral => "0",
        SentimentLevel::SlightlyPositive => "SP",
        SentimentLevel::Positive => "P",
        SentimentLevel::VeryPositive => "VP",
    }
}

/// Analyze every sample (unrefined) and score the predictions.
pub async fn run(
    analyzer: &Arc<SentimentAnalyzer>,
    samples: Vec<LabeledSample>,
    concurrency: usize,
) -> EvaluationReport {
    let (conversations, expected): (Vec<Value>, Vec<SentimentLevel>) = samples
        .into_iter()
        .map(|s| (s.conversation, s.expected))
        .unzip();
    let results = analyzer.analyze_batch(conversations, None, concurrency).await;
    let pairs: Vec<_> = expected.into_iter().zip(results).collect();
    EvaluationReport::from_pairs(&pairs)
}
