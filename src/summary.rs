//! Batch summaries and the review-dashboard report.

use serde::Serialize;
use serde_json::Value;

use crate::calibrate::round1;
use crate::distribution::LevelDistribution;
use crate::extract::{conversation_id, message_preview};
use crate::feedback::CorrectionOffset;
use crate::levels::{SentimentLevel, LEVEL_COUNT};
use crate::result::AnalysisResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: SentimentLevel,
    pub display: &'static str,
    pub css_class: String,
    pub count: usize,
    pub pct: f64,
}

/// Aggregate figures over a batch of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub count: usize,
    pub avg_score: f64,
    pub positive_pct: f64,
    pub negative_pct: f64,
    /// Most positive first.
    pub distribution: Vec<LabelShare>,
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

impl BatchSummary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let total = results.len();
        let avg_score = if total == 0 {
            0.0
        } else {
            round1(results.iter().map(AnalysisResult::score).sum::<f64>() / total as f64)
        };

        let mut counts = [0usize; LEVEL_COUNT];
        for r in results {
            counts[r.sentiment_label().index()] += 1;
        }
        let positive = results.iter().filter(|r| r.sentiment_label().is_positive()).count();
        let negative = results.iter().filter(|r| r.sentiment_label().is_negative()).count();

        let distribution = SentimentLevel::ALL
            .iter()
            .rev()
            .map(|&label| LabelShare {
                label,
                display: label.display_label(),
                css_class: label.css_class(),
                count: counts[label.index()],
                pct: pct(counts[label.index()], total),
            })
            .collect();

        Self {
            count: total,
            avg_score,
            positive_pct: pct(positive, total),
            negative_pct: pct(negative, total),
            distribution,
        }
    }
}

/// One conversation on the review dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub id: String,
    pub score: f64,
    pub sentiment_label: SentimentLevel,
    pub display_label: &'static str,
    pub css_class: String,
    pub level_scores: LevelDistribution,
    pub refined: bool,
    pub preview: String,
    pub ai_agent: String,
    pub link: String,
    pub created_at: String,
    pub human_escalation: Value,
}

impl DashboardRow {
    /// `index` names the row when the conversation carries no id.
    pub fn new(index: usize, conversation: &Value, result: &AnalysisResult) -> Self {
        let text_field = |key: &str| {
            conversation
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let label = result.sentiment_label();
        Self {
            id: conversation_id(conversation).unwrap_or_else(|| index.to_string()),
            score: result.score(),
            sentiment_label: label,
            display_label: label.display_label(),
            css_class: label.css_class(),
            level_scores: *result.level_scores(),
            refined: result.is_refined(),
            preview: message_preview(conversation),
            ai_agent: text_field("AI Agent"),
            link: text_field("Link"),
            created_at: text_field("CreatedAt"),
            human_escalation: conversation
                .get("HumanEscalation")
                .cloned()
                .unwrap_or(Value::Bool(false)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub results: Vec<DashboardRow>,
    pub summary: BatchSummary,
    pub refinement_active: bool,
    pub feedback_count: usize,
}

impl DashboardReport {
    /// `conversations` and `results` are parallel slices.
    pub fn build(
        conversations: &[Value],
        results: &[AnalysisResult],
        offset: &CorrectionOffset,
    ) -> Self {
        let rows = conversations
            .iter()
            .zip(results)
            .enumerate()
            .map(|(i, (c, r))| DashboardRow::new(i, c, r))
            .collect();
        Self {
            results: rows,
            summary: BatchSummary::from_results(results),
            refinement_active: offset.is_active(),
            feedback_count: offset.count,
        }
    }
}
