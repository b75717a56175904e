//! Prometheus exposition for analysis and feedback counters.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ANALYSES_TOTAL: &str = "sentiment_analyses_total";
pub const SNIPPETS_CLASSIFIED_TOTAL: &str = "sentiment_snippets_classified_total";
pub const CLASSIFIER_FAILURES_TOTAL: &str = "sentiment_classifier_failures_total";
pub const NEUTRAL_FALLBACK_TOTAL: &str = "sentiment_neutral_fallback_total";
pub const ANALYSIS_DURATION_MS: &str = "sentiment_analysis_duration_ms";
pub const FEEDBACK_SAVED_TOTAL: &str = "feedback_saved_total";
pub const FEEDBACK_CLEARED_TOTAL: &str = "feedback_cleared_total";
pub const FEEDBACK_SCORE_OFFSET: &str = "feedback_score_offset";

/// The recorder is process-global; every `init` after the first reuses it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once) and describe all series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
            describe_all();
            tracing::info!("metrics recorder installed");
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_all() {
    describe_counter!(ANALYSES_TOTAL, "Conversations analyzed.");
    describe_counter!(
        SNIPPETS_CLASSIFIED_TOTAL,
        "Snippets successfully classified."
    );
    describe_counter!(
        CLASSIFIER_FAILURES_TOTAL,
        "Classifier calls that failed or timed out."
    );
    describe_counter!(
        NEUTRAL_FALLBACK_TOTAL,
        "Analyses that fell back to the neutral default."
    );
    describe_histogram!(
        ANALYSIS_DURATION_MS,
        Unit::Milliseconds,
        "Per-conversation analysis time in milliseconds."
    );
    describe_counter!(FEEDBACK_SAVED_TOTAL, "Feedback corrections stored.");
    describe_counter!(FEEDBACK_CLEARED_TOTAL, "Bulk ledger clears.");
    describe_gauge!(
        FEEDBACK_SCORE_OFFSET,
        "Score offset derived from the feedback ledger."
    );
    // Present on /metrics before the first offset computation.
    gauge!(FEEDBACK_SCORE_OFFSET).set(0.0);
}
