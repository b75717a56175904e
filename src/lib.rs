// src/lib.rs
//! Sentiment scoring for customer-service conversations.
//!
//! Pipeline: [`extract`] snippets → [`classifier`] per snippet →
//! [`aggregate`] with quadratic intensity weights → [`distribution`] over 7
//! levels + [`calibrate`]d 0–100 score → optional shift by the
//! [`feedback`] ledger's correction offset.

pub mod aggregate;
pub mod analyzer;
pub mod api;
pub mod calibrate;
pub mod classifier;
pub mod config;
pub mod distribution;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod feedback;
pub mod levels;
pub mod logging;
pub mod metrics;
pub mod result;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing::{info, warn};

pub use crate::analyzer::SentimentAnalyzer;
pub use crate::api::{router, AppState};
pub use crate::classifier::{ClassifierResult, SentimentClassifier};
pub use crate::distribution::LevelDistribution;
pub use crate::feedback::{CorrectionOffset, FeedbackLedger, FeedbackRecord, FeedbackSubmission};
pub use crate::levels::SentimentLevel;
pub use crate::result::AnalysisResult;

use crate::config::AppConfig;
use crate::metrics::Metrics;

/// Build the full router from `SENTIMENT_CONFIG_PATH` + environment.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    build_app(&cfg)
}

/// Wire classifier, analyzer, ledger and metrics for a given config.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let client = classifier::build_from_config(&cfg.classifier)?;
    let analyzer = SentimentAnalyzer::new(client)
        .with_timeout(Duration::from_millis(cfg.classifier.timeout_ms));
    let ledger = FeedbackLedger::open(&cfg.data_dir)?;
    info!(ledger = %ledger.path().display(), "feedback ledger ready");

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    };

    let state = AppState {
        analyzer: Arc::new(analyzer),
        ledger: Arc::new(ledger),
        batch_concurrency: cfg.analysis.batch_concurrency,
    };
    Ok(api::router(state, metrics.as_ref()))
}
