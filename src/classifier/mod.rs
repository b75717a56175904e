//! Classifier seam: the external model that maps one snippet to
//! (positive, negative, neutral) probabilities.
//!
//! The model is injected once at startup as a [`DynClassifier`] and passed
//! explicitly to the analyzer. Adapters:
//! - [`HttpClassifier`]: remote model-serving endpoint
//! - [`LexiconClassifier`]: offline word-list fallback
//! - [`mock`]: deterministic stand-ins for tests and local runs

pub mod http;
pub mod lexicon;
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ClassifierConfig, ClassifierProvider};
pub use crate::error::ClassifierError;

pub use http::HttpClassifier;
pub use lexicon::LexiconClassifier;
pub use mock::{FailingClassifier, FixedClassifier, ScriptedClassifier, SlowClassifier};

/// Allowed deviation of a raw triple from summing to 1.
const SUM_TOLERANCE: f64 = 0.01;

/// Raw probabilities for one snippet. Always sums to 1; the only way in is
/// through [`ClassifierResult::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifierResult {
    pos: f64,
    neg: f64,
    neu: f64,
}

impl ClassifierResult {
    /// Mostly neutral with a little of each polarity.
    pub const MILD_NEUTRAL: Self = Self {
        pos: 0.1,
        neg: 0.1,
        neu: 0.8,
    };

    /// Validates components and renormalizes small floating drift away.
    pub fn new(pos: f64, neg: f64, neu: f64) -> Result<Self, ClassifierError> {
        for (name, v) in [("pos", pos), ("neg", neg), ("neu", neu)] {
            if !v.is_finite() || !(0.0..=1.0 + SUM_TOLERANCE).contains(&v) {
                return Err(ClassifierError::InvalidResponse(format!(
                    "{name} probability out of range: {v}"
                )));
            }
        }
        let sum = pos + neg + neu;
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ClassifierError::InvalidResponse(format!(
                "probabilities sum to {sum:.4}"
            )));
        }
        Ok(Self {
            pos: pos / sum,
            neg: neg / sum,
            neu: neu / sum,
        })
    }

    pub fn pos(&self) -> f64 {
        self.pos
    }

    pub fn neg(&self) -> f64 {
        self.neg
    }

    pub fn neu(&self) -> f64 {
        self.neu
    }

    /// How non-neutral the snippet is.
    pub fn intensity(&self) -> f64 {
        self.pos.max(self.neg)
    }
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifierResult, ClassifierError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn SentimentClassifier>;

/// Build the configured classifier.
pub fn build_from_config(cfg: &ClassifierConfig) -> anyhow::Result<DynClassifier> {
    let client: DynClassifier = match cfg.provider {
        ClassifierProvider::Lexicon => Arc::new(LexiconClassifier::new()),
        ClassifierProvider::Mock => Arc::new(FixedClassifier::neutral()),
        ClassifierProvider::Http => {
            let endpoint = cfg
                .endpoint
                .clone()
                .ok_or_else(|| anyhow::anyhow!("http classifier needs an endpoint"))?;
            Arc::new(HttpClassifier::new(
                endpoint,
                cfg.api_key.clone(),
                Duration::from_millis(cfg.timeout_ms),
            )?)
        }
    };
    tracing::info!(provider = client.name(), "classifier ready");
    Ok(client)
}
