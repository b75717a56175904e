//! Per-conversation pipeline: extract snippets, classify each one
//! sequentially, aggregate, calibrate.
//!
//! A failing or slow classifier call costs one snippet, never the whole
//! conversation. With no usable snippet the result is the neutral default.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::calibrate::{apply_offset, calibrate};
use crate::classifier::{ClassifierError, ClassifierResult, DynClassifier};
use crate::extract::{Conversation, Snippet};
use crate::feedback::CorrectionOffset;
use crate::logging::anon_hash;
use crate::metrics::{
    ANALYSES_TOTAL, ANALYSIS_DURATION_MS, CLASSIFIER_FAILURES_TOTAL, NEUTRAL_FALLBACK_TOTAL,
    SNIPPETS_CLASSIFIED_TOTAL,
};
use crate::result::AnalysisResult;

/// Per-call bound on the classifier.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SentimentAnalyzer {
    classifier: DynClassifier,
    timeout: Duration,
}

impl SentimentAnalyzer {
    pub fn new(classifier: DynClassifier) -> Self {
        Self {
            classifier,
            timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Analyze any of the accepted input shapes. Never fails.
    pub async fn analyze(&self, conversation: &Value) -> AnalysisResult {
        self.analyze_conversation(&Conversation::from_value(conversation))
            .await
    }

    pub async fn analyze_conversation(&self, conversation: &Conversation) -> AnalysisResult {
        let started = Instant::now();
        counter!(ANALYSES_TOTAL).increment(1);

        let snippets = conversation.snippets();
        let mut results = Vec::with_capacity(snippets.len());
        for snippet in &snippets {
            if let Some(r) = self.classify_snippet(snippet).await {
                results.push(r);
            }
        }

        let result = match aggregate(&results) {
            Some(agg) => calibrate(&agg),
            None => {
                counter!(NEUTRAL_FALLBACK_TOTAL).increment(1);
                debug!(
                    snippets = snippets.len(),
                    "no usable snippets, returning neutral default"
                );
                AnalysisResult::neutral_default()
            }
        };

        histogram!(ANALYSIS_DURATION_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Analyze, then shift by the feedback offset when it is active.
    pub async fn analyze_refined(
        &self,
        conversation: &Value,
        offset: &CorrectionOffset,
    ) -> AnalysisResult {
        apply_offset(&self.analyze(conversation).await, offset)
    }

    /// Analyze many conversations with at most `concurrency` in flight.
    /// Output order matches input order; a slot whose task panicked holds the
    /// neutral default.
    pub async fn analyze_batch(
        self: &Arc<Self>,
        conversations: Vec<Value>,
        offset: Option<CorrectionOffset>,
        concurrency: usize,
    ) -> Vec<AnalysisResult> {
        let n = conversations.len();
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let offset = offset.map(Arc::new);

        let mut tasks = JoinSet::new();
        for (i, conversation) in conversations.into_iter().enumerate() {
            let analyzer = Arc::clone(self);
            let permits = Arc::clone(&permits);
            let offset = offset.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it were.
                let _permit = permits.acquire_owned().await.ok();
                let result = match offset.as_deref() {
                    Some(o) => analyzer.analyze_refined(&conversation, o).await,
                    None => analyzer.analyze(&conversation).await,
                };
                (i, result)
            });
        }

        let mut out = vec![AnalysisResult::neutral_default(); n];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, result)) => out[i] = result,
                Err(e) => warn!(error = %e, "batch task failed, slot keeps the neutral default"),
            }
        }
        out
    }

    async fn classify_snippet(&self, snippet: &Snippet) -> Option<ClassifierResult> {
        let outcome = tokio::time::timeout(self.timeout, self.classifier.classify(snippet.as_str()))
            .await
            .unwrap_or(Err(ClassifierError::Timeout(self.timeout)));

        match outcome {
            Ok(r) => {
                counter!(SNIPPETS_CLASSIFIED_TOTAL).increment(1);
                Some(r)
            }
            Err(e) => {
                counter!(CLASSIFIER_FAILURES_TOTAL).increment(1);
                warn!(
                    snippet = %anon_hash(snippet.as_str()),
                    classifier = self.classifier.name(),
                    error = %e,
                    "classifier call failed, skipping snippet"
                );
                None
            }
        }
    }
}
