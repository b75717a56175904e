//! Deterministic classifiers for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{ClassifierError, ClassifierResult, SentimentClassifier};

/// Returns the same triple for every snippet.
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    pub fixed: ClassifierResult,
}

impl FixedClassifier {
    pub fn new(fixed: ClassifierResult) -> Self {
        Self { fixed }
    }

    /// Mildly neutral output (used by `provider = "mock"`).
    pub fn neutral() -> Self {
        Self::new(ClassifierResult::MILD_NEUTRAL)
    }
}

#[async_trait]
impl SentimentClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassifierResult, ClassifierError> {
        Ok(self.fixed)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Looks snippets up by exact text; unknown text gets the fallback.
/// Texts listed in `failing` return an error. Counts calls, including ones
/// still waiting out `delay`.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, ClassifierResult>,
    failing: Vec<String>,
    fallback: Option<ClassifierResult>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, text: impl Into<String>, r: ClassifierResult) -> Self {
        self.answers.insert(text.into(), r);
        self
    }

    pub fn fail_on(mut self, text: impl Into<String>) -> Self {
        self.failing.push(text.into());
        self
    }

    pub fn fallback(mut self, r: ClassifierResult) -> Self {
        self.fallback = Some(r);
        self
    }

    /// Sleep this long inside every call before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierResult, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.iter().any(|f| f == text) {
            return Err(ClassifierError::Transport(format!(
                "scripted failure for {} chars",
                text.chars().count()
            )));
        }
        self.answers
            .get(text)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| ClassifierError::InvalidResponse("no scripted answer".into()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingClassifier;

#[async_trait]
impl SentimentClassifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassifierResult, ClassifierError> {
        Err(ClassifierError::Transport("model unavailable".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Sleeps before answering; exercises the per-snippet timeout.
#[derive(Debug, Clone)]
pub struct SlowClassifier {
    pub delay: Duration,
    pub fixed: ClassifierResult,
}

#[async_trait]
impl SentimentClassifier for SlowClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassifierResult, ClassifierError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.fixed)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}
