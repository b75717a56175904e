//! Remote model-serving classifier.
//!
//! Wire format: `POST {endpoint}` with `{"text": "..."}`. The response is either
//! flat `{"POS": .., "NEG": .., "NEU": ..}` or wrapped `{"probas": {...}}`,
//! with upper- or lowercase keys.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, ClassifierResult, SentimentClassifier};

pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("conversation-sentiment/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

#[derive(Serialize)]
struct Req<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Probas {
    #[serde(rename = "POS", alias = "pos")]
    pos: f64,
    #[serde(rename = "NEG", alias = "neg")]
    neg: f64,
    #[serde(rename = "NEU", alias = "neu")]
    neu: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Resp {
    Wrapped { probas: Probas },
    Flat(Probas),
}

/// Parse a model response body into a validated result.
pub(crate) fn parse_response(body: &[u8]) -> Result<ClassifierResult, ClassifierError> {
    let resp: Resp = serde_json::from_slice(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
    let p = match resp {
        Resp::Wrapped { probas } => probas,
        Resp::Flat(p) => p,
    };
    ClassifierResult::new(p.pos, p.neg, p.neu)
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierResult, ClassifierError> {
        let mut req = self.http.post(&self.endpoint).json(&Req { text });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClassifierError::Transport(format!(
                "model endpoint returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        parse_response(&bytes)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
