// src/config.rs
//! Service configuration: TOML file plus environment overrides.

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

pub const ENV_CONFIG_PATH: &str = "SENTIMENT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/sentiment.toml";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_batch_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    #[default]
    Lexicon,
    Http,
    Mock,
}

impl std::str::FromStr for ClassifierProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexicon" => Ok(Self::Lexicon),
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            other => anyhow::bail!("unsupported classifier provider: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ClassifierProvider,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// "ENV" means: read from CLASSIFIER_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::default(),
            endpoint: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Conversations analyzed in parallel per batch request.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding `feedbacks.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            classifier: ClassifierConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `SENTIMENT_CONFIG_PATH` (or the default path), then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_file(path)
    }

    /// A missing file yields defaults; a malformed one is an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut cfg = if path.exists() {
            let data = fs::read_to_string(path)?;
            Self::from_toml_str(&data)
                .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(data)?)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Some(dir) = non_empty_env("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(p) = non_empty_env("CLASSIFIER_PROVIDER") {
            self.classifier.provider = p.parse()?;
        }
        if let Some(url) = non_empty_env("CLASSIFIER_ENDPOINT") {
            self.classifier.endpoint = Some(url);
        }
        if let Some(ms) = non_empty_env("CLASSIFIER_TIMEOUT_MS") {
            self.classifier.timeout_ms = ms
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("CLASSIFIER_TIMEOUT_MS is not a number: {ms}"))?;
        }

        // Resolve api key if "ENV"
        if let Some(key) = &self.classifier.api_key {
            if key.trim().eq_ignore_ascii_case("env") {
                self.classifier.api_key = Some(
                    env::var("CLASSIFIER_API_KEY")
                        .map_err(|_| anyhow::anyhow!("Missing CLASSIFIER_API_KEY env var"))?,
                );
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> anyhow::Result<()> {
        if self.classifier.timeout_ms == 0 {
            anyhow::bail!("classifier.timeout_ms must be > 0");
        }
        if self.classifier.provider == ClassifierProvider::Http
            && self.classifier.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            anyhow::bail!("classifier.provider = \"http\" requires classifier.endpoint");
        }
        if self.analysis.batch_concurrency == 0 {
            self.analysis.batch_concurrency = 1;
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
