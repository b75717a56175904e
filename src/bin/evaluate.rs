//! Evaluate the configured classifier against a labeled dataset.
//!
//! Usage: `evaluate <dataset.json> [--json]`

use std::sync::Arc;
use std::time::Duration;

use conversation_sentiment::{
    classifier, config::AppConfig, evaluate, logging, SentimentAnalyzer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: evaluate <dataset.json> [--json]"))?;
    let as_json = args.any(|a| a == "--json");

    let cfg = AppConfig::load()?;
    let client = classifier::build_from_config(&cfg.classifier)?;
    let analyzer = Arc::new(
        SentimentAnalyzer::new(client)
            .with_timeout(Duration::from_millis(cfg.classifier.timeout_ms)),
    );

    let samples = evaluate::load_dataset(&path)?;
    tracing::info!(samples = samples.len(), "evaluating");
    let report = evaluate::run(&analyzer, samples, cfg.analysis.batch_concurrency).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
