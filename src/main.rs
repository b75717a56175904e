//! Conversation Sentiment Service: binary entrypoint.
//! Boots the Axum HTTP server on Shuttle with the configured classifier
//! and feedback ledger.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    conversation_sentiment::logging::init_tracing();

    let router = conversation_sentiment::app().await?;

    Ok(router.into())
}
