use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::analyzer::SentimentAnalyzer;
use crate::error::ApiError;
use crate::extract::conversation_id;
use crate::feedback::{
    compute_offset, tally, CorrectionOffset, FeedbackLedger, FeedbackRecord, FeedbackStats,
    FeedbackSubmission,
};
use crate::levels::{SentimentLevel, LEVEL_COUNT};
use crate::metrics::Metrics;
use crate::result::AnalysisResult;
use crate::summary::DashboardReport;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<SentimentAnalyzer>,
    pub ledger: Arc<FeedbackLedger>,
    /// Max conversations analyzed in parallel per batch request.
    pub batch_concurrency: usize,
}

/// Full HTTP surface. `/metrics` is mounted only when a recorder is given.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/version", get(version))
        .route("/analyze", post(analyze))
        .route("/dashboard/analyze", post(dashboard_analyze))
        .route("/feedback", post(save_feedback))
        .route("/feedbacks", get(list_feedbacks))
        .route("/feedbacks/stats", get(feedback_stats))
        .route("/feedbacks/offsets", get(feedback_offsets))
        .route("/feedbacks/clear", post(clear_feedbacks))
        .with_state(state);

    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    app.layer(CorsLayer::very_permissive())
}

async fn version() -> Json<Value> {
    let labels: Vec<&str> = SentimentLevel::ALL
        .iter()
        .map(|l| l.display_label())
        .collect();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "sentiment_levels": LEVEL_COUNT,
        "features": ["weighted_scoring", "real_7_scores", "reduced_neutral_bias", "feedback_refinement"],
        "labels": labels,
    }))
}

/// Run a ledger operation off the async executor.
async fn with_ledger<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&FeedbackLedger) -> T + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ApiError::Internal(format!("feedback ledger task failed: {e}")))
}

/// The offset when refinement is active, recomputed per request.
async fn active_offset(state: &AppState) -> Result<Option<CorrectionOffset>, ApiError> {
    let offset = with_ledger(state, |l| l.correction_offsets()).await?;
    Ok(offset.is_active().then_some(offset))
}

enum AnalyzeInput {
    Single(Value),
    Batch(Vec<Value>),
}

fn parse_analyze_body(headers: &HeaderMap, body: &Bytes) -> Result<AnalyzeInput, ApiError> {
    let is_text = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));

    if is_text {
        let text = std::str::from_utf8(body)
            .map_err(|_| ApiError::BadRequest("body is not valid UTF-8".into()))?;
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest("empty transcript".into()));
        }
        return Ok(AnalyzeInput::Single(Value::String(text.to_string())));
    }

    let invalid =
        || ApiError::BadRequest("Invalid request. Send a JSON body or a text/plain transcript.".into());
    let value: Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    let usable = match &value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.trim().is_empty(),
        _ => false,
    };
    if !usable {
        return Err(invalid());
    }
    Ok(match value {
        Value::Array(items) => AnalyzeInput::Batch(items),
        other => AnalyzeInput::Single(other),
    })
}

#[derive(Serialize)]
struct BatchItemResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    result: AnalysisResult,
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let input = parse_analyze_body(&headers, &body)?;
    let offset = active_offset(&state).await?;

    match input {
        AnalyzeInput::Single(conversation) => {
            let result = match &offset {
                Some(o) => state.analyzer.analyze_refined(&conversation, o).await,
                None => state.analyzer.analyze(&conversation).await,
            };
            Ok(Json(result).into_response())
        }
        AnalyzeInput::Batch(items) => {
            let ids: Vec<Option<String>> = items.iter().map(conversation_id).collect();
            let results = state
                .analyzer
                .analyze_batch(items, offset, state.batch_concurrency)
                .await;
            let out: Vec<BatchItemResult> = ids
                .into_iter()
                .zip(results)
                .map(|(id, result)| BatchItemResult { id, result })
                .collect();
            Ok(Json(out).into_response())
        }
    }
}

async fn dashboard_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DashboardReport>, ApiError> {
    let conversations: Vec<Value> = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Array(items)) => items,
        _ => {
            return Err(ApiError::BadRequest(
                "expected a JSON list of conversations".into(),
            ))
        }
    };

    let offset = with_ledger(&state, |l| l.correction_offsets()).await?;
    let refinement = offset.is_active().then(|| offset.clone());
    let results = state
        .analyzer
        .analyze_batch(conversations.clone(), refinement, state.batch_concurrency)
        .await;

    Ok(Json(DashboardReport::build(&conversations, &results, &offset)))
}

async fn save_feedback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let submission: FeedbackSubmission = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid request".into()))?;
    let record = with_ledger(&state, move |l| l.save(&submission)).await??;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Correction saved: {} -> {}",
            record.original_label, record.corrected_label
        ),
    })))
}

#[derive(Serialize)]
struct FeedbackOverview {
    feedbacks: Vec<FeedbackRecord>,
    stats: FeedbackStats,
    offsets: CorrectionOffset,
}

async fn list_feedbacks(
    State(state): State<AppState>,
) -> Result<Json<FeedbackOverview>, ApiError> {
    let overview = with_ledger(&state, |l| {
        // One snapshot so the three views agree.
        let feedbacks = l.records();
        FeedbackOverview {
            stats: tally(&feedbacks),
            offsets: compute_offset(&feedbacks),
            feedbacks,
        }
    })
    .await?;
    Ok(Json(overview))
}

async fn feedback_stats(State(state): State<AppState>) -> Result<Json<FeedbackStats>, ApiError> {
    Ok(Json(with_ledger(&state, |l| l.stats()).await?))
}

async fn feedback_offsets(
    State(state): State<AppState>,
) -> Result<Json<CorrectionOffset>, ApiError> {
    Ok(Json(with_ledger(&state, |l| l.correction_offsets()).await?))
}

async fn clear_feedbacks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = with_ledger(&state, |l| l.clear()).await??;
    Ok(Json(json!({ "success": true, "removed": removed })))
}
