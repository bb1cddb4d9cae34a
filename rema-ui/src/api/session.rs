//! Session endpoints: analysis submission, session view, clear and CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rema_common::export::DEFAULT_FILE_NAME;
use rema_common::ExportMode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::controller::{split_reviews, ApplyOutcome, ExportView, KNOWN_GENRES};
use crate::session::SessionSnapshot;
use crate::{ApiError, ApiResult, AppState};

/// POST /api/analyze request
///
/// Reviews come either as a list or as a multi-line text box (one review per line).
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub reviews: Option<Vec<String>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Result of a submission or rehydration
#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    /// "applied", "discarded" or "unchanged"
    pub outcome: &'static str,
    pub applied_records: usize,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct GenresResponse {
    pub genres: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub mode: Option<String>,
    pub view: Option<String>,
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

/// GET /api/genres
pub async fn get_genres() -> Json<GenresResponse> {
    Json(GenresResponse {
        genres: KNOWN_GENRES,
    })
}

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<ApplyResponse>> {
    let mut reviews = request.reviews.unwrap_or_default();
    if let Some(text) = request.text.as_deref() {
        reviews.extend(split_reviews(text));
    }

    let outcome = match state.controller.submit(&reviews, &request.genres).await {
        Ok(outcome) => outcome,
        Err(e) => return Err(service_error(&state, e).await),
    };
    state.clear_error().await;

    Ok(Json(apply_response(&state, outcome).await))
}

/// POST /api/rehydrate
pub async fn rehydrate(State(state): State<AppState>) -> ApiResult<Json<ApplyResponse>> {
    let outcome = match state.controller.rehydrate().await {
        Ok(outcome) => outcome,
        Err(e) => return Err(service_error(&state, e).await),
    };
    state.clear_error().await;

    Ok(Json(apply_response(&state, outcome).await))
}

/// POST /api/clear
pub async fn clear(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    if let Err(e) = state.controller.clear().await {
        return Err(service_error(&state, e).await);
    }
    state.clear_error().await;

    Ok(Json(state.controller.snapshot().await))
}

/// GET /api/export?mode=top|all&view=records|global|genre
pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mode = match query.mode.as_deref() {
        Some(raw) => raw.parse::<ExportMode>()?,
        None => state.controller.default_export_mode(),
    };
    let view = match query.view.as_deref() {
        Some(raw) => raw.parse::<ExportView>()?,
        None => ExportView::default(),
    };

    let document = state.controller.export(mode, view).await?;
    info!(mode = %mode, ?view, bytes = document.len(), "CSV export served");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DEFAULT_FILE_NAME),
            ),
        ],
        document,
    )
        .into_response())
}

async fn apply_response(state: &AppState, outcome: ApplyOutcome) -> ApplyResponse {
    let (label, applied_records) = match outcome {
        ApplyOutcome::Applied { records, .. } => ("applied", records),
        ApplyOutcome::Discarded { .. } => ("discarded", 0),
        ApplyOutcome::Unchanged => ("unchanged", 0),
    };

    ApplyResponse {
        outcome: label,
        applied_records,
        session: state.controller.snapshot().await,
    }
}

/// Remember service-side failures for /health, then convert
async fn service_error(state: &AppState, err: rema_common::Error) -> ApiError {
    if matches!(
        err,
        rema_common::Error::TransportFailure(_) | rema_common::Error::MalformedPayload(_)
    ) {
        state.record_error(err.to_string()).await;
    }
    ApiError::from(err)
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/genres", get(get_genres))
        .route("/api/analyze", post(analyze))
        .route("/api/rehydrate", post(rehydrate))
        .route("/api/clear", post(clear))
        .route("/api/export", get(export))
}
