//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

const DEFAULT_RECENT: usize = 20;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, strict: state.pipeline.settings().strict, patterns: state.pipeline.pattern_count() })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_normalize(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NormalizeIn>,
) -> impl IntoResponse {
  let out = normalize_text(&state, &body.text, &body.context);
  info!(target: "question_pipeline", source = out.source, count = out.questions.len(), "HTTP normalize served");
  Json(out)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_convert(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RecordIn>,
) -> impl IntoResponse {
  convert_record(&state, body.record, &body.context)
    .map(Json)
    .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, Json(e)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_infer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RecordIn>,
) -> impl IntoResponse {
  infer_record(&state, body.record, &body.context)
    .map(Json)
    .map_err(|e| (StatusCode::BAD_REQUEST, Json(e)))
}

#[instrument(level = "info", skip(state, body), fields(grade = %body.grade))]
pub async fn http_post_validate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ValidateIn>,
) -> impl IntoResponse {
  let result = validate(&state, body);
  info!(target: "question_pipeline", valid = result.valid, errors = result.errors.len(), "HTTP validate served");
  Json(result)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.pipeline.statistics())
}

#[instrument(level = "info", skip(state), fields(limit = ?q.limit))]
pub async fn http_get_recent(
  State(state): State<Arc<AppState>>,
  Query(q): Query<RecentQuery>,
) -> impl IntoResponse {
  let entries = state.pipeline.recent(q.limit.unwrap_or(DEFAULT_RECENT));
  Json(RecentOut { entries })
}
