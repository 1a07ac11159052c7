//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/questions/normalize", post(http::http_post_normalize))
        .route("/api/v1/questions/convert", post(http::http_post_convert))
        .route("/api/v1/questions/infer", post(http::http_post_infer))
        .route("/api/v1/validate", post(http::http_post_validate))
        .route("/api/v1/validation/stats", get(http::http_get_stats))
        .route("/api/v1/validation/recent", get(http::http_get_recent))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::Pipeline;

    fn app() -> Router {
        build_router(Arc::new(AppState::with_pipeline(Pipeline::default())))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .expect("request");
        let resp = app.oneshot(req).await.expect("response");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_pattern_table() {
        let (status, body) = send(app(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert!(body["patterns"].as_u64().unwrap_or(0) >= 15);
    }

    #[tokio::test]
    async fn unparseable_text_gets_fallback_content() {
        let (status, body) = send(
            app(),
            "POST",
            "/api/v1/questions/normalize",
            Some(json!({"text": "sorry, I cannot help", "context": {"subject": "Math", "grade": "K", "skillName": "counting"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("fallback"));
        assert_eq!(body["questions"][0]["question"]["kind"], json!("counting"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn empty_question_list_gets_fallback_content() {
        let (status, body) = send(
            app(),
            "POST",
            "/api/v1/questions/normalize",
            Some(json!({"text": "{\"questions\": []}", "context": {"subject": "Science", "grade": "3"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("fallback"));
        assert_eq!(body["questions"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn convert_returns_canonical_question() {
        let (status, body) = send(
            app(),
            "POST",
            "/api/v1/questions/convert",
            Some(json!({
                "record": {"prompt": "True or False: The chef has 3 pots.", "visual": "🍲🍲🍲"},
                "context": {"subject": "Math", "grade": "K", "skillName": "counting"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"]["kind"], json!("true_false"));
        assert_eq!(body["question"]["statement"], json!("The chef has 3 pots."));
        assert_eq!(body["inference"]["source"], json!("literal_guard"));
    }

    #[tokio::test]
    async fn convert_failure_is_unprocessable() {
        let (status, body) = send(
            app(),
            "POST",
            "/api/v1/questions/convert",
            Some(json!({"record": {"prompt": "Pick", "type": "mcq"}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap_or_default().contains("no options"));
    }

    #[tokio::test]
    async fn validate_then_stats() {
        let state = Arc::new(AppState::with_pipeline(Pipeline::default()));
        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            "/api/v1/validate",
            Some(json!({"record": {"prompt": "How many suns?", "visual": "☀️", "type": "counting", "answer": 1}, "grade": "5", "subject": "Math"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], json!(false));

        let (_, stats) = send(build_router(state.clone()), "GET", "/api/v1/validation/stats", None).await;
        assert_eq!(stats["totalValidations"], json!(1));
        let (_, recent) = send(build_router(state), "GET", "/api/v1/validation/recent?limit=5", None).await;
        assert_eq!(recent["entries"].as_array().map(Vec::len), Some(1));
    }
}
