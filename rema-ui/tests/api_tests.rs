//! Integration tests for rema-ui API endpoints
//!
//! The classification service is replaced by an in-memory fake so the router
//! can be driven with `oneshot` requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use rema_common::{Error, ExportMode, Result};
use rema_ui::client::AnalysisService;
use rema_ui::controller::SessionController;
use rema_ui::AppState;
use serde_json::{json, Value};
use tower::util::ServiceExt;

#[derive(Default)]
struct FakeService {
    submitted: Mutex<Vec<(Vec<String>, Vec<String>)>>,
    unavailable: AtomicBool,
    malformed: AtomicBool,
}

#[async_trait]
impl AnalysisService for FakeService {
    async fn submit_for_analysis(&self, reviews: &[String], genres: &[String]) -> Result<Value> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::TransportFailure("connection refused".to_string()));
        }
        if self.malformed.load(Ordering::SeqCst) {
            return Ok(json!({"results": "oops"}));
        }
        self.submitted
            .lock()
            .unwrap()
            .push((reviews.to_vec(), genres.to_vec()));

        let results: Vec<Value> = reviews
            .iter()
            .map(|r| {
                json!({
                    "Review": r,
                    "Genre": genres,
                    "Sentiment": "Neutral",
                    "Emotions": [{"Emotion": "Joy", "Score": 0.6}, {"Emotion": "Fear", "Score": 0.2}],
                    "Summary": "summary"
                })
            })
            .collect();
        Ok(json!({
            "results": results,
            "aggregate": {"Genre": genres, "Sentiment": "Neutral", "Emotions": []}
        }))
    }

    async fn fetch_history(&self) -> Result<Value> {
        Ok(json!({"results": []}))
    }

    async fn reset_history(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::TransportFailure("connection refused".to_string()));
        }
        Ok(())
    }
}

fn create_test_app() -> (axum::Router, Arc<FakeService>) {
    let service = Arc::new(FakeService::default());
    let controller = Arc::new(SessionController::new(
        service.clone(),
        ExportMode::TopEmotions,
    ));
    let app = rema_ui::build_router(AppState::new(controller), None);
    (app, service)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _service) = create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "rema-ui");
    assert_eq!(json["records"], 0);
}

#[tokio::test]
async fn test_genres_endpoint() {
    let (app, _service) = create_test_app();

    let response = app.oneshot(get("/api/genres")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["genres"].as_array().unwrap().len(), 20);
    assert_eq!(json["genres"][0], "Drama");
}

#[tokio::test]
async fn test_empty_session() {
    let (app, _service) = create_test_app();

    let response = app.oneshot(get("/api/session")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["record_count"], 0);
    assert!(json["overall_average"].is_null());
    assert_eq!(json["views"]["global_emotion_chart"], json!([]));
}

#[tokio::test]
async fn test_analyze_then_session() {
    let (app, service) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/analyze",
            json!({"text": "Great film!\n\nToo slow and boring\n", "genres": ["Drama"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["outcome"], "applied");
    assert_eq!(json["applied_records"], 2);
    assert_eq!(json["session"]["records"][1]["Review"], "Too slow and boring");
    assert_eq!(json["session"]["aggregate"]["Sentiment"], "Neutral");

    let submitted = service.submitted.lock().unwrap().clone();
    assert_eq!(
        submitted[0].0,
        vec!["Great film!".to_string(), "Too slow and boring".to_string()]
    );

    let response = app.oneshot(get("/api/session")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["record_count"], 2);
    assert_eq!(json["views"]["genre_emotion_summary"][0]["genre"], "Drama");
    assert_eq!(json["views"]["genre_emotion_summary"][0]["Joy"], 0.6);
    assert_eq!(json["overall_average"], 0.4);
}

#[tokio::test]
async fn test_analyze_rejects_missing_genres() {
    let (app, service) = create_test_app();

    let response = app
        .oneshot(post_json("/api/analyze", json!({"reviews": ["fine"], "genres": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(service.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_transport_failure_is_503() {
    let (app, service) = create_test_app();
    service.unavailable.store(true, Ordering::SeqCst);

    let response = app
        .clone()
        .oneshot(post_json("/api/analyze", json!({"reviews": ["fine"], "genres": ["War"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "SERVICE_UNAVAILABLE");

    let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_analyze_malformed_payload_is_502() {
    let (app, service) = create_test_app();
    service.malformed.store(true, Ordering::SeqCst);

    let response = app
        .clone()
        .oneshot(post_json("/api/analyze", json!({"reviews": ["fine"], "genres": ["War"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let session = body_json(app.oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(session["record_count"], 0);
}

#[tokio::test]
async fn test_export_empty_session_is_409() {
    let (app, _service) = create_test_app();

    let response = app.oneshot(get("/api/export")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "EMPTY_SESSION");
}

#[tokio::test]
async fn test_export_csv_attachment() {
    let (app, _service) = create_test_app();

    app.clone()
        .oneshot(post_json(
            "/api/analyze",
            json!({"reviews": ["Great film!", "Too slow and boring"], "genres": ["Drama"]}),
        ))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/api/export?mode=top")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"analysis_results.csv\""
    );

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[1],
        "\"1\",\"Great film!\",\"Drama\",\"Neutral\",\"Joy (0.600)\",\"Fear (0.200)\""
    );

    let response = app
        .clone()
        .oneshot(get("/api/export?mode=all&view=genre"))
        .await
        .unwrap();
    let csv = body_text(response).await;
    assert_eq!(csv.lines().next(), Some("\"Genre\",\"Joy\",\"Fear\""));

    let response = app.oneshot(get("/api/export?mode=dense")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_empties_session() {
    let (app, _service) = create_test_app();

    app.clone()
        .oneshot(post_json("/api/analyze", json!({"reviews": ["a"], "genres": ["Drama"]})))
        .await
        .unwrap();

    let response = app.clone().oneshot(post_empty("/api/clear")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["record_count"], 0);

    let response = app.oneshot(get("/api/export")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_clear_failure_keeps_session() {
    let (app, service) = create_test_app();

    app.clone()
        .oneshot(post_json("/api/analyze", json!({"reviews": ["a"], "genres": ["Drama"]})))
        .await
        .unwrap();
    service.unavailable.store(true, Ordering::SeqCst);

    let response = app.clone().oneshot(post_empty("/api/clear")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let session = body_json(app.oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(session["record_count"], 1);
}

#[tokio::test]
async fn test_rehydrate_with_empty_history() {
    let (app, _service) = create_test_app();

    let response = app.oneshot(post_empty("/api/rehydrate")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["outcome"], "unchanged");
    assert_eq!(json["session"]["record_count"], 0);
}

#[tokio::test]
async fn test_static_assets_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>REMA</h1>").unwrap();

    let controller = Arc::new(SessionController::new(
        Arc::new(FakeService::default()),
        ExportMode::TopEmotions,
    ));
    let app = rema_ui::build_router(AppState::new(controller), Some(dir.path()));

    let response = app.clone().oneshot(get("/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>REMA</h1>");

    // API routes still win over the bundle
    let response = app.oneshot(get("/api/genres")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
