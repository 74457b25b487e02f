//! Integration tests for the HTTP backend client against an in-process server.

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::sync::Arc;

use finsight_core::api::{AnalysisBackend, HttpBackend, Session, fetch_many};
use finsight_core::config::ApiConfig;
use finsight_core::poller::{JobOutcome, PollOptions, watch_job};
use finsight_core::types::Credentials;
use finsight_core::{ApiError, GroundednessScorer, GroundednessStatus, GroundingReport, JobStatus};

fn analysis_json(id: &str) -> Value {
    json!({
        "answer": "Revenue grew 12% year over year.",
        "verification_status": "PASS",
        "intelligence_hub": {
            "key_highlights": [{"icon": "trending-up", "text": "Revenue up", "metric_value": "+12%"}],
            "sentiment": {"score": 71, "description": "Positive outlook"},
            "risk": {"level": "Low", "description": "Stable balance sheet"},
            "risk_factors": [],
            "suggested_questions": []
        },
        "metadata": {"document_id": id},
        "retrieval_scores": [0.92, 0.88, 0.81, 0.79, 0.4],
        "generation_logprobs": [-0.05, -0.1, -0.02]
    })
}

async fn status(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "doc-ready" => Json(json!({
            "status": "completed",
            "current_stage": "intelligence",
            "stage_index": 4,
            "total_stages": 4,
            "message": "Done"
        }))
        .into_response(),
        "doc-broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "pipeline offline"})),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn analysis(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "doc-ready" | "doc-other" => Json(analysis_json(&id)).into_response(),
        "doc-broken" => StatusCode::BAD_GATEWAY.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn analyze(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let mut resp = analysis_json(&id);
    resp["answer"] = body["query"].clone();
    Json(resp)
}

async fn me(headers: HeaderMap) -> Response {
    let cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie == "auth_token=secret" {
        Json(json!({"id": "u1", "email": "analyst@example.com", "created_at": "2026-01-02T00:00:00Z"}))
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "hunter2" {
        Json(json!({
            "access_token": "secret",
            "token_type": "bearer",
            "user": {"id": "u1", "email": body["email"], "created_at": "2026-01-02T00:00:00Z"}
        }))
        .into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"detail": "Invalid credentials"}))).into_response()
    }
}

async fn upload(headers: HeaderMap) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    Json(json!({
        "document_id": "doc-new",
        "num_chunks": 42,
        "num_pages": 120,
        "s3_key": "uploads/doc-new.pdf",
        "status": "ingested"
    }))
    .into_response()
}

async fn documents() -> Json<Value> {
    Json(json!([
        {"document_id": "doc-ready", "ticker": "ACME", "filename": "acme-2025.pdf", "created_at": "2026-03-01"},
        {"document_id": "doc-other", "ticker": "GLOBX", "filename": "globex-2025.pdf", "created_at": "2026-03-02"}
    ]))
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/analysis/{id}/status", get(status))
        .route("/analysis/{id}", post(analyze))
        .route("/api/documents/{id}/analysis", get(analysis))
        .route("/documents/", get(documents))
        .route("/documents/upload", post(upload))
        .route("/api/dashboard/stats", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/auth/me", get(me))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(base_url: String, session: Session) -> HttpBackend {
    let config = ApiConfig {
        base_url,
        ..Default::default()
    };
    HttpBackend::new(&config, session).unwrap()
}

#[tokio::test]
async fn test_status_decodes() {
    let b = backend(spawn_server().await, Session::anonymous());
    let status = b.get_status("doc-ready").await.unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.current_stage.as_deref(), Some("intelligence"));
}

#[tokio::test]
async fn test_status_404_is_not_found() {
    let b = backend(spawn_server().await, Session::anonymous());
    let err = b.get_status("doc-missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_status_500_carries_detail() {
    let b = backend(spawn_server().await, Session::anonymous());
    let err = b.get_status("doc-broken").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 500,
            message: "pipeline offline".into()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_analysis_is_none() {
    let b = backend(spawn_server().await, Session::anonymous());
    assert_eq!(b.get_analysis("doc-missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_analysis_feeds_scorer() {
    let b = backend(spawn_server().await, Session::anonymous());
    let analysis = b.get_analysis("doc-ready").await.unwrap().unwrap();
    let report = GroundingReport::from_analysis(&GroundednessScorer::default(), &analysis);
    assert_eq!(report.groundedness.status, GroundednessStatus::Pass);
    assert_eq!(report.consensus.top_scores_count, 4);
}

#[tokio::test]
async fn test_batch_over_http_covers_every_id() {
    let b = backend(spawn_server().await, Session::anonymous());
    let map = fetch_many(&b, &["doc-ready", "doc-broken", "doc-missing", "doc-other"]).await;
    assert_eq!(map.len(), 4);
    assert!(map["doc-ready"].is_some());
    assert!(map["doc-broken"].is_none());
    assert!(map["doc-missing"].is_none());
    assert!(map["doc-other"].is_some());
}

#[tokio::test]
async fn test_poller_over_http() {
    let b = Arc::new(backend(spawn_server().await, Session::anonymous()));
    let mut handle = watch_job(
        b,
        "doc-ready",
        PollOptions::default().with_interval(std::time::Duration::from_millis(50)),
    );
    let outcome = handle.outcome().await.unwrap();
    assert!(matches!(outcome, JobOutcome::Completed(ref s) if s.message.as_deref() == Some("Done")));
}

#[tokio::test]
async fn test_analyze_posts_query() {
    let b = backend(spawn_server().await, Session::anonymous());
    let resp = b.analyze("doc-ready", "What drove growth?").await.unwrap();
    assert_eq!(resp.answer, "What drove growth?");
    assert_eq!(resp.metadata.document_id, "doc-ready");
}

#[tokio::test]
async fn test_session_cookie_forwarded() {
    let base = spawn_server().await;
    let anonymous = backend(base.clone(), Session::anonymous());
    assert_eq!(anonymous.me().await.unwrap_err(), ApiError::Unauthorized);

    let authed = backend(base, Session::with_token("secret"));
    let user = authed.me().await.unwrap();
    assert_eq!(user.email, "analyst@example.com");
}

#[tokio::test]
async fn test_login_then_me() {
    let mut b = backend(spawn_server().await, Session::anonymous());
    let token = b
        .login(&Credentials {
            email: "analyst@example.com".into(),
            password: "hunter2".into(),
        })
        .await
        .unwrap();
    b.set_session(Session::with_token(token.access_token));
    assert!(b.session().is_authenticated());
    assert_eq!(b.me().await.unwrap().id, "u1");
}

#[tokio::test]
async fn test_login_rejected() {
    let b = backend(spawn_server().await, Session::anonymous());
    let err = b
        .login(&Credentials {
            email: "analyst@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 400,
            message: "Invalid credentials".into()
        }
    );
}

#[tokio::test]
async fn test_dashboard_stats_fall_back_to_zero() {
    let b = backend(spawn_server().await, Session::anonymous());
    let stats = b.dashboard_stats().await;
    assert_eq!(stats.total_reports, 0);
    assert_eq!(stats.last_analysis, None);
}

#[tokio::test]
async fn test_logout_swallows_errors() {
    let b = backend(spawn_server().await, Session::with_token("secret"));
    b.logout().await;
}

#[tokio::test]
async fn test_list_documents() {
    let b = backend(spawn_server().await, Session::anonymous());
    let docs = b.list_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1].ticker, "GLOBX");
}

#[tokio::test]
async fn test_upload_sends_multipart() {
    let b = backend(spawn_server().await, Session::anonymous());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acme-2025.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();

    let ingest = b.upload(&path, "ACME").await.unwrap();
    assert_eq!(ingest.document_id, "doc-new");
    assert_eq!(ingest.num_chunks, 42);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let b = backend(format!("http://{addr}"), Session::anonymous());
    let err = b.get_status("doc-ready").await.unwrap_err();
    assert!(err.is_transient(), "unexpected error: {err:?}");
}
