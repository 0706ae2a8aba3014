//! HTTP API over the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/`, `/health` | Health check (returns version) |
//! | `POST` | `/upload` | Multipart upload (field `file`), extract + chunk |
//! | `GET`  | `/analyze/{chunk_id}` | Score one chunk and store the result |
//! | `POST` | `/analyze_file/{file_id}` | Score every chunk of a file |
//! | `GET`  | `/search?q&file_id&limit` | Token-overlap search |
//! | `GET`  | `/export?file_id` | CSV download of chunks joined with scores |
//! | `GET`  | `/email_summary?file_id&to_email` | Mail the summary and CSV |
//! | `GET`  | `/rules` | Active rule table and its version |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! on another port can call the API.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use parallel_text_core::models::RuleMatches;
use parallel_text_core::Error;

use crate::config::Config;
use crate::export::{export_filename, render_csv};
use crate::mail::{send_summary, Mailer, SmtpMailer};
use crate::pipeline::{FileAnalysis, Pipeline};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Search snippets are cut to this many characters.
const SNIPPET_CHARS: usize = 800;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// `None` when `[mail]` is not configured.
    pub mailer: Option<Arc<dyn Mailer>>,
}

/// Build the router. Exposed so tests can drive it without a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/analyze/{chunk_id}", get(handle_analyze))
        .route("/analyze_file/{file_id}", post(handle_analyze_file))
        .route("/search", get(handle_search))
        .route("/export", get(handle_export))
        .route("/email_summary", get(handle_email_summary))
        .route("/rules", get(handle_rules))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::open(config).await?;
    let mailer: Option<Arc<dyn Mailer>> = config
        .mail
        .clone()
        .map(|m| Arc::new(SmtpMailer::new(m)) as Arc<dyn Mailer>);
    if mailer.is_none() {
        tracing::info!("[mail] not configured; /email_summary is disabled");
    }

    let app = router(AppState { pipeline, mailer });

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoText => bad_request("Could not extract text from file"),
            Error::InvalidInput(msg) => bad_request(msg),
            Error::NotFound(msg) => not_found(msg),
            Error::Persistence(e) | Error::Internal(e) => {
                tracing::error!(error = %format!("{:#}", e), "request failed");
                internal(format!("processing failed: {}", e))
            }
        }
    }
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    file_id: String,
    total_chunks: usize,
    chunk_ids: Vec<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("multipart field 'file' is required"))?;
    let receipt = state.pipeline.upload(bytes, &filename).await?;

    Ok(Json(UploadResponse {
        message: "File uploaded and chunked successfully".to_string(),
        file_id: receipt.file_id,
        total_chunks: receipt.total_chunks,
        chunk_ids: receipt.chunk_ids,
    }))
}

// ============ GET /analyze/{chunk_id} ============

#[derive(Serialize)]
struct AnalyzeResponse {
    chunk_id: String,
    matches: RuleMatches,
    patterns: Vec<String>,
    score: i64,
    rule_set_version: String,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Path(chunk_id): Path<String>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let record = state.pipeline.analyze(&chunk_id).await?;
    Ok(Json(AnalyzeResponse {
        chunk_id: record.chunk_id,
        matches: record.matches,
        patterns: record.patterns,
        score: record.score,
        rule_set_version: record.rule_set_version,
    }))
}

// ============ POST /analyze_file/{file_id} ============

async fn handle_analyze_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<FileAnalysis>, AppError> {
    Ok(Json(state.pipeline.analyze_file(&file_id).await?))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    file_id: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SearchResultItem {
    chunk_id: String,
    score: f64,
    snippet: String,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    file_id: Option<String>,
    results: Vec<SearchResultItem>,
    count: usize,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("Query parameter 'q' is required"))?;
    let file_id = params.file_id.filter(|f| !f.is_empty());

    let hits = state
        .pipeline
        .search(&query, file_id.as_deref(), params.limit)
        .await?;

    let results: Vec<SearchResultItem> = hits
        .into_iter()
        .map(|h| SearchResultItem {
            snippet: snippet(&h.text),
            chunk_id: h.chunk_id,
            score: h.score,
        })
        .collect();

    Ok(Json(SearchResponse {
        query,
        file_id,
        count: results.len(),
        results,
    }))
}

// ============ GET /export ============

#[derive(Deserialize)]
struct ExportParams {
    file_id: Option<String>,
}

async fn handle_export(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let file_id = params
        .file_id
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| bad_request("file_id parameter is required"))?;

    let rows = state.pipeline.with_scores(&file_id).await?;
    let csv = render_csv(&rows).map_err(|e| internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export_filename(&file_id)),
            ),
        ],
        csv,
    )
        .into_response())
}

// ============ GET /email_summary ============

#[derive(Deserialize)]
struct EmailParams {
    file_id: Option<String>,
    to_email: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_email_summary(
    State(state): State<AppState>,
    Query(params): Query<EmailParams>,
) -> Result<Json<MessageResponse>, AppError> {
    let (file_id, to) = match (params.file_id, params.to_email) {
        (Some(f), Some(t)) if !f.trim().is_empty() && !t.trim().is_empty() => (f, t),
        _ => return Err(bad_request("file_id and to_email are required")),
    };
    send_summary(&state.pipeline, state.mailer.as_deref(), &file_id, &to).await?;

    Ok(Json(MessageResponse {
        message: format!("Summary email sent to {}", to),
    }))
}

// ============ GET /rules ============

#[derive(Serialize)]
struct RuleInfo {
    name: String,
    pattern: String,
    weight: i64,
}

#[derive(Serialize)]
struct RulesResponse {
    version: String,
    rules: Vec<RuleInfo>,
    /// Rule name to weight, for clients that only need the weights.
    weights: BTreeMap<String, i64>,
}

async fn handle_rules(State(state): State<AppState>) -> Json<RulesResponse> {
    let rules = state.pipeline.rules();
    Json(RulesResponse {
        version: rules.version().to_string(),
        rules: rules
            .rules()
            .iter()
            .map(|r| RuleInfo {
                name: r.name.clone(),
                pattern: r.pattern.clone(),
                weight: r.weight,
            })
            .collect(),
        weights: rules
            .rules()
            .iter()
            .map(|r| (r.name.clone(), r.weight))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::OutgoingMail;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parallel_text_core::rules::RuleSet;
    use parallel_text_core::store::memory::InMemoryStore;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn state(mailer: Option<Arc<dyn Mailer>>) -> AppState {
        let config = Config::with_db_path("unused.sqlite");
        let pipeline = Pipeline::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(RuleSet::builtin()),
            &config,
        );
        AppState { pipeline, mailer }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn multipart(filename: &str, content: &str) -> Request<Body> {
        let boundary = "X-PTX-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
            c = content
        );
        Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn upload(app: &Router, content: &str) -> serde_json::Value {
        let (status, body) = send(app, multipart("doc.txt", content)).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(state(None));
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let (status, _) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_analyze_search_flow() {
        let app = router(state(None));
        let up = upload(&app, "Contact me at test@example.com, urgent request!").await;
        assert_eq!(up["total_chunks"], 1);
        let chunk_id = up["chunk_ids"][0].as_str().unwrap().to_string();

        let (status, analyzed) = get_json(&app, &format!("/analyze/{}", chunk_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(analyzed["score"], 15);
        assert_eq!(analyzed["matches"]["email"][0], "test@example.com");

        let (status, found) = get_json(&app, "/search?q=urgent%20request").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["count"], 1);
        assert_eq!(found["results"][0]["chunk_id"], chunk_id.as_str());
        assert_eq!(found["results"][0]["score"], 1.0);
    }

    #[tokio::test]
    async fn blank_upload_is_bad_request() {
        let app = router(state(None));
        let (status, body) = send(&app, multipart("blank.txt", "   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn missing_query_and_unknown_chunk() {
        let app = router(state(None));
        let (status, body) = get_json(&app, "/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, body) = get_json(&app, "/analyze/nope_chunk_1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn export_returns_csv_attachment() {
        let app = router(state(None));
        let up = upload(&app, "asap please").await;
        let file_id = up["file_id"].as_str().unwrap();

        let resp = app
            .clone()
            .oneshot(
                Request::get(format!("/export?file_id={}", file_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.ends_with(&format!("{}_chunks.csv", file_id)));
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("chunk_id,text,score,matches,patterns\n"));
        assert!(text.contains(",0,{},[]"));

        let (status, _) = get_json(&app, "/export?file_id=unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn email_summary_paths() {
        let mailer = Arc::new(CapturingMailer::default());
        let app = router(state(Some(mailer.clone())));
        let up = upload(&app, "urgent issue").await;
        let file_id = up["file_id"].as_str().unwrap();

        let (status, body) = get_json(
            &app,
            &format!("/email_summary?file_id={}&to_email=ops@example.com", file_id),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Summary email sent to ops@example.com");
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, format!("Text Processing Summary - {}", file_id));
        drop(sent);

        let (status, _) = get_json(
            &app,
            "/email_summary?file_id=unknown&to_email=ops@example.com",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn email_disabled_or_failing() {
        let app = router(state(None));
        let up = upload(&app, "urgent issue").await;
        let uri = format!(
            "/email_summary?file_id={}&to_email=ops@example.com",
            up["file_id"].as_str().unwrap()
        );
        let (status, _) = get_json(&app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let failing = Arc::new(CapturingMailer {
            fail: true,
            ..Default::default()
        });
        let app = router(state(Some(failing)));
        let up = upload(&app, "urgent issue").await;
        let uri = format!(
            "/email_summary?file_id={}&to_email=ops@example.com",
            up["file_id"].as_str().unwrap()
        );
        let (status, body) = get_json(&app, &uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal");
    }

    #[tokio::test]
    async fn rules_lists_builtin_table() {
        let app = router(state(None));
        let (status, body) = get_json(&app, "/rules").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rules"].as_array().unwrap().len(), 11);
        assert_eq!(body["rules"][0]["name"], "email");
        assert_eq!(body["weights"]["email"], 8);
        assert_eq!(body["version"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn snippet_cuts_long_text() {
        assert_eq!(snippet("short"), "short");
        let long = "é".repeat(900);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), 803);
        assert!(s.ends_with("..."));
    }
}
