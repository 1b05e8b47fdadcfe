//! HTTP surface.
//!
//! | Route                   | Body                                   |
//! |-------------------------|----------------------------------------|
//! | `GET /`                 | upload form                            |
//! | `POST /api/upload`      | multipart: `file`, `custom_prompt?`    |
//! | `POST /api/process_url` | JSON: `{file_url, custom_prompt?}`     |
//! | `GET /health`           | status, formats, size limit            |
//!
//! Successful extractions answer `200 {"result": ..}`. Errors answer
//! `{"error": ..}` with 400 for bad input, 413 for oversized input and 500
//! for everything else.

use crate::error::{DocExtractError, ErrorKind};
use crate::extract::Extractor;
use crate::formats::supported_extensions;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Room for multipart boundaries and the prompt field on top of the file limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

type AppState = Arc<Extractor>;

/// Build the service router.
pub fn router(extractor: Arc<Extractor>) -> Router {
    let body_limit = usize::try_from(extractor.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index))
        .route("/api/upload", post(upload))
        .route("/api/process_url", post(process_url))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(extractor)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, extractor: Arc<Extractor>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(extractor))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// An error rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn from_multipart(e: MultipartError) -> Self {
        Self::new(e.status(), e.body_text())
    }
}

impl From<DocExtractError> for ApiError {
    fn from(e: DocExtractError) -> Self {
        let status = match (&e, e.kind()) {
            (DocExtractError::PayloadTooLarge { .. }, _) => StatusCode::PAYLOAD_TOO_LARGE,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.message);
        } else {
            warn!("{} {}", self.status, self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn upload(
    State(extractor): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart =
        multipart.map_err(|r| ApiError::new(StatusCode::BAD_REQUEST, r.body_text()))?;

    let mut file = None;
    let mut custom_prompt = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
                file = Some((filename, bytes));
            }
            "custom_prompt" => {
                custom_prompt = Some(field.text().await.map_err(ApiError::from_multipart)?);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or(DocExtractError::MissingFile)?;
    let result = extractor
        .extract_bytes(&filename, &bytes, custom_prompt.as_deref())
        .await?;
    Ok(Json(json!({ "result": result })))
}

#[derive(Debug, Deserialize)]
struct UrlRequest {
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    custom_prompt: Option<String>,
}

async fn process_url(
    State(extractor): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|r| ApiError::new(StatusCode::BAD_REQUEST, r.body_text()))?;
    let url = req.file_url.unwrap_or_default();
    let result = extractor
        .extract_url(&url, req.custom_prompt.as_deref())
        .await?;
    Ok(Json(json!({ "result": result })))
}

async fn health(State(extractor): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "supported_formats": supported_extensions(),
        "max_file_size": extractor.config().max_file_size_label(),
    }))
}

async fn index(State(extractor): State<AppState>) -> Html<String> {
    Html(render_index(
        &supported_extensions().join(", "),
        &extractor.config().max_file_size_label(),
    ))
}

fn render_index(formats: &str, max_size: &str) -> String {
    let accept = supported_extensions().join(",");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Document extraction</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }}
textarea, input[type=url] {{ width: 100%; }}
pre {{ background: #f4f4f4; padding: 1rem; white-space: pre-wrap; }}
</style>
</head>
<body>
<h1>Document extraction</h1>
<p>Supported formats: {formats}. Maximum file size: {max_size}.</p>

<h2>Upload a file</h2>
<form id="upload-form">
  <input type="file" name="file" accept="{accept}" required>
  <p><textarea name="custom_prompt" rows="3" placeholder="Custom prompt (optional)"></textarea></p>
  <button type="submit">Extract</button>
</form>

<h2>Process a URL</h2>
<form id="url-form">
  <input type="url" name="file_url" placeholder="https://example.com/document.pdf" required>
  <p><textarea name="custom_prompt" rows="3" placeholder="Custom prompt (optional)"></textarea></p>
  <button type="submit">Extract</button>
</form>

<h2>Result</h2>
<pre id="result"></pre>

<script>
const out = document.getElementById("result");
async function show(resp) {{
  const body = await resp.json();
  out.textContent = JSON.stringify(body.result ?? body, null, 2);
}}
document.getElementById("upload-form").addEventListener("submit", async (e) => {{
  e.preventDefault();
  out.textContent = "Processing...";
  await show(await fetch("/api/upload", {{ method: "POST", body: new FormData(e.target) }}));
}});
document.getElementById("url-form").addEventListener("submit", async (e) => {{
  e.preventDefault();
  out.textContent = "Processing...";
  const data = Object.fromEntries(new FormData(e.target));
  if (!data.custom_prompt) delete data.custom_prompt;
  await show(await fetch("/api/process_url", {{
    method: "POST",
    headers: {{ "Content-Type": "application/json" }},
    body: JSON.stringify(data),
  }}));
}});
</script>
</body>
</html>
"#
    )
}
