//! End-to-end integration tests for edgequake-docextract.
//!
//! The HTTP router is driven in-process with `tower::ServiceExt::oneshot`.
//! Remote dependencies are replaced by local axum servers bound to
//! `127.0.0.1:0`: a file server for `/api/process_url` and a stub of the
//! Gemini file/generation API for the real client. No network access or API
//! key is needed.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use edgequake_docextract::pipeline::docconv::TextReconstructionStrategy;
use edgequake_docextract::pipeline::gemini::GeminiFileService;
use edgequake_docextract::{
    router, DocExtractError, DocumentConverter, Extractor, NormalizedResult, RemoteFile,
    RemoteFileService, RemoteFileState, ServiceConfig,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SeenUpload {
    path: PathBuf,
    mime_type: String,
    display_name: String,
    head: Vec<u8>,
}

/// Records every call; replies with a fixed text or a generation error.
#[derive(Default)]
struct RecordingService {
    uploads: Mutex<Vec<SeenUpload>>,
    prompts: Mutex<Vec<String>>,
    releases: AtomicUsize,
    reply: String,
    fail_generation: bool,
}

impl RecordingService {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            ..Default::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_generation: true,
            ..Default::default()
        })
    }

    fn only_upload(&self) -> SeenUpload {
        let uploads = self.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1, "expected exactly one upload");
        uploads[0].clone()
    }
}

#[async_trait]
impl RemoteFileService for RecordingService {
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocExtractError> {
        let bytes = std::fs::read(path).expect("uploaded file must exist during upload");
        self.uploads.lock().unwrap().push(SeenUpload {
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            display_name: display_name.to_string(),
            head: bytes.iter().take(8).copied().collect(),
        });
        Ok(RemoteFile {
            remote_id: "files/recorded".into(),
            uri: "https://files.invalid/recorded".into(),
            mime_type: mime_type.to_string(),
            state: RemoteFileState::Active,
        })
    }

    async fn refresh(&self, file: &RemoteFile) -> Result<RemoteFile, DocExtractError> {
        Ok(file.clone())
    }

    async fn generate(&self, _: &RemoteFile, prompt: &str) -> Result<String, DocExtractError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_generation {
            return Err(DocExtractError::ExtractionFailed {
                stage: "generate",
                message: "model unavailable".into(),
            });
        }
        Ok(self.reply.clone())
    }

    async fn delete(&self, _: &RemoteFile) -> Result<(), DocExtractError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn app_with(service: Arc<RecordingService>, config: ServiceConfig) -> Router {
    let converter = DocumentConverter::new(vec![Box::new(TextReconstructionStrategy)]);
    router(Arc::new(Extractor::new(config, service, converter)))
}

fn app(service: Arc<RecordingService>) -> Router {
    app_with(service, ServiceConfig::default())
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

const BOUNDARY: &str = "docextract-test-boundary";

/// One multipart form field.
enum Part<'a> {
    /// The `file` field.
    File { filename: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let data = match part {
            Part::File { filename, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                *data
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                value.as_bytes()
            }
        };
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn url_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process_url")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};
    let mut docx = Docx::new();
    for p in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)));
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut buf).unwrap();
    buf.into_inner()
}

// ── Health and form ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_reports_formats_and_configured_limit() {
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["max_file_size"], "8MB");
    let formats: Vec<&str> = body["supported_formats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(formats.len(), 11);
    assert!(formats.contains(&".docx"));
    assert!(formats.contains(&".tif"));
}

#[tokio::test]
async fn test_health_limit_follows_config() {
    let config = ServiceConfig::builder()
        .max_upload_bytes(16 * 1024 * 1024)
        .build()
        .unwrap();
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (_, body) = send(app_with(RecordingService::replying("{}"), config), req).await;
    assert_eq!(body["max_file_size"], "16MB");
}

#[tokio::test]
async fn test_index_serves_form() {
    let req = Request::get("/").body(Body::empty()).unwrap();
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::OK);
    let html = body.as_str().unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains(".pdf, .png, .jpg"));
}

// ── /api/upload ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_image_returns_camel_case_json() {
    let service = RecordingService::replying(
        "```json\n{\"Document Type\": \"Passport\", \"Personal Information\": {\"First Name\": \"Ada\"}}\n```",
    );
    let req = multipart_request(&[
        Part::File { filename: "passport scan.jpg", data: b"\xFF\xD8\xFFjpeg" },
    ]);
    let (status, body) = send(app(service.clone()), req).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({"result": {"documentType": "Passport", "personalInformation": {"firstName": "Ada"}}})
    );

    let seen = service.only_upload();
    assert_eq!(seen.mime_type, "image/jpeg");
    assert_eq!(seen.display_name, "passport_scan.jpg");
    assert_eq!(service.releases.load(Ordering::SeqCst), 1);
    assert!(!seen.path.exists(), "staged file must be removed");
}

#[tokio::test]
async fn test_upload_plain_text_reply_is_returned_as_string() {
    let service = RecordingService::replying("  Not JSON at all  ");
    let req = multipart_request(&[Part::File { filename: "a.pdf", data: b"%PDF-1.4" }]);
    let (status, body) = send(app(service), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "Not JSON at all"}));
}

#[tokio::test]
async fn test_upload_custom_prompt_overrides_selector() {
    let service = RecordingService::replying("{}");
    let req = multipart_request(&[
        Part::Text { name: "custom_prompt", value: "Only list the dates" },
        Part::File { filename: "a.png", data: b"\x89PNG" },
    ]);
    let (status, _) = send(app(service.clone()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service.prompts.lock().unwrap()[0], "Only list the dates");
}

#[tokio::test]
async fn test_upload_docx_is_sent_as_pdf_and_cleaned_up() {
    let service = RecordingService::replying("{\"First Name\": \"Ada\"}");
    let docx = docx_bytes(&["First Name: Ada", "Last Name: Lovelace"]);
    let req = multipart_request(&[Part::File { filename: "cv.docx", data: &docx }]);
    let (status, body) = send(app(service.clone()), req).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({"result": {"firstName": "Ada"}}));

    let seen = service.only_upload();
    assert_eq!(seen.mime_type, "application/pdf");
    assert_eq!(seen.display_name, "cv.pdf");
    assert!(seen.head.starts_with(b"%PDF"));
    assert_eq!(
        service.prompts.lock().unwrap()[0],
        edgequake_docextract::prompts::DOCUMENT_PROMPT
    );

    assert!(!seen.path.exists(), "converted PDF must be removed");
    let dir = seen.path.parent().unwrap();
    assert!(!dir.exists(), "request directory must be removed");
}

#[tokio::test]
async fn test_upload_unconvertible_doc_falls_back_to_original() {
    let service = RecordingService::replying("{}");
    let req = multipart_request(&[
        Part::File { filename: "legacy.doc", data: b"\xD0\xCF\x11\xE0binary" },
    ]);
    let (status, _) = send(app(service.clone()), req).await;

    assert_eq!(status, StatusCode::OK);
    let seen = service.only_upload();
    assert_eq!(seen.mime_type, "application/msword");
    assert_eq!(seen.display_name, "legacy.doc");
}

#[tokio::test]
async fn test_upload_missing_file_is_400() {
    let service = RecordingService::replying("{}");
    let req = multipart_request(&[Part::Text { name: "custom_prompt", value: "hello" }]);
    let (status, body) = send(app(service.clone()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
    assert!(service.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_empty_filename_is_400() {
    let req = multipart_request(&[Part::File { filename: "", data: b"data" }]);
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn test_upload_unsupported_format_lists_supported() {
    let req = multipart_request(&[Part::File { filename: "notes.txt", data: b"hello" }]);
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let msg = body["error"].as_str().unwrap();
    assert!(msg.contains(".txt"), "{msg}");
    assert!(msg.contains(".pdf, .png, .jpg, .jpeg"), "{msg}");
}

#[tokio::test]
async fn test_upload_not_multipart_is_400() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_upload_over_limit_is_413() {
    let config = ServiceConfig::builder().max_upload_bytes(16).build().unwrap();
    let service = RecordingService::replying("{}");
    let req = multipart_request(&[Part::File { filename: "big.pdf", data: &[b'x'; 100] }]);
    let (status, body) = send(app_with(service.clone(), config), req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("16"));
    assert!(service.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_extraction_failure_is_500_and_releases_once() {
    let service = RecordingService::failing();
    let req = multipart_request(&[Part::File { filename: "a.pdf", data: b"%PDF-1.4" }]);
    let (status, body) = send(app(service.clone()), req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("model unavailable"));
    assert_eq!(service.releases.load(Ordering::SeqCst), 1);
    assert!(!service.only_upload().path.exists());
}

// ── /api/process_url ─────────────────────────────────────────────────────────

fn served(
    hits: &AtomicUsize,
    content_type: Option<&'static str>,
    body: &'static [u8],
) -> (HeaderMap, &'static [u8]) {
    hits.fetch_add(1, Ordering::SeqCst);
    let mut headers = HeaderMap::new();
    if let Some(ct) = content_type {
        headers.insert(header::CONTENT_TYPE, ct.parse().unwrap());
    }
    (headers, body)
}

async fn spawn_file_server(hits: Arc<AtomicUsize>) -> String {
    let (pdf_hits, html_hits, txt_hits) = (hits.clone(), hits.clone(), hits);
    let app = Router::new()
        .route(
            "/download/report",
            get(move || async move {
                served(&pdf_hits, Some("application/pdf"), b"%PDF-1.4 remote")
            }),
        )
        .route(
            "/page",
            get(move || async move { served(&html_hits, Some("text/html"), b"<html></html>") }),
        )
        .route(
            "/notes.txt",
            get(move || async move { served(&txt_hits, None, b"text") }),
        )
        .route("/gone.pdf", get(|| async { StatusCode::NOT_FOUND }));
    format!("http://{}", spawn(app).await)
}

#[tokio::test]
async fn test_process_url_infers_extension_from_content_type() {
    let base = spawn_file_server(Arc::new(AtomicUsize::new(0))).await;
    let service = RecordingService::replying("{\"Exam Type\": \"IELTS\"}");
    let req = url_request(json!({"file_url": format!("{base}/download/report")}));
    let (status, body) = send(app(service.clone()), req).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({"result": {"examType": "IELTS"}}));
    let seen = service.only_upload();
    assert_eq!(seen.mime_type, "application/pdf");
    assert_eq!(seen.display_name, "downloaded_file.pdf");
    assert_eq!(seen.head, b"%PDF-1.4".to_vec());
    assert!(!seen.path.exists());
}

#[tokio::test]
async fn test_process_url_unsupported_content_type_is_400() {
    let base = spawn_file_server(Arc::new(AtomicUsize::new(0))).await;
    let service = RecordingService::replying("{}");
    let req = url_request(json!({"file_url": format!("{base}/page")}));
    let (status, body) = send(app(service.clone()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".bin"));
    assert!(service.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_process_url_unsupported_path_extension_is_not_fetched() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_file_server(hits.clone()).await;
    let req = url_request(json!({"file_url": format!("{base}/notes.txt")}));
    let (status, _) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_process_url_http_error_is_500() {
    let base = spawn_file_server(Arc::new(AtomicUsize::new(0))).await;
    let req = url_request(json!({"file_url": format!("{base}/gone.pdf")}));
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_process_url_missing_url_is_400() {
    for payload in [json!({}), json!({"file_url": ""}), json!({"custom_prompt": "x"})] {
        let (status, body) = send(app(RecordingService::replying("{}")), url_request(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a file URL");
    }
}

#[tokio::test]
async fn test_process_url_malformed_json_is_400() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/process_url")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(app(RecordingService::replying("{}")), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// ── Gemini client against a local stub ──────────────────────────────────────

#[derive(Clone)]
struct GeminiStub {
    base: Arc<Mutex<String>>,
    final_state: &'static str,
    polls: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    uploaded: Arc<Mutex<Vec<u8>>>,
    generate_bodies: Arc<Mutex<Vec<Value>>>,
}

impl GeminiStub {
    fn new(final_state: &'static str) -> Self {
        Self {
            base: Arc::new(Mutex::new(String::new())),
            final_state,
            polls: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
            uploaded: Arc::new(Mutex::new(Vec::new())),
            generate_bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn file_json(&self, state: &str, mime: &str) -> Value {
        let base = self.base.lock().unwrap().clone();
        json!({
            "name": "files/abc123",
            "uri": format!("{base}/v1beta/files/abc123"),
            "mimeType": mime,
            "state": state,
        })
    }
}

fn authorised(headers: &HeaderMap) -> bool {
    headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) == Some("test-key")
}

async fn stub_upload_start(State(stub): State<GeminiStub>, headers: HeaderMap) -> impl IntoResponse {
    if !authorised(&headers) {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), "bad key");
    }
    assert_eq!(headers["x-goog-upload-protocol"], "resumable");
    assert_eq!(headers["x-goog-upload-command"], "start");
    let mut out = HeaderMap::new();
    let session = format!("{}/upload-session/1", stub.base.lock().unwrap());
    out.insert("x-goog-upload-url", session.parse().unwrap());
    (StatusCode::OK, out, "{}")
}

async fn stub_upload_bytes(
    State(stub): State<GeminiStub>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    assert_eq!(headers["x-goog-upload-command"], "upload, finalize");
    assert_eq!(headers["x-goog-upload-offset"], "0");
    *stub.uploaded.lock().unwrap() = body.to_vec();
    let mime = headers[header::CONTENT_TYPE].to_str().unwrap().to_string();
    Json(json!({ "file": stub.file_json("PROCESSING", &mime) }))
}

async fn stub_get_file(State(stub): State<GeminiStub>, UrlPath(id): UrlPath<String>) -> Json<Value> {
    assert_eq!(id, "abc123");
    let n = stub.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let state = if n >= 2 { stub.final_state } else { "PROCESSING" };
    Json(stub.file_json(state, "application/pdf"))
}

async fn stub_delete_file(State(stub): State<GeminiStub>, headers: HeaderMap) -> Json<Value> {
    assert!(authorised(&headers));
    stub.deletes.fetch_add(1, Ordering::SeqCst);
    Json(json!({}))
}

async fn stub_generate(
    State(stub): State<GeminiStub>,
    UrlPath(call): UrlPath<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    assert_eq!(call, "gemini-2.0-flash:generateContent");
    stub.generate_bodies.lock().unwrap().push(body);
    Json(json!({
        "candidates": [{ "content": { "parts": [
            { "text": "```json\n{\"First Name\": " },
            { "text": "\"Ada\", \"Date of Birth\": \"1815-12-10\"}\n```" }
        ]}}]
    }))
}

async fn spawn_gemini_stub(stub: GeminiStub) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    *stub.base.lock().unwrap() = base.clone();

    let app = Router::new()
        .route("/upload/v1beta/files", post(stub_upload_start))
        .route("/upload-session/1", post(stub_upload_bytes))
        .route("/v1beta/files/:id", get(stub_get_file).delete(stub_delete_file))
        .route("/v1beta/models/:call", post(stub_generate))
        .with_state(stub);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

fn gemini_extractor(base: &str) -> Extractor {
    let config = ServiceConfig::builder()
        .api_key("test-key")
        .api_base_url(base)
        .poll_interval_ms(1)
        .processing_timeout_secs(5)
        .build()
        .unwrap();
    let service = GeminiFileService::new(&config).unwrap();
    Extractor::new(config, Arc::new(service), DocumentConverter::new(vec![]))
}

#[tokio::test]
async fn test_gemini_protocol_end_to_end() {
    let stub = GeminiStub::new("ACTIVE");
    let base = spawn_gemini_stub(stub.clone()).await;
    let extractor = gemini_extractor(&base);

    let result = extractor
        .extract_bytes("transcript.pdf", b"%PDF-1.4 transcript", None)
        .await
        .unwrap();

    assert_eq!(
        result,
        NormalizedResult::Json(json!({"firstName": "Ada", "dateOfBirth": "1815-12-10"}))
    );
    assert_eq!(*stub.uploaded.lock().unwrap(), b"%PDF-1.4 transcript".to_vec());
    assert_eq!(stub.polls.load(Ordering::SeqCst), 2);
    assert_eq!(stub.deletes.load(Ordering::SeqCst), 1);

    let bodies = stub.generate_bodies.lock().unwrap();
    let parts = &bodies[0]["contents"][0]["parts"];
    assert_eq!(parts[0]["file_data"]["mime_type"], "application/pdf");
    assert_eq!(
        parts[0]["file_data"]["file_uri"],
        format!("{base}/v1beta/files/abc123")
    );
    assert!(parts[1]["text"]
        .as_str()
        .unwrap()
        .contains("Academic History"));
}

#[tokio::test]
async fn test_gemini_failed_processing_releases_once() {
    let stub = GeminiStub::new("FAILED");
    let base = spawn_gemini_stub(stub.clone()).await;
    let extractor = gemini_extractor(&base);

    let err = extractor
        .extract_bytes("scan.png", b"\x89PNG", None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocExtractError::RemoteProcessingFailed { .. }), "{err}");
    assert!(stub.generate_bodies.lock().unwrap().is_empty());
    assert_eq!(stub.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gemini_wrong_key_fails_at_upload() {
    let stub = GeminiStub::new("ACTIVE");
    let base = spawn_gemini_stub(stub.clone()).await;
    let config = ServiceConfig::builder()
        .api_key("wrong-key")
        .api_base_url(&base)
        .build()
        .unwrap();
    let extractor = Extractor::new(
        config.clone(),
        Arc::new(GeminiFileService::new(&config).unwrap()),
        DocumentConverter::new(vec![]),
    );

    let err = extractor
        .extract_bytes("a.pdf", b"%PDF", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
    assert_eq!(stub.deletes.load(Ordering::SeqCst), 0);
}
