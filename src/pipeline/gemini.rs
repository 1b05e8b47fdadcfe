//! [`RemoteFileService`] over the Gemini REST API.
//!
//! | Call     | HTTP                                                        |
//! |----------|-------------------------------------------------------------|
//! | upload   | `POST /upload/v1beta/files` (resumable start) then `POST` the bytes to the returned session URL |
//! | refresh  | `GET /v1beta/{name}`                                         |
//! | generate | `POST /v1beta/models/{model}:generateContent`                |
//! | delete   | `DELETE /v1beta/{name}`                                      |
//!
//! The key travels in the `x-goog-api-key` header, never in the query string,
//! so it stays out of access logs.

use super::llm::{RemoteFile, RemoteFileService, RemoteFileState};
use crate::config::ServiceConfig;
use crate::error::DocExtractError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini file store and generation client.
pub struct GeminiFileService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiFileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiFileService")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiFileService {
    /// Build a client from `config`. Fails when no API key is configured.
    pub fn new(config: &ServiceConfig) -> Result<Self, DocExtractError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DocExtractError::ProviderNotConfigured {
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY), or pass --api-key.".into(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DocExtractError::ProviderNotConfigured {
                hint: format!("HTTP client could not be built: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
        })
    }

    fn file_url(&self, remote_id: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, remote_id)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
}

impl FileResource {
    fn into_remote(self, fallback_mime: &str) -> RemoteFile {
        RemoteFile {
            state: parse_state(self.state.as_deref()),
            mime_type: if self.mime_type.is_empty() {
                fallback_mime.to_string()
            } else {
                self.mime_type
            },
            remote_id: self.name,
            uri: self.uri,
        }
    }
}

/// Only `ACTIVE` is usable. Unspecified, missing or unknown states keep
/// polling until the processing deadline.
fn parse_state(state: Option<&str>) -> RemoteFileState {
    match state {
        Some("ACTIVE") => RemoteFileState::Active,
        Some("FAILED") => RemoteFileState::Failed,
        _ => RemoteFileState::Processing,
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: &serde_json::Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

async fn check_status(
    stage: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, DocExtractError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(DocExtractError::extraction(
        stage,
        format!("HTTP {status}: {}", body.trim()),
    ))
}

// ── Protocol ────────────────────────────────────────────────────────────────

#[async_trait]
impl RemoteFileService for GeminiFileService {
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocExtractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DocExtractError::Staging { source })?;

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| DocExtractError::extraction("upload", e))?;
        let start = check_status("upload", start).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DocExtractError::extraction("upload", "response carried no upload URL")
            })?;
        debug!("Upload session opened for {}", display_name);

        let resp = self
            .client
            .post(&session_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DocExtractError::extraction("upload", e))?;
        let resp = check_status("upload", resp).await?;

        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| DocExtractError::extraction("upload", e))?;
        Ok(uploaded.file.into_remote(mime_type))
    }

    async fn refresh(&self, file: &RemoteFile) -> Result<RemoteFile, DocExtractError> {
        let resp = self
            .client
            .get(self.file_url(&file.remote_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| DocExtractError::extraction("status", e))?;
        let resource: FileResource = check_status("status", resp)
            .await?
            .json()
            .await
            .map_err(|e| DocExtractError::extraction("status", e))?;
        Ok(resource.into_remote(&file.mime_type))
    }

    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, DocExtractError> {
        let body = json!({
            "contents": [{ "parts": [
                { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                { "text": prompt }
            ]}]
        });
        let resp = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocExtractError::extraction("generate", e))?;
        let json: serde_json::Value = check_status("generate", resp)
            .await?
            .json()
            .await
            .map_err(|e| DocExtractError::extraction("generate", e))?;

        response_text(&json).ok_or_else(|| {
            let reason = json["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| json["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("no text in response");
            DocExtractError::extraction("generate", format!("empty model response ({reason})"))
        })
    }

    async fn delete(&self, file: &RemoteFile) -> Result<(), DocExtractError> {
        let resp = self
            .client
            .delete(self.file_url(&file.remote_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| DocExtractError::extraction("delete", e))?;
        check_status("delete", resp).await?;
        Ok(())
    }
}
