//! Input staging: give every request its own temporary directory.
//!
//! ## Why a directory per request?
//!
//! Deriving the temp path from the uploaded filename alone lets two
//! concurrent uploads of `cv.docx` overwrite each other. Each request instead
//! gets a fresh [`TempDir`] named after its request id. The original, any
//! converted PDF and nothing else live inside it, and the whole directory is
//! removed when the [`StagedFile`] is dropped, whichever way the request
//! ends.

use crate::config::ServiceConfig;
use crate::error::DocExtractError;
use crate::formats::{self, extension_of};
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

/// A file staged for one request. Dropping it deletes the file and its directory.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    display_name: String,
    dir: TempDir,
}

impl StagedFile {
    /// Write `bytes` under `filename` (sanitised) in a new request directory.
    pub async fn from_bytes(
        request_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Self, DocExtractError> {
        let dir = request_dir(request_id)?;
        let name = sanitize_filename(filename);
        let path = dir.path().join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| DocExtractError::Staging { source })?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(Self {
            path,
            display_name: name,
            dir,
        })
    }

    /// Copy a local file into a new request directory.
    ///
    /// The copy keeps conversions from writing next to the caller's file.
    pub async fn from_path(request_id: Uuid, source: &Path) -> Result<Self, DocExtractError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let dir = request_dir(request_id)?;
        let name = sanitize_filename(filename);
        let path = dir.path().join(&name);
        tokio::fs::copy(source, &path)
            .await
            .map_err(|source| DocExtractError::Staging { source })?;
        Ok(Self {
            path,
            display_name: name,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name shown to the remote service.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Directory that is removed with this file.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

fn request_dir(request_id: Uuid) -> Result<TempDir, DocExtractError> {
    tempfile::Builder::new()
        .prefix(&format!("docextract-{request_id}-"))
        .tempdir()
        .map_err(|source| DocExtractError::Staging { source })
}

/// Reduce an untrusted filename to a safe single path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace runs become `_`;
/// leading dots and underscores are dropped. Falls back to `upload`, keeping a
/// recognisable extension when one survives.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut last_was_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push('_');
            }
            last_was_space = true;
            continue;
        }
        last_was_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }

    let trimmed = out.trim_start_matches(['.', '_']).trim_end_matches('_');
    if trimmed.is_empty() {
        return "upload".to_string();
    }
    match extension_of(base) {
        // Everything before the dot was dropped, e.g. a fully non-ASCII stem.
        Some(ext) if !trimmed.contains('.') => format!("upload{ext}"),
        _ => trimmed.to_string(),
    }
}

/// Check an `http(s)` URL and return the extension of its last path segment.
pub fn url_extension(url: &str) -> Result<Option<String>, DocExtractError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| DocExtractError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DocExtractError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(last_segment(&parsed).and_then(extension_of))
}

fn last_segment(url: &reqwest::Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
}

/// Extension implied by a `Content-Type` header value.
///
/// Unknown types map to `.bin`, which the registry rejects.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("pdf") {
        ".pdf"
    } else if ct.contains("png") {
        ".png"
    } else if ct.contains("jpeg") || ct.contains("jpg") {
        ".jpg"
    } else if ct.contains("wordprocessingml") {
        ".docx"
    } else if ct.contains("msword") {
        ".doc"
    } else {
        ".bin"
    }
}

/// Download `url` into a request directory.
///
/// The extension comes from the URL path, or from the response content type
/// when the path has none. URLs with an extension are validated against the
/// registry before any bytes are fetched; the rest are validated after.
pub async fn download_url(
    client: &reqwest::Client,
    request_id: Uuid,
    url: &str,
    config: &ServiceConfig,
) -> Result<StagedFile, DocExtractError> {
    let url_ext = url_extension(url)?;
    if let Some(ext) = &url_ext {
        if formats::lookup(ext).is_none() {
            return Err(DocExtractError::unsupported(ext.clone()));
        }
    }

    info!("Downloading file from: {}", url);
    let timeout_secs = config.download_timeout_secs;
    let mut response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let limit = config.max_upload_bytes;
    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(DocExtractError::PayloadTooLarge { size: len, limit });
        }
    }

    let extension = match url_ext {
        Some(ext) => ext,
        None => {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let ext = extension_for_content_type(content_type);
            debug!("Inferred extension {} from content type '{}'", ext, content_type);
            ext.to_string()
        }
    };
    if formats::lookup(&extension).is_none() {
        return Err(DocExtractError::unsupported(extension));
    }

    let filename = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| last_segment(&u).map(str::to_string))
        .filter(|s| extension_of(s).is_some())
        .unwrap_or_else(|| format!("downloaded_file{extension}"));

    // Content-Length is optional; the running total is what bounds memory.
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?
    {
        let size = (bytes.len() + chunk.len()) as u64;
        if size > limit {
            return Err(DocExtractError::PayloadTooLarge { size, limit });
        }
        bytes.extend_from_slice(&chunk);
    }

    let staged = StagedFile::from_bytes(request_id, &filename, &bytes).await?;
    info!("Downloaded {} bytes to {}", bytes.len(), staged.path().display());
    Ok(staged)
}

fn download_error(url: &str, secs: u64, e: reqwest::Error) -> DocExtractError {
    if e.is_timeout() {
        DocExtractError::DownloadTimeout {
            url: url.to_string(),
            secs,
        }
    } else {
        DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
