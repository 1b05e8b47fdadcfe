//! Error types for the edgequake-docextract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocExtractError`]: **Fatal**: the request cannot produce a result
//!   (bad input, download failure, remote model failure). Returned as
//!   `Err(DocExtractError)` from the [`crate::extract::Extractor`] entry points
//!   and translated to an HTTP status by [`crate::server`].
//!
//! * [`ConversionError`]: **Non-fatal**: a `.doc`/`.docx` file could not be
//!   turned into a PDF. The pipeline logs it and carries on with the original
//!   file, so callers only ever see it through logs.

use crate::formats::supported_extensions_list;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`DocExtractError`], used for HTTP mapping and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, empty or unsupported input. Caller's fault.
    Validation,
    /// The source URL could not be fetched.
    Download,
    /// Upload, processing or generation on the remote model failed.
    Extraction,
    /// A remote file never left the processing state before the deadline.
    Timeout,
    /// Local I/O, configuration or other unexpected failures.
    Internal,
}

/// All fatal errors returned by the edgequake-docextract library.
#[derive(Debug, Error)]
pub enum DocExtractError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The request carried no file part.
    #[error("No file provided")]
    MissingFile,

    /// A file part was present but its filename was empty.
    #[error("No file selected")]
    EmptyFilename,

    /// `/api/process_url` was called without a URL.
    #[error("Please provide a file URL")]
    MissingUrl,

    /// The URL could not be parsed or is not HTTP/HTTPS.
    #[error("Invalid file URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The file extension is not in the format registry.
    #[error("Unsupported file format '{extension}'. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    /// Malformed request body (bad multipart, bad JSON).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The file is larger than the configured limit.
    #[error("File of {size} bytes exceeds the maximum allowed size of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    // ── Download errors ───────────────────────────────────────────────────
    /// HTTP URL was syntactically valid but download failed.
    #[error("Error downloading file from '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Remote model errors ───────────────────────────────────────────────
    /// No API key or the client could not be built.
    #[error("Remote model provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// A call to the remote service failed at the given protocol stage.
    #[error("Error processing file ({stage}): {message}")]
    ExtractionFailed { stage: &'static str, message: String },

    /// The remote service marked the uploaded file as failed.
    #[error("File processing failed for remote file '{remote_id}': {detail}")]
    RemoteProcessingFailed { remote_id: String, detail: String },

    /// The remote file was still processing when the deadline passed.
    #[error("Remote file '{remote_id}' was still processing after {secs}s")]
    RemoteTimeout { remote_id: String, secs: u64 },

    // ── I/O and config errors ─────────────────────────────────────────────
    /// Could not create, write or copy the request's temporary file.
    #[error("Failed to stage temporary file: {source}")]
    Staging {
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocExtractError {
    /// Build an [`DocExtractError::UnsupportedFormat`] listing every supported extension.
    pub fn unsupported(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        DocExtractError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
            supported: supported_extensions_list(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocExtractError::MissingFile
            | DocExtractError::EmptyFilename
            | DocExtractError::MissingUrl
            | DocExtractError::InvalidUrl { .. }
            | DocExtractError::UnsupportedFormat { .. }
            | DocExtractError::InvalidRequest(_)
            | DocExtractError::PayloadTooLarge { .. } => ErrorKind::Validation,
            DocExtractError::DownloadFailed { .. } | DocExtractError::DownloadTimeout { .. } => {
                ErrorKind::Download
            }
            DocExtractError::ProviderNotConfigured { .. }
            | DocExtractError::ExtractionFailed { .. }
            | DocExtractError::RemoteProcessingFailed { .. } => ErrorKind::Extraction,
            DocExtractError::RemoteTimeout { .. } => ErrorKind::Timeout,
            DocExtractError::Staging { .. }
            | DocExtractError::InvalidConfig(_)
            | DocExtractError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn extraction(stage: &'static str, message: impl std::fmt::Display) -> Self {
        DocExtractError::ExtractionFailed {
            stage,
            message: message.to_string(),
        }
    }
}

/// A non-fatal failure of the document-to-PDF converter.
///
/// Individual strategy failures are collected into
/// [`ConversionError::Exhausted`]; only that variant (or
/// [`ConversionError::MissingOutput`]) ever leaves the converter.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// Strategy cannot run on this platform or input.
    #[error("{strategy}: not available ({reason})")]
    Unavailable {
        strategy: &'static str,
        reason: String,
    },

    /// Strategy ran and failed.
    #[error("{strategy}: {detail}")]
    Failed {
        strategy: &'static str,
        detail: String,
    },

    /// External converter did not finish in time.
    #[error("{strategy}: timed out after {secs}s")]
    TimedOut { strategy: &'static str, secs: u64 },

    /// A strategy reported success but the target file does not exist.
    #[error("PDF conversion failed - output file '{path}' was not created")]
    MissingOutput { path: PathBuf },

    /// Every strategy in the chain failed.
    #[error("Could not convert '{path}' to PDF: {}", attempts.join("; "))]
    Exhausted { path: PathBuf, attempts: Vec<String> },
}
