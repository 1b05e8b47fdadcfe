//! Extraction entry points.
//!
//! [`Extractor`] ties the stages together for one request:
//!
//! ```text
//! stage ──▶ prompt ──▶ docconv? ──▶ llm ──▶ postprocess
//! (tempdir)  (by ext)   (.doc/.docx)  (upload/poll/generate/release)
//! ```
//!
//! Every request runs inside an `info_span!("request", id = ..)` so log lines
//! from concurrent requests can be told apart. Staged and converted files
//! live in the request's temp directory and disappear when it is dropped.

use crate::config::ServiceConfig;
use crate::error::DocExtractError;
use crate::formats::{self, extension_of, is_word_document, mime_type_for, PDF_MIME};
use crate::pipeline::docconv::DocumentConverter;
use crate::pipeline::gemini::GeminiFileService;
use crate::pipeline::input::{self, StagedFile};
use crate::pipeline::llm::{self, RemoteFileService};
use crate::pipeline::postprocess::{normalize, NormalizedResult};
use crate::prompts::resolve_prompt;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared, cheaply clonable extraction service.
#[derive(Clone)]
pub struct Extractor {
    config: Arc<ServiceConfig>,
    service: Arc<dyn RemoteFileService>,
    converter: Arc<DocumentConverter>,
    http: reqwest::Client,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    pub fn new(
        config: ServiceConfig,
        service: Arc<dyn RemoteFileService>,
        converter: DocumentConverter,
    ) -> Self {
        Self {
            config: Arc::new(config),
            service,
            converter: Arc::new(converter),
            http: reqwest::Client::new(),
        }
    }

    /// The production wiring: Gemini file service and the default converter chain.
    pub fn from_config(config: ServiceConfig) -> Result<Self, DocExtractError> {
        let service = GeminiFileService::new(&config)?;
        let converter = DocumentConverter::with_defaults(&config);
        Ok(Self::new(config, Arc::new(service), converter))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Extract from an uploaded file's name and contents.
    pub async fn extract_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
        custom_prompt: Option<&str>,
    ) -> Result<NormalizedResult, DocExtractError> {
        if filename.trim().is_empty() {
            return Err(DocExtractError::EmptyFilename);
        }
        validate_format(filename)?;
        self.check_size(bytes.len() as u64)?;

        let request_id = Uuid::new_v4();
        async {
            info!("Processing upload {} ({} bytes)", filename, bytes.len());
            let staged = StagedFile::from_bytes(request_id, filename, bytes).await?;
            self.extract_staged(&staged, custom_prompt).await
        }
        .instrument(info_span!("request", id = %request_id))
        .await
    }

    /// Download `url` and extract from it.
    pub async fn extract_url(
        &self,
        url: &str,
        custom_prompt: Option<&str>,
    ) -> Result<NormalizedResult, DocExtractError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DocExtractError::MissingUrl);
        }

        let request_id = Uuid::new_v4();
        async {
            let staged = input::download_url(&self.http, request_id, url, &self.config).await?;
            self.extract_staged(&staged, custom_prompt).await
        }
        .instrument(info_span!("request", id = %request_id))
        .await
    }

    /// Extract from a local file. The file is copied first and never modified.
    pub async fn extract_path(
        &self,
        path: &Path,
        custom_prompt: Option<&str>,
    ) -> Result<NormalizedResult, DocExtractError> {
        validate_format(path)?;
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            DocExtractError::InvalidRequest(format!("cannot read '{}': {e}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(DocExtractError::InvalidRequest(format!(
                "'{}' is not a file",
                path.display()
            )));
        }
        self.check_size(meta.len())?;

        let request_id = Uuid::new_v4();
        async {
            let staged = StagedFile::from_path(request_id, path).await?;
            self.extract_staged(&staged, custom_prompt).await
        }
        .instrument(info_span!("request", id = %request_id))
        .await
    }

    /// Run the pipeline on an already staged file.
    ///
    /// The prompt is chosen from the original file, before any conversion.
    /// A failed Word conversion is logged and the original file is sent.
    pub async fn extract_staged(
        &self,
        staged: &StagedFile,
        custom_prompt: Option<&str>,
    ) -> Result<NormalizedResult, DocExtractError> {
        let start = Instant::now();
        let original = staged.path();
        let prompt = resolve_prompt(original, custom_prompt);

        let converted = if is_word_document(original) {
            match self.converter.convert_to_pdf(original).await {
                Ok(pdf) => Some(pdf),
                Err(e) => {
                    warn!("Continuing with the original file: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let (upload_path, mime_type, display_name): (&Path, String, Cow<'_, str>) =
            match &converted {
                Some(pdf) => (
                    pdf.as_path(),
                    PDF_MIME.to_string(),
                    Cow::Owned(pdf_display_name(staged.display_name())),
                ),
                None => (
                    original,
                    mime_type_for(original),
                    Cow::Borrowed(staged.display_name()),
                ),
            };

        let raw = llm::extract(
            Arc::clone(&self.service),
            upload_path,
            &mime_type,
            &display_name,
            prompt,
            Arc::clone(&self.config),
        )
        .await?;
        debug!("Raw model output: {}", raw);

        let result = normalize(&raw);
        debug!("Normalised output: {}", result.to_pretty_string());
        info!(
            "Extracted {} ({}) in {:?}",
            display_name,
            if result.is_json() { "json" } else { "text" },
            start.elapsed()
        );
        Ok(result)
    }

    fn check_size(&self, size: u64) -> Result<(), DocExtractError> {
        let limit = self.config.max_upload_bytes;
        if size > limit {
            return Err(DocExtractError::PayloadTooLarge { size, limit });
        }
        Ok(())
    }
}

fn validate_format(path: impl AsRef<Path>) -> Result<(), DocExtractError> {
    let path = path.as_ref();
    if formats::is_supported(path) {
        Ok(())
    } else {
        Err(DocExtractError::unsupported(
            extension_of(path).unwrap_or_default(),
        ))
    }
}

fn pdf_display_name(name: &str) -> String {
    Path::new(name)
        .with_extension("pdf")
        .to_string_lossy()
        .into_owned()
}
