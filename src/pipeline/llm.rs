//! Remote model interaction: upload, wait, generate, release.
//!
//! The remote model does not take file bytes inline. A file is uploaded to
//! the provider's file store, processed asynchronously, then referenced from
//! a generation request. [`RemoteFileService`] is the seam for that
//! four-call protocol; [`crate::pipeline::gemini`] implements it over HTTP
//! and tests substitute a fake.
//!
//! ## Lifecycle guarantee
//!
//! Once [`RemoteFileService::upload`] succeeds, [`RemoteFileService::delete`]
//! is called exactly once, whatever happens in between (processing failure,
//! deadline, generation error). A failed delete is logged and never masks the
//! primary outcome.
//!
//! The remote calls run on a spawned task, so dropping the [`extract`] future
//! (client disconnect, Ctrl-C) does not skip the release: the task stops
//! waiting on the file and deletes it.
//!
//! ## Polling
//!
//! The file is re-read every `poll_interval_ms` until it leaves the
//! processing state. Unlike an unbounded loop, the wait is capped by
//! `processing_timeout_secs`; passing it yields
//! [`DocExtractError::RemoteTimeout`].

use crate::config::ServiceConfig;
use crate::error::DocExtractError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn, Instrument};

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFileState {
    Processing,
    Active,
    Failed,
}

/// Handle to a file held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Identifier used for refresh and delete, e.g. `files/abc123`.
    pub remote_id: String,
    /// URI referenced from generation requests.
    pub uri: String,
    pub mime_type: String,
    pub state: RemoteFileState,
}

/// The provider's file store plus generation endpoint.
#[async_trait]
pub trait RemoteFileService: Send + Sync {
    /// Upload `path` under `display_name` with the declared MIME type.
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, DocExtractError>;

    /// Re-read the current state of an uploaded file.
    async fn refresh(&self, file: &RemoteFile) -> Result<RemoteFile, DocExtractError>;

    /// Run the model on `file` with `prompt` and return its text output.
    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, DocExtractError>;

    /// Release the uploaded file.
    async fn delete(&self, file: &RemoteFile) -> Result<(), DocExtractError>;
}

/// Upload `path`, wait until it is usable, generate with `prompt`, release it.
///
/// Returns the raw model text; normalisation happens upstream.
pub async fn extract(
    service: Arc<dyn RemoteFileService>,
    path: &Path,
    mime_type: &str,
    display_name: &str,
    prompt: &str,
    config: Arc<ServiceConfig>,
) -> Result<String, DocExtractError> {
    // Dropped together with this future; the task then releases early.
    let (_in_flight, abandoned) = oneshot::channel::<()>();

    let path = path.to_path_buf();
    let mime_type = mime_type.to_string();
    let display_name = display_name.to_string();
    let prompt = prompt.to_string();

    let task = tokio::spawn(
        async move {
            run_remote(
                service.as_ref(),
                &path,
                &mime_type,
                &display_name,
                &prompt,
                &config,
                abandoned,
            )
            .await
        }
        .in_current_span(),
    );

    task.await
        .map_err(|e| DocExtractError::extraction("generate", e))?
}

async fn run_remote(
    service: &dyn RemoteFileService,
    path: &Path,
    mime_type: &str,
    display_name: &str,
    prompt: &str,
    config: &ServiceConfig,
    abandoned: oneshot::Receiver<()>,
) -> Result<String, DocExtractError> {
    let file = service.upload(path, mime_type, display_name).await?;
    info!("Uploaded {} as {} ({})", display_name, file.remote_id, mime_type);

    let outcome = tokio::select! {
        outcome = generate_when_active(service, &file, prompt, config) => outcome,
        _ = abandoned => {
            warn!("Request dropped, abandoning remote file {}", file.remote_id);
            Err(DocExtractError::extraction("generate", "request was cancelled"))
        }
    };

    match service.delete(&file).await {
        Ok(()) => debug!("Released remote file {}", file.remote_id),
        Err(e) => warn!("Failed to release remote file {}: {}", file.remote_id, e),
    }

    outcome
}

async fn generate_when_active(
    service: &dyn RemoteFileService,
    uploaded: &RemoteFile,
    prompt: &str,
    config: &ServiceConfig,
) -> Result<String, DocExtractError> {
    let active = wait_until_active(service, uploaded, config).await?;
    let text = service.generate(&active, prompt).await?;
    debug!("Model returned {} chars for {}", text.len(), active.remote_id);
    Ok(text)
}

async fn wait_until_active(
    service: &dyn RemoteFileService,
    uploaded: &RemoteFile,
    config: &ServiceConfig,
) -> Result<RemoteFile, DocExtractError> {
    let deadline = Instant::now() + config.processing_timeout();
    let mut file = uploaded.clone();

    loop {
        match file.state {
            RemoteFileState::Active => return Ok(file),
            RemoteFileState::Failed => {
                return Err(DocExtractError::RemoteProcessingFailed {
                    remote_id: file.remote_id,
                    detail: "the remote service reported state FAILED".into(),
                })
            }
            RemoteFileState::Processing => {}
        }

        if Instant::now() >= deadline {
            return Err(DocExtractError::RemoteTimeout {
                remote_id: file.remote_id,
                secs: config.processing_timeout_secs,
            });
        }

        debug!("Remote file {} still processing", file.remote_id);
        sleep(config.poll_interval()).await;
        file = service.refresh(&file).await?;
    }
}
