//! Service configuration.
//!
//! Everything the pipeline needs at run time lives in one [`ServiceConfig`],
//! built once at start-up (from flags, environment or the builder) and shared
//! behind an `Arc`. Handlers never read the environment themselves.

use crate::error::DocExtractError;
use std::fmt;
use std::time::Duration;

/// Default remote model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default base URL of the remote file/generation API.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default upload limit: 8 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

/// Configuration for the extraction service.
///
/// Built via [`ServiceConfig::builder()`], [`ServiceConfig::from_env()`] or
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docextract::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .api_key("test-key")
///     .model("gemini-2.0-flash")
///     .poll_interval_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_file_size_label(), "8MB");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// API key for the remote model. Read from `GEMINI_API_KEY` (or
    /// `GOOGLE_API_KEY`) by [`ServiceConfig::from_env`].
    pub api_key: Option<String>,

    /// Remote model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// Base URL of the remote API, without trailing slash.
    pub api_base_url: String,

    /// Interval between remote file state checks, in milliseconds. Default: 2000.
    pub poll_interval_ms: u64,

    /// Deadline for a remote file to leave the processing state. Default: 300.
    ///
    /// When it passes the request fails with
    /// [`DocExtractError::RemoteTimeout`].
    pub processing_timeout_secs: u64,

    /// Wall-clock limit for one office-suite conversion attempt. Default: 60.
    pub office_timeout_secs: u64,

    /// Timeout for fetching a URL in `/api/process_url`. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the remote API. Default: 120.
    pub api_timeout_secs: u64,

    /// Largest accepted upload or download, in bytes. Default: 8 MiB.
    ///
    /// This is the only place the limit is defined: the HTTP body limit, the
    /// download guard and the `/health` report all read it.
    pub max_upload_bytes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_ms: 2000,
            processing_timeout_secs: 300,
            office_timeout_secs: 60,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("processing_timeout_secs", &self.processing_timeout_secs)
            .field("office_timeout_secs", &self.office_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with the API key taken from `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty());
        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn office_timeout(&self) -> Duration {
        Duration::from_secs(self.office_timeout_secs)
    }

    /// Human-readable upload limit for `/health`, e.g. `8MB`.
    pub fn max_file_size_label(&self) -> String {
        const MIB: u64 = 1024 * 1024;
        const KIB: u64 = 1024;
        let n = self.max_upload_bytes;
        if n >= MIB && n % MIB == 0 {
            format!("{}MB", n / MIB)
        } else if n >= KIB && n % KIB == 0 {
            format!("{}KB", n / KIB)
        } else {
            format!("{n}B")
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn processing_timeout_secs(mut self, secs: u64) -> Self {
        self.config.processing_timeout_secs = secs;
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, DocExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DocExtractError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(DocExtractError::InvalidConfig(format!(
                "api_base_url must be an HTTP/HTTPS URL, got '{}'",
                c.api_base_url
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(DocExtractError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.processing_timeout_secs == 0 {
            return Err(DocExtractError::InvalidConfig(
                "processing_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
