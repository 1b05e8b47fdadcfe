//! # edgequake-docextract
//!
//! Extract structured JSON from documents and images with a multimodal LLM.
//!
//! ## Why this crate?
//!
//! Applicant paperwork arrives as scanned passports, phone photos of
//! certificates, PDFs and Word files. Rather than maintaining an OCR and
//! layout stack per format, this crate hands the file to Gemini together with
//! a field-level extraction prompt, then turns whatever comes back into a
//! stable camelCase JSON contract.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload / URL / path
//!  │
//!  ├─ 1. Stage     per-request temp dir, sanitised filename
//!  ├─ 2. Prompt    document / image / generic, or the caller's own
//!  ├─ 3. Convert   .doc/.docx → PDF (Word, LibreOffice, text rebuild)
//!  ├─ 4. Extract   upload → poll until ACTIVE → generate → release
//!  └─ 5. Normalise strip fences, parse JSON, camelCase every key
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{Extractor, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let extractor = Extractor::from_config(ServiceConfig::from_env())?;
//!     let result = extractor
//!         .extract_path(std::path::Path::new("passport.jpg"), None)
//!         .await?;
//!     println!("{}", result.to_pretty_string());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library or the router in another service:
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder, DEFAULT_MODEL};
pub use error::{ConversionError, DocExtractError, ErrorKind};
pub use extract::Extractor;
pub use formats::{is_supported, mime_type_for, SupportedFormat, SUPPORTED_FORMATS};
pub use pipeline::docconv::{ConversionStrategy, DocumentConverter};
pub use pipeline::llm::{RemoteFile, RemoteFileService, RemoteFileState};
pub use pipeline::postprocess::{normalize, NormalizedResult};
pub use prompts::prompt_for;
pub use server::router;
