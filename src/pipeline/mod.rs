//! Pipeline stages for document extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the remote provider can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ docconv ──▶ llm ──▶ postprocess
//! (stage)   (→ PDF)     (remote)  (normalise)
//! ```
//!
//! 1. [`input`]: stage an upload, local file or URL download in a
//!    per-request temp directory
//! 2. [`docconv`]: turn `.doc`/`.docx` into PDF through an ordered chain of
//!    strategies; failure is non-fatal
//! 3. [`llm`]: upload, wait, generate, release; the only stage with
//!    remote I/O ([`gemini`] is the HTTP implementation)
//! 4. [`postprocess`]: strip fences, parse JSON, camelCase keys

pub mod docconv;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod postprocess;
