//! Format registry: which file types the service accepts and how they are typed.
//!
//! The table is fixed at compile time. Keys are lowercase, carry a leading dot
//! and are unique; a unit test enforces all three.

use std::path::Path;

/// One accepted file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedFormat {
    /// Lowercase extension including the leading dot, e.g. `.pdf`.
    pub extension: &'static str,
    /// MIME type sent to the remote model for this extension.
    pub mime_type: &'static str,
}

const fn fmt(extension: &'static str, mime_type: &'static str) -> SupportedFormat {
    SupportedFormat {
        extension,
        mime_type,
    }
}

/// MIME type of `.docx` files.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type used for PDFs, including converted word-processor documents.
pub const PDF_MIME: &str = "application/pdf";

/// Every supported format, in display order.
pub const SUPPORTED_FORMATS: &[SupportedFormat] = &[
    fmt(".pdf", PDF_MIME),
    fmt(".png", "image/png"),
    fmt(".jpg", "image/jpeg"),
    fmt(".jpeg", "image/jpeg"),
    fmt(".gif", "image/gif"),
    fmt(".webp", "image/webp"),
    fmt(".bmp", "image/bmp"),
    fmt(".tiff", "image/tiff"),
    fmt(".tif", "image/tiff"),
    fmt(".docx", DOCX_MIME),
    fmt(".doc", "application/msword"),
];

/// Broad category of a file, driving prompt selection and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// `.pdf`, `.doc`, `.docx`
    Document,
    /// Raster image formats.
    Image,
    /// Anything else.
    Other,
}

impl FileCategory {
    /// Categorise a path by its (case-insensitive) extension.
    pub fn of(path: impl AsRef<Path>) -> Self {
        match extension_of(path).as_deref() {
            Some(".pdf" | ".doc" | ".docx") => FileCategory::Document,
            Some(".png" | ".jpg" | ".jpeg" | ".gif" | ".webp" | ".bmp" | ".tiff" | ".tif") => {
                FileCategory::Image
            }
            _ => FileCategory::Other,
        }
    }
}

/// Lowercase extension of `path` with a leading dot, or `None` if it has none.
pub fn extension_of(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Look up a registry entry by extension (with or without the leading dot).
pub fn lookup(extension: &str) -> Option<&'static SupportedFormat> {
    let ext = extension.trim_start_matches('.').to_lowercase();
    SUPPORTED_FORMATS.iter().find(|f| f.extension[1..] == ext[..])
}

/// `true` when the filename's extension is in the registry.
pub fn is_supported(filename: impl AsRef<Path>) -> bool {
    extension_of(filename)
        .and_then(|ext| lookup(&ext))
        .is_some()
}

/// `true` for `.doc` / `.docx`, which are converted to PDF before upload.
pub fn is_word_document(path: impl AsRef<Path>) -> bool {
    matches!(extension_of(path).as_deref(), Some(".doc" | ".docx"))
}

/// MIME type for `path`: the registry entry if known, else a guess from the
/// extension, else `application/octet-stream`.
pub fn mime_type_for(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    if let Some(format) = extension_of(path).and_then(|ext| lookup(&ext)) {
        return format.mime_type.to_string();
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// All supported extensions, in display order.
pub fn supported_extensions() -> Vec<&'static str> {
    SUPPORTED_FORMATS.iter().map(|f| f.extension).collect()
}

/// Comma-separated extension list used in error messages.
pub fn supported_extensions_list() -> String {
    supported_extensions().join(", ")
}
