//! Word-processor to PDF conversion.
//!
//! The remote model reads PDFs natively but not `.doc`/`.docx`, so those are
//! converted before upload. Converters are unevenly available across hosts,
//! so [`DocumentConverter`] runs an ordered chain of [`ConversionStrategy`]s
//! and the first one that produces the target file wins:
//!
//! ```text
//! native-word ──▶ office-suite ──▶ text-reconstruction
//! (Windows COM)   (soffice, 60s)   (docx-rs + lopdf, text only)
//! ```
//!
//! A failing strategy never aborts the chain. Only when every strategy has
//! failed does the caller get [`ConversionError::Exhausted`], and even that is
//! non-fatal upstream: the pipeline continues with the original file.
//!
//! The PDF is written next to the source with its extension replaced by
//! `.pdf`. Sources are staged in a per-request directory, so the caller
//! cleans up both files by dropping the staging guard.

use crate::config::ServiceConfig;
use crate::error::ConversionError;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One way of turning `source` into a PDF at `target`.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Write a PDF rendition of `source` to `target`.
    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError>;
}

/// Ordered chain of conversion strategies.
pub struct DocumentConverter {
    strategies: Vec<Box<dyn ConversionStrategy>>,
}

impl std::fmt::Debug for DocumentConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentConverter")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl DocumentConverter {
    pub fn new(strategies: Vec<Box<dyn ConversionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: native Word, then office suite, then text reconstruction.
    pub fn with_defaults(config: &ServiceConfig) -> Self {
        let timeout = config.office_timeout();
        Self::new(vec![
            Box::new(NativeWordStrategy::new(timeout)),
            Box::new(OfficeSuiteStrategy::new(timeout)),
            Box::new(TextReconstructionStrategy),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Convert `source` to PDF and return the PDF path.
    pub async fn convert_to_pdf(&self, source: &Path) -> Result<PathBuf, ConversionError> {
        let target = pdf_target_for(source);
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            debug!("Trying {} for {}", strategy.name(), source.display());
            match strategy.convert(source, &target).await {
                Ok(()) if target.exists() => {
                    info!("Converted {} to PDF via {}", source.display(), strategy.name());
                    return Ok(target);
                }
                Ok(()) => {
                    let e = ConversionError::MissingOutput {
                        path: target.clone(),
                    };
                    warn!("{}: {}", strategy.name(), e);
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
                Err(e @ ConversionError::Unavailable { .. }) => {
                    debug!("{}", e);
                    attempts.push(e.to_string());
                }
                Err(e) => {
                    warn!("{}", e);
                    attempts.push(e.to_string());
                }
            }
        }

        Err(ConversionError::Exhausted {
            path: source.to_path_buf(),
            attempts,
        })
    }
}

/// `report.docx` → `report.pdf`, in the same directory.
pub fn pdf_target_for(source: &Path) -> PathBuf {
    source.with_extension("pdf")
}

// ── External-process helper ──────────────────────────────────────────────────

/// Run a converter process with a deadline. The child is killed if the
/// deadline passes.
async fn run_converter(
    mut cmd: Command,
    timeout: Duration,
    strategy: &'static str,
) -> Result<(), ConversionError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConversionError::Unavailable {
                strategy,
                reason: "executable not found".into(),
            }
        } else {
            ConversionError::Failed {
                strategy,
                detail: format!("spawn failed: {e}"),
            }
        }
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => Err(ConversionError::TimedOut {
            strategy,
            secs: timeout.as_secs(),
        }),
        Ok(Err(e)) => Err(ConversionError::Failed {
            strategy,
            detail: e.to_string(),
        }),
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(ConversionError::Failed {
            strategy,
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }),
    }
}

// ── Strategy 1: native Word automation (Windows only) ────────────────────────

/// Drives Microsoft Word through PowerShell COM automation.
#[derive(Debug, Clone)]
pub struct NativeWordStrategy {
    timeout: Duration,
}

impl NativeWordStrategy {
    const NAME: &'static str = "native-word";

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Quote a path for a single-quoted PowerShell string.
fn ps_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

#[async_trait]
impl ConversionStrategy for NativeWordStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        if !cfg!(windows) {
            return Err(ConversionError::Unavailable {
                strategy: Self::NAME,
                reason: "requires Windows with Microsoft Word".into(),
            });
        }

        // 17 = wdFormatPDF
        let script = format!(
            "$ErrorActionPreference = 'Stop'; \
             $word = New-Object -ComObject Word.Application; \
             $word.Visible = $false; \
             try {{ \
               $doc = $word.Documents.Open({src}, $false, $true); \
               $doc.SaveAs([ref] {dst}, [ref] 17); \
               $doc.Close($false) \
             }} finally {{ $word.Quit() }}",
            src = ps_quote(source),
            dst = ps_quote(target),
        );

        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
        run_converter(cmd, self.timeout, Self::NAME).await
    }
}

// ── Strategy 2: headless office suite ───────────────────────────────────────

/// Runs LibreOffice in headless mode, trying each known executable in turn.
#[derive(Debug, Clone)]
pub struct OfficeSuiteStrategy {
    executables: Vec<String>,
    timeout: Duration,
}

impl OfficeSuiteStrategy {
    const NAME: &'static str = "office-suite";

    pub fn new(timeout: Duration) -> Self {
        Self::with_executables(default_office_executables(), timeout)
    }

    pub fn with_executables(executables: Vec<String>, timeout: Duration) -> Self {
        Self {
            executables,
            timeout,
        }
    }
}

/// Executable names and install paths probed for LibreOffice.
pub fn default_office_executables() -> Vec<String> {
    let mut exes = vec!["libreoffice".to_string(), "soffice".to_string()];
    if cfg!(windows) {
        exes.push(r"C:\Program Files\LibreOffice\program\soffice.exe".to_string());
    }
    if cfg!(target_os = "macos") {
        exes.push("/Applications/LibreOffice.app/Contents/MacOS/soffice".to_string());
    }
    exes
}

#[async_trait]
impl ConversionStrategy for OfficeSuiteStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        let outdir = target.parent().unwrap_or_else(|| Path::new("."));
        // A private profile per output directory lets concurrent conversions run.
        let profile = reqwest::Url::from_directory_path(outdir.join(".office-profile")).ok();

        let mut failures = Vec::new();
        for exe in &self.executables {
            let mut cmd = Command::new(exe);
            if let Some(profile) = &profile {
                cmd.arg(format!("-env:UserInstallation={profile}"));
            }
            cmd.args(["--headless", "--convert-to", "pdf", "--outdir"])
                .arg(outdir)
                .arg(source);

            match run_converter(cmd, self.timeout, Self::NAME).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("{} via '{}' failed: {}", Self::NAME, exe, e);
                    failures.push(format!("'{exe}' {e}"));
                }
            }
        }

        Err(ConversionError::Failed {
            strategy: Self::NAME,
            detail: failures.join(", "),
        })
    }
}

// ── Strategy 3: in-process text reconstruction ───────────────────────────────

/// Placeholder used when the document has no extractable paragraph text.
pub const EMPTY_DOCUMENT_PLACEHOLDER: &str = "Document content could not be extracted.";

/// Rebuilds a plain PDF from the `.docx` paragraph text.
///
/// Images, tables and styling are dropped. Legacy binary `.doc` files are
/// not zip containers and fail here.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReconstructionStrategy;

impl TextReconstructionStrategy {
    const NAME: &'static str = "text-reconstruction";
}

#[async_trait]
impl ConversionStrategy for TextReconstructionStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        let source = source.to_path_buf();
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&source).map_err(|e| e.to_string())?;
            let paragraphs = docx_paragraphs(&bytes)?;
            debug!("Extracted {} paragraphs from {}", paragraphs.len(), source.display());
            write_text_pdf(&paragraphs, &target)
        })
        .await
        .map_err(|e| ConversionError::Failed {
            strategy: Self::NAME,
            detail: format!("task panicked: {e}"),
        })?
        .map_err(|detail| ConversionError::Failed {
            strategy: Self::NAME,
            detail,
        })
    }
}

/// Non-blank top-level paragraph texts of a `.docx`, in document order.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes).map_err(|e| format!("not a readable .docx: {e}"))?;

    let paragraphs = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(paragraphs)
}

// Letter page, 1" margins, Helvetica 11pt.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const FONT_SIZE: f32 = 11.0;
const LEADING: f32 = 14.0;
const PARAGRAPH_GAP: f32 = 14.4;
// Helvetica averages ~0.5em per glyph: (612 - 144) / 5.5 ≈ 85.
const MAX_LINE_CHARS: usize = 85;

/// Greedy word wrap; words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Position every wrapped line: one `Vec<(baseline_y, text)>` per page.
fn layout_pages(paragraphs: &[String]) -> Vec<Vec<(f32, String)>> {
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = vec![Vec::new()];
    let mut y = top;

    for paragraph in paragraphs {
        for line in wrap_text(paragraph, MAX_LINE_CHARS) {
            if y < MARGIN {
                pages.push(Vec::new());
                y = top;
            }
            if let Some(page) = pages.last_mut() {
                page.push((y, line));
            }
            y -= LEADING;
        }
        y -= PARAGRAPH_GAP;
    }
    pages
}

/// Map to single-byte WinAnsi-compatible text; anything else becomes `?`.
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Lay `paragraphs` out into a new PDF at `target`.
pub fn write_text_pdf(paragraphs: &[String], target: &Path) -> Result<(), String> {
    let placeholder;
    let paragraphs = if paragraphs.is_empty() {
        placeholder = vec![EMPTY_DOCUMENT_PLACEHOLDER.to_string()];
        &placeholder[..]
    } else {
        paragraphs
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in layout_pages(paragraphs) {
        let mut operations = Vec::with_capacity(lines.len() * 5);
        for (y, text) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_latin1(&text))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| format!("content encoding: {e}"))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(target)
        .map_err(|e| format!("writing {}: {e}", target.display()))?;
    Ok(())
}
