//! CLI binary for edgequake-docextract.
//!
//! A thin shim over the library crate: maps flags to `ServiceConfig`, then
//! either serves the HTTP API or runs one extraction and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docextract::{server, Extractor, ServiceConfig, DEFAULT_MODEL};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the HTTP service on port 5000
  docextract serve --port 5000

  # Extract from a local file (pretty JSON on stdout)
  docextract extract passport.jpg

  # Extract from a URL with a custom prompt
  docextract extract https://example.com/transcript.pdf --prompt "List every grade"

  # Word documents are converted to PDF first (LibreOffice if installed)
  docextract extract cv.docx -o cv.json

HTTP API:
  GET  /                  Upload form
  POST /api/upload        multipart: file, custom_prompt (optional)
  POST /api/process_url   JSON: {"file_url": "...", "custom_prompt": "..."}
  GET  /health            Status, supported formats, size limit

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (GOOGLE_API_KEY also accepted)
  DOCEXTRACT_MODEL        Override model ID
  DOCEXTRACT_*            Every flag below has a DOCEXTRACT_ fallback
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Extract structured JSON from documents and images with Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract structured JSON from documents and images with a multimodal LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "DOCEXTRACT_QUIET")]
    quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "DOCEXTRACT_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "DOCEXTRACT_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind.
        #[arg(short, long, env = "DOCEXTRACT_PORT", default_value_t = 5000)]
        port: u16,
    },

    /// Extract from one local file or HTTP/HTTPS URL and print the result.
    Extract {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        /// Custom prompt, replacing the built-in one.
        #[arg(long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the custom prompt from a file.
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Single-line JSON instead of pretty output.
        #[arg(long)]
        compact: bool,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Gemini API key.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model ID.
    #[arg(long, global = true, env = "DOCEXTRACT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the Gemini API.
    #[arg(long, global = true, env = "DOCEXTRACT_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Milliseconds between remote file state checks.
    #[arg(long, global = true, env = "DOCEXTRACT_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Seconds to wait for the remote file to finish processing.
    #[arg(long, global = true, env = "DOCEXTRACT_PROCESSING_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    processing_timeout: u64,

    /// Seconds allowed for one office-suite conversion.
    #[arg(long, global = true, env = "DOCEXTRACT_OFFICE_TIMEOUT", default_value_t = 60)]
    office_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call Gemini API timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Largest accepted file in bytes.
    #[arg(long, global = true, env = "DOCEXTRACT_MAX_UPLOAD_BYTES",
          default_value_t = edgequake_docextract::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if cli.json_logs {
        fmt.json().init();
    } else {
        fmt.init();
    }

    let config = build_config(&cli.service)?;
    let extractor = Arc::new(Extractor::from_config(config).context("Failed to start")?);

    match cli.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid listen address {host}:{port}"))?;
            server::serve(addr, extractor)
                .await
                .context("HTTP server failed")?;
        }
        Command::Extract {
            input,
            prompt,
            prompt_file,
            output,
            compact,
        } => {
            let prompt = match prompt_file {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read prompt from {:?}", path))?,
                ),
                None => prompt,
            };

            let result = if is_url(&input) {
                extractor.extract_url(&input, prompt.as_deref()).await
            } else {
                extractor.extract_path(Path::new(&input), prompt.as_deref()).await
            }
            .context("Extraction failed")?;

            let mut rendered = if compact {
                serde_json::to_string(&result).context("Failed to serialise result")?
            } else {
                result.to_pretty_string()
            };
            if !rendered.ends_with('\n') {
                rendered.push('\n');
            }

            match output {
                Some(path) => tokio::fs::write(&path, rendered)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?,
                None => io::stdout()
                    .lock()
                    .write_all(rendered.as_bytes())
                    .context("Failed to write to stdout")?,
            }
        }
    }

    Ok(())
}

fn is_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &ServiceArgs) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .model(&args.model)
        .poll_interval_ms(args.poll_interval_ms)
        .processing_timeout_secs(args.processing_timeout)
        .office_timeout_secs(args.office_timeout)
        .download_timeout_secs(args.download_timeout)
        .api_timeout_secs(args.api_timeout)
        .max_upload_bytes(args.max_upload_bytes);

    // GEMINI_API_KEY is read by clap; GOOGLE_API_KEY is the fallback.
    let api_key = args
        .api_key
        .clone()
        .or_else(|| ServiceConfig::from_env().api_key);
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = args.api_base_url {
        builder = builder.api_base_url(url);
    }

    builder.build().context("Invalid configuration")
}
