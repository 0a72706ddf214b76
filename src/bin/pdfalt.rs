//! CLI binary for pdf-alttext.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AltTextConfig` and prints a run summary.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_alttext::{process_directory, AltTextConfig, EmptyCaptionPolicy};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Caption every tagged PDF under a directory
  pdfalt ./reports

  # Single document, local Ollama vision model
  pdfalt --provider ollama --model qwen3-vl:30b document.pdf

  # Tighter geometry matching, more retries
  pdfalt --tolerance 0.05 --max-retries 5 ./reports

  # Generate and persist captions without running the tag-tree writer
  pdfalt --no-inject ./reports

  # Custom system prompt from a Markdown file
  pdfalt --system-prompt system-prompt.md ./reports

HELPER TOOLS:
  Structure discovery reads the PDF tag tree and prints, per /Figure
  element, the owning page and bounding box as one JSON object
  ({"pages": …, "figures": …}). The tag-tree writer is invoked with the
  document path and the artifact path (--results) and sets /Alt on the
  matching figures. Both are node scripts, configurable via
  --discover-tool / --writer-tool.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PDFIUM_LIB_PATH         Path to an existing libpdfium
"#;

/// Generate and inject image alt-text into tagged PDFs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfalt",
    version,
    about = "Generate and inject image alt-text into tagged PDFs using Vision LLMs",
    long_about = "Batch-process tagged PDF documents: locate embedded figures, correlate each \
against the surrounding page text, caption it with a Vision Language Model, and inject the \
result into the document's accessibility tag tree.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory to scan recursively for *.pdf files (or a single PDF).
    root: PathBuf,

    /// VLM model ID (e.g. qwen3-vl:30b, gpt-4.1-nano).
    #[arg(long, env = "PDFALT_MODEL")]
    model: Option<String>,

    /// Captioning provider: ollama, openai, anthropic, gemini, azure.
    #[arg(
        long,
        env = "PDFALT_PROVIDER",
        long_help = "Captioning provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Geometry matching tolerance in page points.
    #[arg(long, env = "PDFALT_TOLERANCE", default_value_t = 0.1)]
    tolerance: f32,

    /// Retries per image on a failed or empty caption.
    #[arg(long, env = "PDFALT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Treat an empty caption as the model declining (fail fast) instead
    /// of as a transient failure (retry).
    #[arg(long, env = "PDFALT_FAIL_ON_EMPTY")]
    fail_on_empty: bool,

    /// Max tokens the model may generate per caption.
    #[arg(long, env = "PDFALT_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDFALT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Path of the persisted alt-text artifact, forwarded to the writer.
    #[arg(long, env = "PDFALT_RESULTS", default_value = "output-alt-text.json")]
    results: PathBuf,

    /// Path to a Markdown file containing a custom system prompt.
    #[arg(long, env = "PDFALT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Structure-discovery script (figure bounding boxes).
    #[arg(long, env = "PDFALT_DISCOVER_TOOL", default_value = "get-bbox.js")]
    discover_tool: PathBuf,

    /// Tag-tree writer script (alt-text injection).
    #[arg(long, env = "PDFALT_WRITER_TOOL", default_value = "add-alt-text.js")]
    writer_tool: PathBuf,

    /// Interpreter used to run the helper scripts.
    #[arg(long, env = "PDFALT_NODE_BIN", default_value = "node")]
    node_bin: String,

    /// Generate and persist captions without running the tag-tree writer.
    #[arg(long, env = "PDFALT_NO_INJECT")]
    no_inject: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFALT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFALT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = process_directory(&cli.root, &config)
        .await
        .context("Alt-text run failed")?;

    if !cli.quiet {
        eprintln!(
            "{}/{} documents processed, {} failed",
            stats.documents - stats.failed_documents,
            stats.documents,
            stats.failed_documents,
        );
        eprintln!(
            "{} images captioned, {} skipped, {}ms total",
            stats.images_captioned, stats.images_skipped, stats.total_duration_ms
        );
    }

    if stats.documents > 0 && stats.failed_documents == stats.documents {
        anyhow::bail!("every document failed");
    }

    Ok(())
}

/// Map CLI args to `AltTextConfig`.
async fn build_config(cli: &Cli) -> Result<AltTextConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = AltTextConfig::builder()
        .tolerance(cli.tolerance)
        .max_retries(cli.max_retries)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .results_path(cli.results.clone())
        .node_bin(cli.node_bin.clone())
        .discover_tool(cli.discover_tool.clone())
        .writer_tool(cli.writer_tool.clone())
        .skip_handoff(cli.no_inject);

    if cli.fail_on_empty {
        builder = builder.empty_caption(EmptyCaptionPolicy::Decline);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}
