//! # pdf-alttext
//!
//! Generate and inject accessibility alt-text for the images embedded in
//! tagged PDF documents, using a Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Captioning an extracted image in isolation produces generic alt-text —
//! "a chart", "a photograph" — because the model never sees what the figure
//! is *for*. This crate correlates each figure's bounding box against the
//! page's text-block geometry to find the block that marks its position,
//! then hands the model the full page text with that position marked by a
//! sentinel. The model reads the caption, the referencing sentence, and the
//! surrounding argument, and describes the figure in its document context.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Discover   external tool reports tagged figures + bounding boxes
//!  ├─ 2. Correlate  match figure geometry against page text blocks
//!  ├─ 3. Extract    crop each figure from a scaled page render (pdfium)
//!  ├─ 4. Normalize  enforce VLM input floors (32×32) and aspect cap (200)
//!  ├─ 5. Caption    VLM call per figure with sentinel-marked page context
//!  ├─ 6. Persist    reference → {"alt": …} JSON artifact per document
//!  └─ 7. Handoff    external writer injects alt-text into the tag tree
//! ```
//!
//! Documents, and the images within each document, are processed strictly
//! sequentially; captioning retries are capped with exponential backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_alttext::{process_directory, AltTextConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = AltTextConfig::default();
//!     let stats = process_directory("./tagged-pdfs".as_ref(), &config).await?;
//!     eprintln!(
//!         "{} captioned, {} skipped across {} documents",
//!         stats.images_captioned, stats.images_skipped, stats.documents
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfalt` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-alttext = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AltTextConfig, AltTextConfigBuilder, EmptyCaptionPolicy};
pub use error::{AltTextError, ImageError};
pub use geometry::{BoundingBox, DEFAULT_TOLERANCE};
pub use output::{AltTextEntry, CaptionResults, DocumentOutcome, RunStats};
pub use pipeline::caption::{CaptionServiceError, Captioner, VisionCaptioner};
pub use pipeline::discover::{ImageDescriptor, PageGeometryRecord};
pub use pipeline::extract::TextBlock;
pub use process::{caption_prepared, process_directory, process_document, PreparedImage};
