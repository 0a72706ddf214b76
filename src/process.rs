//! Pipeline orchestration: documents through the phase sequence.
//!
//! Per document the phases run strictly in order:
//!
//! ```text
//! Discover → Correlate → Extract&Normalize → Caption → Persist → Handoff → Done
//! ```
//!
//! A `Discover` failure is terminal for that document only — it is logged
//! and the next document is attempted. Later phases degrade per image
//! instead: a figure that fails to extract, normalise, or caption is
//! recorded in the outcome and the rest of the document proceeds.
//!
//! Execution is deliberately sequential end to end: one document at a
//! time, one image at a time, each caption call awaited to completion
//! before the next begins. Extracted bitmaps stay in memory for the whole
//! pass — nothing is staged on disk between extraction and captioning, so
//! a bitmap from one document can never leak into the next.

use crate::config::AltTextConfig;
use crate::error::{AltTextError, ImageError};
use crate::output::{CaptionResults, DocumentOutcome, RunStats};
use crate::pipeline::caption::{caption_image, Captioner, VisionCaptioner};
use crate::pipeline::context::assemble_context;
use crate::pipeline::discover::{discover_structure, ImageDescriptor};
use crate::pipeline::encode::encode_image;
use crate::pipeline::extract::{extract_document, first_page_height, TextBlock};
use crate::pipeline::handoff::inject_alt_text;
use crate::pipeline::normalize::normalize;
use image::DynamicImage;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// One figure ready for the caption phase: correlated context plus a
/// normalised bitmap.
pub struct PreparedImage {
    pub reference: u32,
    pub context: String,
    pub bitmap: DynamicImage,
}

/// Process every `*.pdf` under `root` (recursively), sequentially.
///
/// `root` may also name a single PDF file. Per-document failures are
/// logged and counted, never propagated; the returned stats summarise the
/// whole run.
pub async fn process_directory(
    root: &Path,
    config: &AltTextConfig,
) -> Result<RunStats, AltTextError> {
    let run_start = Instant::now();
    let documents = collect_pdfs(root)?;
    info!("Found {} PDF document(s) under {}", documents.len(), root.display());

    let captioner = resolve_captioner(config)?;

    let mut stats = RunStats::default();
    for path in documents {
        info!("Processing document: {}", path.display());
        match process_document_with(&captioner, &path, config).await {
            Ok(outcome) => {
                info!(
                    "{}: {}/{} images captioned in {}ms",
                    path.display(),
                    outcome.results.len(),
                    outcome.images_found,
                    outcome.duration_ms
                );
                stats.absorb(&outcome);
            }
            Err(e) => {
                // Terminal for this document only.
                error!("{}: {}", path.display(), e);
                stats.documents += 1;
                stats.failed_documents += 1;
            }
        }
    }

    stats.total_duration_ms = run_start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Process a single document with a captioner resolved from the config.
pub async fn process_document(
    pdf_path: &Path,
    config: &AltTextConfig,
) -> Result<DocumentOutcome, AltTextError> {
    let captioner = resolve_captioner(config)?;
    process_document_with(&captioner, pdf_path, config).await
}

/// Process a single document with an explicit captioner.
pub async fn process_document_with(
    captioner: &Arc<dyn Captioner>,
    pdf_path: &Path,
    config: &AltTextConfig,
) -> Result<DocumentOutcome, AltTextError> {
    let start = Instant::now();
    validate_pdf(pdf_path)?;

    // ── Discover ─────────────────────────────────────────────────────────
    let height = first_page_height(pdf_path).await?;
    let structure = discover_structure(pdf_path, height, config).await?;
    let descriptors = structure.images;
    info!(
        "{}: discovered {} figure(s)",
        pdf_path.display(),
        descriptors.len()
    );

    if descriptors.is_empty() {
        // Nothing to caption; persist the empty artifact so a previous
        // document's captions cannot be injected into this one.
        let results = CaptionResults::new();
        results.write(&config.results_path).await?;
        return Ok(DocumentOutcome {
            path: pdf_path.to_path_buf(),
            images_found: 0,
            results,
            skipped: Vec::new(),
            injected: false,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    // ── Extract & Normalize ──────────────────────────────────────────────
    let extracted = extract_document(pdf_path, descriptors.clone(), config.render_scale).await?;
    let mut skipped: Vec<ImageError> = extracted.failures;

    let by_reference: HashMap<u32, &ImageDescriptor> =
        descriptors.iter().map(|d| (d.reference, d)).collect();
    let empty_page: Vec<TextBlock> = Vec::new();

    let mut prepared = Vec::with_capacity(extracted.images.len());
    for image in extracted.images {
        // Extraction only returns references it was given.
        let Some(descriptor) = by_reference.get(&image.reference) else {
            continue;
        };

        // ── Correlate ────────────────────────────────────────────────────
        let blocks = extracted
            .blocks
            .get(&descriptor.page_index)
            .unwrap_or(&empty_page);
        let context = assemble_context(blocks, &descriptor.bounds, config.tolerance);

        let bitmap = normalize(image.bitmap, config);
        debug!(
            "Image {}: {}x{} px, context {} chars",
            image.reference,
            bitmap.width(),
            bitmap.height(),
            context.len()
        );

        prepared.push(PreparedImage {
            reference: image.reference,
            context,
            bitmap,
        });
    }

    // ── Caption ──────────────────────────────────────────────────────────
    let (results, caption_failures) = caption_prepared(captioner, &prepared, config).await;
    skipped.extend(caption_failures);
    for e in &skipped {
        warn!("{}", e);
    }

    // ── Persist ──────────────────────────────────────────────────────────
    results.write(&config.results_path).await?;

    // ── Handoff ──────────────────────────────────────────────────────────
    let mut injected = false;
    if config.skip_handoff {
        debug!("Handoff disabled, skipping tag-tree writer");
    } else if results.is_empty() {
        info!("{}: no captions produced, skipping handoff", pdf_path.display());
    } else {
        match inject_alt_text(pdf_path, config).await {
            Ok(()) => injected = true,
            // Fire-and-forget: a writer failure loses the injection, not
            // the generated captions (they are already persisted).
            Err(e) => error!("{}", e),
        }
    }

    Ok(DocumentOutcome {
        path: pdf_path.to_path_buf(),
        images_found: descriptors.len(),
        results,
        skipped,
        injected,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Caption prepared images one at a time, collecting results and failures.
///
/// Each produced caption is keyed by its image reference; a reference can
/// appear at most once because each descriptor is prepared at most once.
pub async fn caption_prepared(
    captioner: &Arc<dyn Captioner>,
    prepared: &[PreparedImage],
    config: &AltTextConfig,
) -> (CaptionResults, Vec<ImageError>) {
    let mut results = CaptionResults::new();
    let mut failures = Vec::new();

    for image in prepared {
        let encoded = match encode_image(&image.bitmap) {
            Ok(data) => data,
            Err(e) => {
                failures.push(ImageError::NormalizeFailed {
                    reference: image.reference,
                    detail: format!("encode: {e}"),
                });
                continue;
            }
        };

        match caption_image(captioner, image.reference, &image.context, &encoded, config).await {
            Ok(alt) => results.insert(image.reference, alt),
            Err(e) => failures.push(e),
        }
    }

    (results, failures)
}

/// Resolve the captioning service, most-specific first.
///
/// A pre-built captioner (tests, custom middleware) wins; otherwise a
/// provider is created from the config and environment.
fn resolve_captioner(config: &AltTextConfig) -> Result<Arc<dyn Captioner>, AltTextError> {
    if let Some(ref captioner) = config.captioner {
        return Ok(Arc::clone(captioner));
    }
    VisionCaptioner::resolve(config)
}

/// Recursively collect `*.pdf` files under `root`, sorted for a
/// deterministic processing order. A single PDF file is accepted as-is.
fn collect_pdfs(root: &Path) -> Result<Vec<PathBuf>, AltTextError> {
    if !root.exists() {
        return Err(AltTextError::PathNotFound {
            path: root.to_path_buf(),
        });
    }

    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|_| AltTextError::PathNotFound {
            path: dir.clone(),
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Check existence and the `%PDF` magic before handing the file to the
/// external tools.
fn validate_pdf(path: &Path) -> Result<(), AltTextError> {
    let mut file = std::fs::File::open(path).map_err(|_| AltTextError::PathNotFound {
        path: path.to_path_buf(),
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(AltTextError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
