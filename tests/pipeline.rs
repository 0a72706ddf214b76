//! Integration tests for the correlate → caption → persist pipeline.
//!
//! The captioning service is stubbed at the `Captioner` seam, so these
//! tests exercise the real context assembly, retry driver, and persistence
//! code without pdfium, the node helper tools, or a live VLM.

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pdf_alttext::pipeline::caption::{CaptionServiceError, Captioner};
use pdf_alttext::pipeline::context::{
    assemble_context, MATCHED_SENTINEL, OTHER_IMAGE_SENTINEL,
};
use pdf_alttext::{
    caption_prepared, AltTextConfig, BoundingBox, CaptionResults, PreparedImage, TextBlock,
    DEFAULT_TOLERANCE,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Captioner that pops scripted responses, then echoes a default.
struct ScriptedCaptioner {
    responses: Mutex<VecDeque<Result<String, CaptionServiceError>>>,
    calls: AtomicU32,
}

impl ScriptedCaptioner {
    fn new(
        responses: impl IntoIterator<Item = Result<String, CaptionServiceError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Captioner for ScriptedCaptioner {
    async fn caption(
        &self,
        _context: &str,
        _image: &edgequake_llm::ImageData,
    ) -> Result<String, CaptionServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("A generic figure.".to_string()))
    }
}

/// Captioner whose output embeds a fresh invocation counter — no two calls
/// ever return the same caption.
struct CountingCaptioner {
    calls: AtomicU32,
}

#[async_trait]
impl Captioner for CountingCaptioner {
    async fn caption(
        &self,
        _context: &str,
        _image: &edgequake_llm::ImageData,
    ) -> Result<String, CaptionServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("Caption variant {n}."))
    }
}

fn bitmap(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([200, 100, 50, 255]),
    ))
}

fn text(content: &str, top: f32) -> TextBlock {
    TextBlock {
        bounds: BoundingBox::new(72.0, top, 400.0, top + 20.0),
        content: content.into(),
    }
}

fn marker(bounds: BoundingBox) -> TextBlock {
    TextBlock {
        bounds,
        content: "<image: extracted>".into(),
    }
}

fn fast_config() -> AltTextConfig {
    AltTextConfig::builder()
        .max_retries(3)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

/// A two-figure page: figure 10 has a marker block whose geometry matches
/// exactly; figure 11's bbox matches no block, but another (unknown)
/// marker sits on the page.
fn two_image_document() -> Vec<PreparedImage> {
    let figure_box = BoundingBox::new(72.0, 150.0, 300.0, 320.0);
    let stray_box = BoundingBox::new(350.0, 500.0, 500.0, 600.0);
    let unmatched_box = BoundingBox::new(0.0, 700.0, 90.0, 760.0);

    let blocks = vec![
        text("The study design is summarised below.", 100.0),
        marker(figure_box),
        text("Figure 1 caption", 330.0),
        marker(stray_box),
    ];

    vec![
        PreparedImage {
            reference: 10,
            context: assemble_context(&blocks, &figure_box, DEFAULT_TOLERANCE),
            bitmap: bitmap(64, 64),
        },
        PreparedImage {
            reference: 11,
            context: assemble_context(&blocks, &unmatched_box, DEFAULT_TOLERANCE),
            bitmap: bitmap(48, 96),
        },
    ]
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_image_document_produces_two_entries_and_artifact() {
    let prepared = two_image_document();

    // Geometry correlation happened during preparation; check it before
    // the caption phase consumes the contexts.
    assert_eq!(prepared[0].context.matches(MATCHED_SENTINEL).count(), 1);
    assert_eq!(prepared[0].context.matches(OTHER_IMAGE_SENTINEL).count(), 1);
    assert!(prepared[0].context.contains("Figure 1 caption"));
    // The second figure matches nothing: both markers read as unrelated.
    assert_eq!(prepared[1].context.matches(MATCHED_SENTINEL).count(), 0);
    assert_eq!(prepared[1].context.matches(OTHER_IMAGE_SENTINEL).count(), 2);

    let stub = ScriptedCaptioner::new([
        Ok("Diagram of the study design.".to_string()),
        Ok("Decorative page ornament.".to_string()),
    ]);
    let captioner: Arc<dyn Captioner> = stub.clone();
    let config = fast_config();

    let (results, failures) = caption_prepared(&captioner, &prepared, &config).await;

    assert!(failures.is_empty());
    // Every prepared image reaches the service: captioning consumes the
    // in-memory bitmap directly, nothing is staged on disk in between.
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    assert_eq!(results.len(), 2);
    assert_eq!(results.get(10), Some("Diagram of the study design."));
    assert_eq!(results.get(11), Some("Decorative page ornament."));

    // Persist and verify the exact artifact shape the writer consumes.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output-alt-text.json");
    results.write(&path).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["10"]["alt"], "Diagram of the study design.");
    assert_eq!(value["11"]["alt"], "Decorative page ornament.");
    assert_eq!(value.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_then_success_consumes_exactly_three_invocations() {
    let stub = ScriptedCaptioner::new([
        Ok(String::new()),
        Ok(String::new()),
        Ok("A photo of a cat.".to_string()),
    ]);
    let captioner: Arc<dyn Captioner> = stub.clone();
    let config = fast_config();

    let prepared = vec![PreparedImage {
        reference: 42,
        context: "Some page text.".into(),
        bitmap: bitmap(40, 40),
    }];

    let (results, failures) = caption_prepared(&captioner, &prepared, &config).await;

    assert!(failures.is_empty());
    assert_eq!(results.get(42), Some("A photo of a cat."));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn one_bad_image_does_not_lose_the_document() {
    let captioner: Arc<dyn Captioner> = ScriptedCaptioner::new([
        Err(CaptionServiceError("boom".into())),
        Err(CaptionServiceError("boom".into())),
        Err(CaptionServiceError("boom".into())),
        Err(CaptionServiceError("boom".into())),
        // Second image succeeds on its first attempt.
        Ok("A line chart of temperatures.".to_string()),
    ]);
    let config = fast_config();

    let prepared = vec![
        PreparedImage {
            reference: 1,
            context: String::new(),
            bitmap: bitmap(32, 32),
        },
        PreparedImage {
            reference: 2,
            context: String::new(),
            bitmap: bitmap(32, 32),
        },
    ];

    let (results, failures) = caption_prepared(&captioner, &prepared, &config).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results.get(2), Some("A line chart of temperatures."));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reference(), 1);
}

#[tokio::test]
async fn reruns_produce_fresh_results_not_cached_ones() {
    // Documented behavior: the pipeline has no caption cache, so re-running
    // the same document yields a fresh (possibly different) result set.
    let captioner: Arc<dyn Captioner> = Arc::new(CountingCaptioner {
        calls: AtomicU32::new(0),
    });
    let config = fast_config();

    let prepared = vec![PreparedImage {
        reference: 5,
        context: "Page text.".into(),
        bitmap: bitmap(50, 50),
    }];

    let (first, _) = caption_prepared(&captioner, &prepared, &config).await;
    let (second, _) = caption_prepared(&captioner, &prepared, &config).await;

    assert_eq!(first.get(5), Some("Caption variant 1."));
    assert_eq!(second.get(5), Some("Caption variant 2."));
    assert_ne!(first.get(5), second.get(5));
}

#[tokio::test]
async fn persisted_artifact_is_overwritten_per_document() {
    let captioner: Arc<dyn Captioner> =
        ScriptedCaptioner::new([Ok("From document one.".to_string())]);
    let config = fast_config();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output-alt-text.json");

    let doc_one = vec![PreparedImage {
        reference: 100,
        context: String::new(),
        bitmap: bitmap(32, 32),
    }];
    let (results_one, _) = caption_prepared(&captioner, &doc_one, &config).await;
    results_one.write(&path).await.unwrap();

    let doc_two = vec![PreparedImage {
        reference: 200,
        context: String::new(),
        bitmap: bitmap(32, 32),
    }];
    let (results_two, _) = caption_prepared(&captioner, &doc_two, &config).await;
    results_two.write(&path).await.unwrap();

    // Only the last document's mapping survives at the artifact path,
    // which is exactly why the writer runs per document, not per run.
    let on_disk: CaptionResults =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 1);
    assert!(on_disk.get(200).is_some());
    assert!(on_disk.get(100).is_none());
}
