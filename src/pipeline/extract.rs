//! Page extraction: text blocks and figure pixmaps via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread-pool thread so the Tokio workers never stall on CPU-heavy
//! rendering.
//!
//! ## Coordinate space
//!
//! pdfium reports geometry in PDF user space (origin bottom-left, y grows
//! upward); the structure-discovery tool reports top-down page points
//! (origin top-left). Everything is flipped into top-down points here, at
//! the extraction boundary, so the geometry matcher compares like with like.
//!
//! ## Image markers
//!
//! The page's image objects are emitted as [`TextBlock`]s whose content is a
//! structural marker rather than text. The context assembler later resolves
//! each marker against the discovered figure geometry — that is the whole
//! correlation trick: the marker block's bounds tell us *where on the page*
//! an image sits inside the reading order.

use crate::error::{AltTextError, ImageError};
use crate::geometry::BoundingBox;
use crate::pipeline::discover::ImageDescriptor;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Prefix of the structural marker emitted for an image object.
pub const IMAGE_MARKER_PREFIX: &str = "<image:";

/// One text block (or image marker) in page reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub bounds: BoundingBox,
    pub content: String,
}

impl TextBlock {
    /// True when this block marks an image's position rather than text.
    pub fn is_image_marker(&self) -> bool {
        self.content.starts_with(IMAGE_MARKER_PREFIX)
    }
}

/// One successfully extracted figure bitmap.
pub struct ExtractedImage {
    pub reference: u32,
    pub bitmap: DynamicImage,
}

/// Everything pulled out of one document in a single pdfium pass.
pub struct ExtractedDocument {
    /// Text blocks per page index, in extraction order. Only pages that
    /// carry at least one discovered figure are present.
    pub blocks: HashMap<usize, Vec<TextBlock>>,
    /// Figure bitmaps, cropped from a scaled page render.
    pub images: Vec<ExtractedImage>,
    /// Per-image extraction failures. Non-fatal: the document continues
    /// with the images that did extract.
    pub failures: Vec<ImageError>,
}

/// Height of the document's first page in points.
///
/// The structure-discovery tool needs it to flip bounding boxes into
/// top-down page points.
pub async fn first_page_height(pdf_path: &Path) -> Result<f32, AltTextError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document = load_document(&pdfium, &path)?;
        let page = document
            .pages()
            .first()
            .map_err(|e| AltTextError::CorruptPdf {
                path: path.clone(),
                detail: format!("{e:?}"),
            })?;
        Ok(page.height().value)
    })
    .await
    .map_err(|e| AltTextError::Internal(format!("Page-height task panicked: {e}")))?
}

/// Extract text blocks and figure bitmaps for every discovered image.
///
/// Runs one blocking pdfium pass for the whole document: each relevant page
/// is loaded once, its blocks collected once, and its scaled render reused
/// for every figure crop on that page.
pub async fn extract_document(
    pdf_path: &Path,
    descriptors: Vec<ImageDescriptor>,
    render_scale: f32,
) -> Result<ExtractedDocument, AltTextError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_document_blocking(&path, &descriptors, render_scale))
        .await
        .map_err(|e| AltTextError::Internal(format!("Extraction task panicked: {e}")))?
}

fn extract_document_blocking(
    pdf_path: &Path,
    descriptors: &[ImageDescriptor],
    render_scale: f32,
) -> Result<ExtractedDocument, AltTextError> {
    let pdfium = Pdfium::default();
    let document = load_document(&pdfium, pdf_path)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    // Group descriptors by page so each page is loaded and rendered once.
    let mut by_page: BTreeMap<usize, Vec<&ImageDescriptor>> = BTreeMap::new();
    for desc in descriptors {
        by_page.entry(desc.page_index).or_default().push(desc);
    }

    let mut blocks = HashMap::new();
    let mut images = Vec::with_capacity(descriptors.len());
    let mut failures = Vec::new();

    for (&page_index, page_descriptors) in &by_page {
        if page_index >= total_pages {
            for desc in page_descriptors {
                failures.push(ImageError::ExtractFailed {
                    reference: desc.reference,
                    detail: format!("page {page_index} out of range (total {total_pages})"),
                });
            }
            continue;
        }

        let page = match pages.get(page_index as u16) {
            Ok(p) => p,
            Err(e) => {
                for desc in page_descriptors {
                    failures.push(ImageError::ExtractFailed {
                        reference: desc.reference,
                        detail: format!("page load: {e:?}"),
                    });
                }
                continue;
            }
        };

        let page_height = page.height().value;
        blocks.insert(page_index, page_text_blocks(&page, page_height));

        // One scaled render per page; all crops on the page reuse it.
        let rendered = match render_page(&page, render_scale) {
            Ok(img) => img,
            Err(detail) => {
                for desc in page_descriptors {
                    failures.push(ImageError::ExtractFailed {
                        reference: desc.reference,
                        detail: detail.clone(),
                    });
                }
                continue;
            }
        };

        let px_per_point = rendered.width() as f32 / page.width().value;

        for desc in page_descriptors {
            match crop_region(&rendered, &desc.bounds, px_per_point) {
                Ok(bitmap) => {
                    debug!(
                        "Extracted figure {} on page {} → {}x{} px",
                        desc.reference,
                        page_index,
                        bitmap.width(),
                        bitmap.height()
                    );
                    images.push(ExtractedImage {
                        reference: desc.reference,
                        bitmap,
                    });
                }
                Err(detail) => failures.push(ImageError::ExtractFailed {
                    reference: desc.reference,
                    detail,
                }),
            }
        }
    }

    if !failures.is_empty() {
        warn!(
            "{}/{} figures failed to extract from {}",
            failures.len(),
            descriptors.len(),
            pdf_path.display()
        );
    }

    Ok(ExtractedDocument {
        blocks,
        images,
        failures,
    })
}

fn load_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, AltTextError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| AltTextError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })
}

/// Collect the page's objects as blocks in extraction order.
///
/// Text objects carry their literal text; image objects become marker
/// blocks. Both get their bounds flipped into top-down page points.
fn page_text_blocks(page: &PdfPage<'_>, page_height: f32) -> Vec<TextBlock> {
    let mut blocks = Vec::new();

    for object in page.objects().iter() {
        let Ok(raw) = object.bounds() else {
            continue;
        };
        let bounds = BoundingBox::new(
            raw.left().value,
            page_height - raw.top().value,
            raw.right().value,
            page_height - raw.bottom().value,
        );

        match object.object_type() {
            PdfPageObjectType::Text => {
                if let Some(text_object) = object.as_text_object() {
                    let content = text_object.text();
                    if !content.trim().is_empty() {
                        blocks.push(TextBlock { bounds, content });
                    }
                }
            }
            PdfPageObjectType::Image => {
                blocks.push(TextBlock {
                    bounds,
                    content: format!(
                        "{IMAGE_MARKER_PREFIX} {:.0}x{:.0} pt>",
                        bounds.width(),
                        bounds.height()
                    ),
                });
            }
            _ => {}
        }
    }

    blocks
}

fn render_page(page: &PdfPage<'_>, render_scale: f32) -> Result<DynamicImage, String> {
    let target_width = (page.width().value * render_scale).round() as i32;
    let render_config = PdfRenderConfig::new().set_target_width(target_width);

    page.render_with_config(&render_config)
        .map(|bitmap| bitmap.as_image())
        .map_err(|e| format!("render: {e:?}"))
}

/// Crop a figure's bounding box out of the scaled page render.
fn crop_region(
    rendered: &DynamicImage,
    bounds: &BoundingBox,
    px_per_point: f32,
) -> Result<DynamicImage, String> {
    let x = (bounds.left * px_per_point).max(0.0) as u32;
    let y = (bounds.top * px_per_point).max(0.0) as u32;
    let right = ((bounds.right * px_per_point) as u32).min(rendered.width());
    let bottom = ((bounds.bottom * px_per_point) as u32).min(rendered.height());

    if right <= x || bottom <= y {
        return Err(format!(
            "degenerate region {:?} at {} px/pt",
            bounds, px_per_point
        ));
    }

    Ok(rendered.crop_imm(x, y, right - x, bottom - y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn marker_detection() {
        let marker = TextBlock {
            bounds: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            content: "<image: 10x10 pt>".into(),
        };
        let text = TextBlock {
            bounds: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            content: "Figure 1 caption".into(),
        };
        assert!(marker.is_image_marker());
        assert!(!text.is_image_marker());
    }

    #[test]
    fn crop_region_maps_points_to_pixels() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            400,
            800,
            Rgba([255, 255, 255, 255]),
        ));
        // 100x200 pt page rendered at 4 px/pt; crop a 25x50 pt box.
        let bounds = BoundingBox::new(10.0, 20.0, 35.0, 70.0);
        let crop = crop_region(&page, &bounds, 4.0).unwrap();
        assert_eq!(crop.width(), 100);
        assert_eq!(crop.height(), 200);
    }

    #[test]
    fn crop_region_clamps_to_page() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([0, 0, 0, 255]),
        ));
        let bounds = BoundingBox::new(-5.0, -5.0, 300.0, 300.0);
        let crop = crop_region(&page, &bounds, 1.0).unwrap();
        assert_eq!(crop.width(), 100);
        assert_eq!(crop.height(), 100);
    }

    #[test]
    fn crop_region_rejects_degenerate_box() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            100,
            100,
            Rgba([0, 0, 0, 255]),
        ));
        let bounds = BoundingBox::new(50.0, 50.0, 50.0, 50.0);
        assert!(crop_region(&page, &bounds, 1.0).is_err());
    }
}
