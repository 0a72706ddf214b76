//! Structure discovery: locate tagged figures and their bounding boxes.
//!
//! The discovery tool walks the PDF's structure tree (something the text
//! extraction engine does not expose) and reports, per `/Figure` element,
//! the owning page and the figure's bounding box already converted to
//! top-down page points. It prints a single JSON object on stdout:
//!
//! ```json
//! {
//!   "pages":   [[31, 0], [54, 1]],
//!   "figures": [[42, [31, 72.0, 144.5, 300.0, 290.25]], ...]
//! }
//! ```
//!
//! `pages` maps a page object number to its page index; `figures` maps a
//! figure object number to `[pageKey, left, top, right, bottom]`. The two
//! fields are decoded independently: a malformed half is logged and the
//! other half still used, so a partially-broken tool run degrades to fewer
//! figures rather than a dead document. Lookups that cannot be resolved
//! from the decoded data are logged and skipped, never masked.

use crate::config::AltTextConfig;
use crate::error::AltTextError;
use crate::geometry::BoundingBox;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// One detected embedded image awaiting a caption.
///
/// `reference` is the figure's PDF object number — stable and unique within
/// the document, and the key the tag-tree writer matches on.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub reference: u32,
    pub page_index: usize,
    pub bounds: BoundingBox,
}

/// Page-object-number → page-index mapping for one document.
///
/// Owned by the orchestrator for the lifetime of a single document pass and
/// discarded when the document finishes.
#[derive(Debug, Default)]
pub struct PageGeometryRecord {
    pages: HashMap<u32, usize>,
}

impl PageGeometryRecord {
    pub fn page_index(&self, page_key: u32) -> Option<usize> {
        self.pages.get(&page_key).copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// The decoded result of one discovery-tool run.
#[derive(Debug, Default)]
pub struct DiscoveredStructure {
    pub pages: PageGeometryRecord,
    pub images: Vec<ImageDescriptor>,
}

/// Run the discovery tool for `pdf_path` and decode its output.
///
/// `page_height` is the first page's height in points; the tool needs it to
/// flip bounding boxes from PDF bottom-up space into top-down page points.
///
/// # Errors
/// Fails when the tool cannot be launched, exits nonzero, or produces
/// output in which neither field decodes. A single bad field is non-fatal.
pub async fn discover_structure(
    pdf_path: &Path,
    page_height: f32,
    config: &AltTextConfig,
) -> Result<DiscoveredStructure, AltTextError> {
    let output = Command::new(&config.node_bin)
        .arg(&config.discover_tool)
        .arg(pdf_path)
        .arg(page_height.to_string())
        .output()
        .await
        .map_err(|e| AltTextError::ToolLaunchFailed {
            tool: "structure discovery",
            command: format!("{} {}", config.node_bin, config.discover_tool.display()),
            source: e,
        })?;

    if !output.status.success() {
        return Err(AltTextError::ToolFailed {
            tool: "structure discovery",
            path: pdf_path.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let structure = parse_discovery_payload(&stdout).map_err(|detail| {
        AltTextError::DiscoveryDecodeFailed {
            path: pdf_path.to_path_buf(),
            detail,
        }
    })?;

    debug!(
        "Discovered {} pages, {} figures in {}",
        structure.pages.len(),
        structure.images.len(),
        pdf_path.display()
    );

    Ok(structure)
}

/// Decode the discovery payload, tolerating a malformed half.
///
/// Errors only when the payload is not a JSON object at all — in that case
/// there is nothing to proceed with.
pub fn parse_discovery_payload(payload: &str) -> Result<DiscoveredStructure, String> {
    let root: serde_json::Value =
        serde_json::from_str(payload.trim()).map_err(|e| format!("not a JSON object: {e}"))?;

    // Each half decoded on its own: a bad `figures` array must not take the
    // page map down with it, and vice versa.
    let pages: HashMap<u32, usize> = match root.get("pages") {
        Some(v) => match serde_json::from_value::<Vec<(u32, usize)>>(v.clone()) {
            Ok(entries) => entries.into_iter().collect(),
            Err(e) => {
                warn!("Discovery 'pages' field failed to decode, proceeding without it: {e}");
                HashMap::new()
            }
        },
        None => {
            warn!("Discovery output has no 'pages' field");
            HashMap::new()
        }
    };

    let raw_figures: Vec<(u32, (u32, f32, f32, f32, f32))> = match root.get("figures") {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Discovery 'figures' field failed to decode, proceeding without it: {e}");
                Vec::new()
            }
        },
        None => {
            warn!("Discovery output has no 'figures' field");
            Vec::new()
        }
    };

    let record = PageGeometryRecord { pages };

    let mut images = Vec::with_capacity(raw_figures.len());
    for (reference, (page_key, left, top, right, bottom)) in raw_figures {
        let Some(page_index) = record.page_index(page_key) else {
            // Partial decode above can leave the page map short; the figure
            // cannot be placed, so it is reported and dropped.
            warn!(
                "Figure {} references unknown page object {}, skipping",
                reference, page_key
            );
            continue;
        };
        images.push(ImageDescriptor {
            reference,
            page_index,
            bounds: BoundingBox::new(left, top, right, bottom),
        });
    }

    Ok(DiscoveredStructure {
        pages: record,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_payload() {
        let payload = r#"{
            "pages": [[31, 0], [54, 1]],
            "figures": [
                [42, [31, 72.0, 144.5, 300.0, 290.25]],
                [77, [54, 10.0, 10.0, 50.0, 50.0]]
            ]
        }"#;
        let s = parse_discovery_payload(payload).unwrap();
        assert_eq!(s.pages.len(), 2);
        assert_eq!(s.images.len(), 2);
        assert_eq!(s.images[0].reference, 42);
        assert_eq!(s.images[0].page_index, 0);
        assert_eq!(s.images[0].bounds, BoundingBox::new(72.0, 144.5, 300.0, 290.25));
        assert_eq!(s.images[1].page_index, 1);
    }

    #[test]
    fn malformed_figures_half_keeps_pages() {
        let payload = r#"{"pages": [[31, 0]], "figures": "garbage"}"#;
        let s = parse_discovery_payload(payload).unwrap();
        assert_eq!(s.pages.len(), 1);
        assert!(s.images.is_empty());
    }

    #[test]
    fn malformed_pages_half_drops_unplaceable_figures() {
        let payload = r#"{"pages": 12, "figures": [[42, [31, 0.0, 0.0, 10.0, 10.0]]]}"#;
        let s = parse_discovery_payload(payload).unwrap();
        assert!(s.pages.is_empty());
        // The figure's page key cannot be resolved, so it is dropped.
        assert!(s.images.is_empty());
    }

    #[test]
    fn unknown_page_key_is_skipped() {
        let payload = r#"{
            "pages": [[31, 0]],
            "figures": [
                [42, [31, 0.0, 0.0, 10.0, 10.0]],
                [43, [99, 0.0, 0.0, 10.0, 10.0]]
            ]
        }"#;
        let s = parse_discovery_payload(payload).unwrap();
        assert_eq!(s.images.len(), 1);
        assert_eq!(s.images[0].reference, 42);
    }

    #[test]
    fn non_object_payload_is_an_error() {
        assert!(parse_discovery_payload("pages|figures").is_err());
    }
}
