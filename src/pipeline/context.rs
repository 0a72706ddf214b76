//! Context assembly: one sentinel-marked context string per figure.
//!
//! The captioning model gets the full text of the figure's page, with the
//! figure's own position marked by [`MATCHED_SENTINEL`] and any unrelated
//! figure marked by [`OTHER_IMAGE_SENTINEL`]. Sentinels instead of pixel
//! data keep the prompt small while still telling the model *where* in the
//! running text its image sits — which is usually where the caption or the
//! referencing sentence is.
//!
//! Each figure on a page re-scans the same block list (O(images × blocks)).
//! Per-document counts are small, so no memoisation is done.

use crate::geometry::BoundingBox;
use crate::pipeline::extract::TextBlock;

/// Marks the position of the figure currently being captioned.
pub const MATCHED_SENTINEL: &str = "|IMAGE INTERESTED|";

/// Marks the position of any other figure on the page.
///
/// A marker block whose geometry matches no known figure still gets this
/// sentinel rather than being dropped — the model should know an unrelated
/// figure sits there even when we cannot identify it.
pub const OTHER_IMAGE_SENTINEL: &str = "|OTHER IMAGE|";

/// Assemble the context string for one figure from its page's blocks.
///
/// Blocks are visited in extraction order. Image-marker blocks are replaced
/// by a sentinel chosen by geometry; all other blocks contribute their
/// literal text. Parts are joined with single spaces.
pub fn assemble_context(
    blocks: &[TextBlock],
    image_bounds: &BoundingBox,
    tolerance: f32,
) -> String {
    let parts: Vec<&str> = blocks
        .iter()
        .map(|block| {
            if block.is_image_marker() {
                if block.bounds.matches(image_bounds, tolerance) {
                    MATCHED_SENTINEL
                } else {
                    OTHER_IMAGE_SENTINEL
                }
            } else {
                block.content.as_str()
            }
        })
        .collect();

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DEFAULT_TOLERANCE;
    use crate::pipeline::extract::IMAGE_MARKER_PREFIX;

    fn text(content: &str, left: f32, top: f32) -> TextBlock {
        TextBlock {
            bounds: BoundingBox::new(left, top, left + 100.0, top + 20.0),
            content: content.into(),
        }
    }

    fn marker(left: f32, top: f32, right: f32, bottom: f32) -> TextBlock {
        TextBlock {
            bounds: BoundingBox::new(left, top, right, bottom),
            content: format!("{IMAGE_MARKER_PREFIX} test>"),
        }
    }

    #[test]
    fn exact_match_yields_one_matched_sentinel() {
        let blocks = vec![
            text("Intro paragraph.", 72.0, 100.0),
            marker(72.0, 150.0, 300.0, 400.0),
            text("Figure 1 caption", 72.0, 410.0),
        ];
        let target = BoundingBox::new(72.0, 150.0, 300.0, 400.0);

        let ctx = assemble_context(&blocks, &target, DEFAULT_TOLERANCE);

        assert_eq!(
            ctx,
            format!("Intro paragraph. {MATCHED_SENTINEL} Figure 1 caption")
        );
        assert_eq!(ctx.matches(MATCHED_SENTINEL).count(), 1);
        assert!(!ctx.contains(OTHER_IMAGE_SENTINEL));
    }

    #[test]
    fn unmatched_marker_becomes_other_image() {
        let blocks = vec![
            marker(10.0, 10.0, 60.0, 60.0),
            text("Body text", 72.0, 100.0),
        ];
        // Target box nowhere near the marker on this page.
        let target = BoundingBox::new(400.0, 400.0, 500.0, 500.0);

        let ctx = assemble_context(&blocks, &target, DEFAULT_TOLERANCE);

        assert_eq!(ctx, format!("{OTHER_IMAGE_SENTINEL} Body text"));
    }

    #[test]
    fn two_figures_each_see_the_other_as_unrelated() {
        let box_a = BoundingBox::new(72.0, 100.0, 200.0, 200.0);
        let box_b = BoundingBox::new(72.0, 300.0, 200.0, 400.0);
        let blocks = vec![
            marker(72.0, 100.0, 200.0, 200.0),
            text("between the figures", 72.0, 220.0),
            marker(72.0, 300.0, 200.0, 400.0),
        ];

        let ctx_a = assemble_context(&blocks, &box_a, DEFAULT_TOLERANCE);
        let ctx_b = assemble_context(&blocks, &box_b, DEFAULT_TOLERANCE);

        assert_eq!(
            ctx_a,
            format!("{MATCHED_SENTINEL} between the figures {OTHER_IMAGE_SENTINEL}")
        );
        assert_eq!(
            ctx_b,
            format!("{OTHER_IMAGE_SENTINEL} between the figures {MATCHED_SENTINEL}")
        );
    }

    #[test]
    fn block_order_is_preserved() {
        let blocks = vec![
            text("one", 0.0, 0.0),
            text("two", 0.0, 30.0),
            text("three", 0.0, 60.0),
        ];
        let target = BoundingBox::new(500.0, 500.0, 600.0, 600.0);

        let ctx = assemble_context(&blocks, &target, DEFAULT_TOLERANCE);
        assert_eq!(ctx, "one two three");
    }

    #[test]
    fn rounding_drift_within_tolerance_still_matches() {
        let blocks = vec![marker(72.04, 150.03, 299.96, 400.08)];
        let target = BoundingBox::new(72.0, 150.0, 300.0, 400.0);

        let ctx = assemble_context(&blocks, &target, DEFAULT_TOLERANCE);
        assert_eq!(ctx, MATCHED_SENTINEL);
    }

    #[test]
    fn empty_page_yields_empty_context() {
        let target = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(assemble_context(&[], &target, DEFAULT_TOLERANCE), "");
    }
}
