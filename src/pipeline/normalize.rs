//! Image normalisation: enforce the captioning model's input constraints.
//!
//! Two independent, composable passes run over every extracted bitmap:
//!
//! * **Minimum size** — vision models reject or mangle inputs below their
//!   patch size. Anything under the floors is uniformly upscaled (never
//!   cropped, never padded) using the larger of the two required scale
//!   factors so both floors hold simultaneously.
//!
//! * **Aspect-ratio cap** — extremely wide strips (rules, decorative bars)
//!   blow past model tiling limits. Width is shrunk to `height × ceiling`;
//!   height is never touched by this pass, so tall-and-narrow images are
//!   intentionally left uncorrected. The asymmetry matches the model-side
//!   constraint, which bounds the horizontal dimension only.
//!
//! Lanczos3 resampling throughout: these bitmaps go to a vision model, and
//! soft upscales lose exactly the small text the model needs to read.

use crate::config::AltTextConfig;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Upscale `img` uniformly until both dimensions meet their floors.
///
/// Returns the input untouched when it is already large enough.
pub fn ensure_min_size(img: DynamicImage, min_width: u32, min_height: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width >= min_width && height >= min_height {
        return img;
    }

    let scale_w = min_width as f32 / width as f32;
    let scale_h = min_height as f32 / height as f32;
    // The larger factor guarantees both floors at once.
    let scale = scale_w.max(scale_h);

    let new_width = ((width as f32 * scale).ceil() as u32).max(min_width);
    let new_height = ((height as f32 * scale).ceil() as u32).max(min_height);

    debug!(
        "Upscaling {}x{} → {}x{} (floors {}x{})",
        width, height, new_width, new_height, min_width, min_height
    );
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Shrink width until `width / height` is at most `max_ratio`.
///
/// Height is never adjusted. Tall-and-narrow images pass through unchanged.
pub fn cap_aspect_ratio(img: DynamicImage, max_ratio: f32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let ratio = width as f32 / height as f32;
    if ratio <= max_ratio {
        return img;
    }

    let new_width = ((height as f32 * max_ratio) as u32).max(1);
    debug!(
        "Capping aspect ratio {:.1} → {:.1}: {}x{} → {}x{}",
        ratio, max_ratio, width, height, new_width, height
    );
    img.resize_exact(new_width, height, FilterType::Lanczos3)
}

/// Apply both passes in order: minimum size, then aspect cap.
pub fn normalize(img: DynamicImage, config: &AltTextConfig) -> DynamicImage {
    let img = ensure_min_size(img, config.min_width, config.min_height);
    cap_aspect_ratio(img, config.max_aspect_ratio)
}
