//! Pipeline stages for alt-text generation.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different captioning backend) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ extract ──▶ context ──▶ normalize ──▶ encode ──▶ caption ──▶ handoff
//! (bbox tool)  (pdfium)    (sentinels)  (resize)     (base64)   (VLM)       (writer tool)
//! ```
//!
//! 1. [`discover`]  — run the external bounding-box tool and build typed
//!    page/figure records
//! 2. [`extract`]   — pull text blocks and figure pixmaps out of the PDF;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`context`]   — correlate block geometry against each figure and
//!    assemble one sentinel-marked context string per image
//! 4. [`normalize`] — enforce the captioning model's input constraints
//!    (minimum size, maximum aspect ratio)
//! 5. [`encode`]    — PNG-encode and base64-wrap each bitmap for the
//!    multimodal request body
//! 6. [`caption`]   — drive the VLM call with retry/backoff; the only stage
//!    with network I/O
//! 7. [`handoff`]   — invoke the external tag-tree writer on the document

pub mod caption;
pub mod context;
pub mod discover;
pub mod encode;
pub mod extract;
pub mod handoff;
pub mod normalize;
