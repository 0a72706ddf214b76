//! Error types for the pdf-alttext library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AltTextError`] — **Fatal for a document (or the run)**: structure
//!   discovery failed, the PDF cannot be opened, no captioning provider is
//!   configured. Returned as `Err(AltTextError)` from the per-document entry
//!   points; the directory driver logs it and moves to the next document.
//!
//! * [`ImageError`] — **Non-fatal**: a single embedded image failed
//!   (extraction glitch, normalisation failure, caption unavailable after
//!   retries) but the document's other images are fine. Collected in
//!   [`crate::output::DocumentOutcome`] so callers can inspect partial
//!   success rather than losing a whole document to one bad figure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-alttext library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::DocumentOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AltTextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Path not found: '{path}'\nCheck the path exists and is readable.")]
    PathNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt or unreadable: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// An external helper tool could not be spawned at all.
    #[error("Failed to launch {tool} ('{command}'): {source}\nCheck the tool path and that node is on PATH.")]
    ToolLaunchFailed {
        tool: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external helper tool exited nonzero. `stderr` carries its
    /// diagnostic stream verbatim.
    #[error("{tool} exited with {status} for '{path}'\n{stderr}")]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        status: String,
        stderr: String,
    },

    /// The discovery tool's output was not decodable at all (neither half
    /// yielded usable data).
    #[error("Structure discovery output for '{path}' could not be decoded: {detail}")]
    DiscoveryDecodeFailed { path: PathBuf, detail: String },

    // ── Captioning errors ─────────────────────────────────────────────────
    /// The configured captioning provider is not initialised (missing API
    /// key, unknown provider name, etc.).
    #[error("Captioning provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the persisted alt-text artifact.
    #[error("Failed to write results file '{path}': {source}")]
    ResultsWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image.
///
/// Stored in [`crate::output::DocumentOutcome`] when an image is skipped.
/// Document processing continues with the next image.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// The region pixmap could not be extracted from the page.
    #[error("Image {reference}: extraction failed: {detail}")]
    ExtractFailed { reference: u32, detail: String },

    /// Resize or re-encode of the extracted bitmap failed.
    #[error("Image {reference}: normalisation failed: {detail}")]
    NormalizeFailed { reference: u32, detail: String },

    /// The captioning service errored on every attempt.
    #[error("Image {reference}: captioning failed after {retries} retries: {detail}")]
    CaptionFailed {
        reference: u32,
        retries: u32,
        detail: String,
    },

    /// No non-empty caption could be obtained within the retry budget, or
    /// the model declined (returned empty) under the `Decline` policy.
    #[error("Image {reference}: caption unavailable after {attempts} attempts")]
    CaptionUnavailable { reference: u32, attempts: u32 },
}

impl ImageError {
    /// The image reference this error belongs to.
    pub fn reference(&self) -> u32 {
        match self {
            ImageError::ExtractFailed { reference, .. }
            | ImageError::NormalizeFailed { reference, .. }
            | ImageError::CaptionFailed { reference, .. }
            | ImageError::CaptionUnavailable { reference, .. } => *reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failed_display_carries_stderr() {
        let e = AltTextError::ToolFailed {
            tool: "structure discovery",
            path: PathBuf::from("a.pdf"),
            status: "exit status: 1".into(),
            stderr: "TypeError: cannot read BBox".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("structure discovery"));
        assert!(msg.contains("cannot read BBox"));
    }

    #[test]
    fn caption_unavailable_display() {
        let e = ImageError::CaptionUnavailable {
            reference: 42,
            attempts: 4,
        };
        assert!(e.to_string().contains("42"));
        assert!(e.to_string().contains("4 attempts"));
    }

    #[test]
    fn image_error_reference() {
        let e = ImageError::NormalizeFailed {
            reference: 7,
            detail: "bad png".into(),
        };
        assert_eq!(e.reference(), 7);
    }
}
