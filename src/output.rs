//! Results and run reporting.
//!
//! [`CaptionResults`] is the pipeline's terminal artifact for one document:
//! a `reference → {"alt": altText}` mapping persisted as a single JSON
//! object, which is the contract the external tag-tree writer matches
//! figures against. The file is overwritten on every write — results do
//! not accumulate across documents, which is why the orchestrator persists
//! and hands off once per document.
//!
//! [`DocumentOutcome`] and [`RunStats`] report partial success as data:
//! skipped images carry their reasons instead of aborting the document.

use crate::error::{AltTextError, ImageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One persisted alt-text entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltTextEntry {
    pub alt: String,
}

/// The `reference → {"alt": …}` mapping for one document.
///
/// Keys are the figure object numbers rendered as strings (JSON object keys
/// must be strings; the writer parses them back). `BTreeMap` keeps the
/// serialised artifact deterministically ordered.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CaptionResults(BTreeMap<String, AltTextEntry>);

impl CaptionResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the caption for `reference`.
    ///
    /// Each reference is captioned at most once per document pass, so an
    /// existing entry being replaced indicates a correlation bug upstream;
    /// the insert is debug-logged for that reason.
    pub fn insert(&mut self, reference: u32, alt: impl Into<String>) {
        let previous = self
            .0
            .insert(reference.to_string(), AltTextEntry { alt: alt.into() });
        debug_assert!(previous.is_none(), "reference {reference} captioned twice");
    }

    pub fn get(&self, reference: u32) -> Option<&str> {
        self.0.get(&reference.to_string()).map(|e| e.alt.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Persist the mapping to `path`, replacing whatever was there.
    ///
    /// Atomic write (temp file + rename) so the tag-tree writer can never
    /// observe a half-written artifact.
    pub async fn write(&self, path: &Path) -> Result<(), AltTextError> {
        let json = serde_json::to_string(&self)
            .map_err(|e| AltTextError::Internal(format!("results serialisation: {e}")))?;

        let map_io = |e: std::io::Error| AltTextError::ResultsWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(map_io)?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await.map_err(map_io)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(map_io)?;

        debug!("Persisted {} captions to {}", self.len(), path.display());
        Ok(())
    }
}

/// What happened to one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    /// Figures reported by structure discovery.
    pub images_found: usize,
    /// The captions that were produced and persisted.
    pub results: CaptionResults,
    /// Images skipped with their reasons (extraction, normalisation, or
    /// captioning failures). `images_found == results.len() + skipped.len()`.
    pub skipped: Vec<ImageError>,
    /// Whether the tag-tree writer ran successfully.
    pub injected: bool,
    pub duration_ms: u64,
}

/// Aggregate statistics for one directory run.
#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    pub documents: usize,
    /// Documents that failed terminally (discovery or PDF open failure).
    pub failed_documents: usize,
    pub images_found: usize,
    pub images_captioned: usize,
    pub images_skipped: usize,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub fn absorb(&mut self, outcome: &DocumentOutcome) {
        self.documents += 1;
        self.images_found += outcome.images_found;
        self.images_captioned += outcome.results.len();
        self.images_skipped += outcome.skipped.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialised_shape_matches_writer_contract() {
        let mut results = CaptionResults::new();
        results.insert(42, "A photo of a cat.");
        results.insert(7, "A bar chart.");

        let json = serde_json::to_string(&results).unwrap();
        // BTreeMap orders keys lexicographically.
        assert_eq!(
            json,
            r#"{"42":{"alt":"A photo of a cat."},"7":{"alt":"A bar chart."}}"#
        );
    }

    #[test]
    fn lookup_by_reference() {
        let mut results = CaptionResults::new();
        results.insert(42, "A map of Europe.");
        assert_eq!(results.get(42), Some("A map of Europe."));
        assert_eq!(results.get(43), None);
    }

    #[tokio::test]
    async fn write_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output-alt-text.json");

        let mut first = CaptionResults::new();
        first.insert(1, "first run");
        first.write(&path).await.unwrap();

        let mut second = CaptionResults::new();
        second.insert(2, "second run");
        second.write(&path).await.unwrap();

        let on_disk: CaptionResults =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.get(2), Some("second run"));
        assert_eq!(on_disk.get(1), None);
    }

    #[test]
    fn run_stats_absorb() {
        let mut results = CaptionResults::new();
        results.insert(1, "alt");

        let outcome = DocumentOutcome {
            path: PathBuf::from("a.pdf"),
            images_found: 2,
            results,
            skipped: vec![ImageError::CaptionUnavailable {
                reference: 2,
                attempts: 4,
            }],
            injected: true,
            duration_ms: 10,
        };

        let mut stats = RunStats::default();
        stats.absorb(&outcome);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.images_found, 2);
        assert_eq!(stats.images_captioned, 1);
        assert_eq!(stats.images_skipped, 1);
    }
}
