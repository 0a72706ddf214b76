//! Handoff: invoke the external tag-tree writer on a document.
//!
//! The writer receives the document path and the persisted alt-text
//! artifact path on its command line and mutates the document's
//! accessibility structure. From this core's perspective the call is
//! fire-and-forget: stdout is surfaced for diagnostics and never parsed
//! or acted upon.

use crate::config::AltTextConfig;
use crate::error::AltTextError;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Run the tag-tree writer for `pdf_path`.
///
/// The configured `results_path` is forwarded as the second argument, so
/// moving the artifact via config cannot desynchronise the writer from
/// the captions the pipeline just persisted.
///
/// # Errors
/// Fails when the tool cannot be spawned or exits nonzero; the captured
/// stderr travels in the error so the caller can log it.
pub async fn inject_alt_text(
    pdf_path: &Path,
    config: &AltTextConfig,
) -> Result<(), AltTextError> {
    let output = Command::new(&config.node_bin)
        .arg(&config.writer_tool)
        .arg(pdf_path)
        .arg(&config.results_path)
        .output()
        .await
        .map_err(|e| AltTextError::ToolLaunchFailed {
            tool: "tag-tree writer",
            command: format!("{} {}", config.node_bin, config.writer_tool.display()),
            source: e,
        })?;

    if !output.status.success() {
        return Err(AltTextError::ToolFailed {
            tool: "tag-tree writer",
            path: pdf_path.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        info!("Tag-tree writer: {}", stdout.trim());
    }

    Ok(())
}
