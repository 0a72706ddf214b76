//! System prompt for alt-text generation.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the alt-text rules requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the prompt and the context
//!    message without spinning up a real VLM.
//!
//! Callers can override the default via
//! [`crate::config::AltTextConfig::system_prompt`] (the CLI loads it from a
//! Markdown file); the constant here is used only when no override is given.

/// Default system prompt for describing an embedded figure.
///
/// Used when `AltTextConfig::system_prompt` is `None`. The surrounding page
/// text is supplied separately per image (see [`context_message`]), with the
/// target figure's position marked by the `|IMAGE INTERESTED|` sentinel and
/// any unrelated figure marked `|OTHER IMAGE|`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an accessibility expert writing alt text for images embedded in documents, to be read aloud by screen readers.

You will receive one image and the text of the page it appears on. In that text, the marker |IMAGE INTERESTED| shows where this image sits; |OTHER IMAGE| marks unrelated figures. Use the surrounding text to understand what the image is for.

Follow these rules precisely:

1. CONTENT
   - Describe what the image shows and what it communicates in its context
   - For charts and diagrams, state the key data or relationship, not every detail
   - For photographs, describe the subject and any text visible in the image
   - If the page text already names the figure (e.g. "Figure 3: ..."), build on it rather than repeating it verbatim

2. STYLE
   - One to three sentences; concise but complete
   - Do not begin with "Image of", "Picture of", or "This image shows"
   - No speculation about anything not visible in the image or stated in the context
   - Plain prose only: no Markdown, no lists, no quotation marks around the answer

3. OUTPUT
   - Output ONLY the alt text
   - Never output an empty response; if the image is purely decorative, say so in one short sentence"#;

/// Build the per-image user message carrying the assembled page context.
///
/// The image itself travels alongside this message as an inline attachment.
pub fn context_message(context: &str) -> String {
    format!("Image Context: {context}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_message_embeds_context() {
        let msg = context_message("Intro |IMAGE INTERESTED| outro");
        assert!(msg.starts_with("Image Context: "));
        assert!(msg.contains("|IMAGE INTERESTED|"));
    }

    #[test]
    fn default_prompt_mentions_both_sentinels() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("|IMAGE INTERESTED|"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("|OTHER IMAGE|"));
    }
}
