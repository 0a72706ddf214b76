//! Caption driver: obtain a non-empty alt-text string for each figure.
//!
//! The VLM sits behind the [`Captioner`] trait so tests can stub the
//! service entirely; [`VisionCaptioner`] is the production implementation
//! over an `edgequake_llm` provider. All prompt text lives in
//! [`crate::prompts`] so it can change without touching retry logic here.
//!
//! ## Retry Strategy
//!
//! Transient API failures and — under the default policy — empty caption
//! responses are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`): with 500 ms base and 3 retries the
//! wait sequence is 500 ms → 1 s → 2 s. The budget is a hard cap. Alt-text
//! is an accessibility requirement, but an unbounded retry against a
//! persistently empty-responding service would stall the whole run; when
//! the budget is exhausted the image surfaces as
//! [`ImageError::CaptionUnavailable`] and the document moves on.

use crate::config::{AltTextConfig, EmptyCaptionPolicy};
use crate::error::{AltTextError, ImageError};
use crate::prompts::{context_message, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// A single failed call to the captioning service.
///
/// The driver decides whether to retry; implementations just report.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CaptionServiceError(pub String);

/// The captioning-service seam.
///
/// One call = one attempt: implementations must not retry internally.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Produce a caption for `image` given the assembled page `context`.
    /// An empty string is a valid response and is interpreted by the
    /// driver according to [`EmptyCaptionPolicy`].
    async fn caption(
        &self,
        context: &str,
        image: &ImageData,
    ) -> Result<String, CaptionServiceError>;
}

/// Production captioner over an `edgequake_llm` vision provider.
pub struct VisionCaptioner {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl VisionCaptioner {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AltTextConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve a provider from the config, most-specific first:
    ///
    /// 1. `config.provider_name` (+ optional `config.model`) — the named
    ///    provider reads its API key from the environment.
    /// 2. Full auto-detection — the factory scans known key variables and
    ///    picks the first available provider.
    pub fn resolve(config: &AltTextConfig) -> Result<Arc<dyn Captioner>, AltTextError> {
        if let Some(ref name) = config.provider_name {
            let model = config.model.as_deref().unwrap_or("qwen3-vl:30b");
            let provider =
                ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                    AltTextError::ProviderNotConfigured {
                        provider: name.clone(),
                        hint: format!("{e}"),
                    }
                })?;
            return Ok(Arc::new(Self::new(provider, config)));
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| AltTextError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No captioning provider could be auto-detected from environment.\n\
                     Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                     Error: {e}"
                ),
            })?;

        Ok(Arc::new(Self::new(provider, config)))
    }
}

#[async_trait]
impl Captioner for VisionCaptioner {
    async fn caption(
        &self,
        context: &str,
        image: &ImageData,
    ) -> Result<String, CaptionServiceError> {
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images(context_message(context), vec![image.clone()]),
        ];

        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CaptionServiceError(e.to_string()))?;

        Ok(response.content)
    }
}

enum LastFailure {
    Empty,
    Service(String),
}

/// Drive the captioning service for one figure until a non-empty caption
/// is produced or the retry budget runs out.
///
/// Every successful (reference, alt-text) pair is logged as produced.
pub async fn caption_image(
    captioner: &Arc<dyn Captioner>,
    reference: u32,
    context: &str,
    image: &ImageData,
    config: &AltTextConfig,
) -> Result<String, ImageError> {
    let mut last_failure: Option<LastFailure> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Image {}: retry {}/{} after {}ms",
                reference, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match captioner.caption(context, image).await {
            Ok(raw) => {
                let alt = clean_caption(&raw);
                if alt.is_empty() {
                    match config.empty_caption {
                        EmptyCaptionPolicy::Decline => {
                            // The model answered and chose to say nothing;
                            // retrying the same inputs will not change that.
                            warn!("Image {}: model declined to caption", reference);
                            return Err(ImageError::CaptionUnavailable {
                                reference,
                                attempts: attempt + 1,
                            });
                        }
                        EmptyCaptionPolicy::Retry => {
                            warn!(
                                "Image {}: attempt {} returned an empty caption",
                                reference,
                                attempt + 1
                            );
                            last_failure = Some(LastFailure::Empty);
                        }
                    }
                } else {
                    info!("Image {}: \"{}\"", reference, alt);
                    return Ok(alt);
                }
            }
            Err(e) => {
                warn!("Image {}: attempt {} failed — {}", reference, attempt + 1, e);
                last_failure = Some(LastFailure::Service(e.to_string()));
            }
        }
    }

    match last_failure {
        Some(LastFailure::Service(detail)) => Err(ImageError::CaptionFailed {
            reference,
            retries: config.max_retries,
            detail,
        }),
        // Empty responses all the way down, or no attempt recorded at all.
        _ => Err(ImageError::CaptionUnavailable {
            reference,
            attempts: config.max_retries + 1,
        }),
    }
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid fence regex"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Light cleanup of a raw model response into screen-reader-ready alt text.
///
/// No schema is enforced on the content — any non-empty string is accepted —
/// but wrapping fences and quotes are model chrome, not description, and
/// alt text is a single line by nature.
pub fn clean_caption(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    if let Some(caps) = FENCE_RE.captures(&text) {
        text = caps[1].trim().to_string();
    }

    // Strip one pair of wrapping quotes.
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim().to_string();
    }

    WHITESPACE_RE.replace_all(&text, " ").into_owned()
}
