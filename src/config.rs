//! Configuration types for the alt-text pipeline.
//!
//! All pipeline behaviour is controlled through [`AltTextConfig`], built via
//! its [`AltTextConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across a whole directory run and to diff two
//! runs whose outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::AltTextError;
use crate::geometry::DEFAULT_TOLERANCE;
use crate::pipeline::caption::Captioner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an alt-text generation run.
///
/// Built via [`AltTextConfig::builder()`] or using
/// [`AltTextConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_alttext::AltTextConfig;
///
/// let config = AltTextConfig::builder()
///     .tolerance(0.1)
///     .max_retries(5)
///     .model("qwen3-vl:30b")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AltTextConfig {
    /// Absolute coordinate tolerance, in page points, when matching a text
    /// block's geometry against a figure's bounding box. Default: 0.1.
    ///
    /// The text-layout engine and the structure-discovery tool round
    /// coordinates differently; 0.1 pt absorbs that rounding while still
    /// rejecting genuinely different boxes.
    pub tolerance: f32,

    /// Minimum width in pixels an image must have before captioning. Default: 32.
    ///
    /// Vision models reject or mangle tiny inputs; below the floor the image
    /// is uniformly upscaled, never cropped.
    pub min_width: u32,

    /// Minimum height in pixels. Default: 32.
    pub min_height: u32,

    /// Maximum width/height aspect ratio. Default: 200.
    ///
    /// Images wider than this are shrunk in width only; height is never
    /// adjusted by this pass, so extremely tall-and-narrow images are left
    /// as-is. That asymmetry mirrors model input constraints, which bound
    /// the horizontal tiling dimension.
    pub max_aspect_ratio: f32,

    /// Page render scale used when extracting figure pixmaps. Default: 4.0.
    ///
    /// 4× gives roughly 288 DPI worth of pixels inside the figure region,
    /// enough for the model to read embedded labels and chart text.
    pub render_scale: f32,

    /// VLM model identifier, e.g. "qwen3-vl:30b", "gpt-4.1-nano".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Captioning provider name (e.g. "ollama", "openai", "anthropic").
    /// If None along with `captioner`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed captioning service. Takes precedence over
    /// `provider_name`. Used by tests to stub the VLM entirely.
    pub captioner: Option<Arc<dyn Captioner>>,

    /// Sampling temperature for the caption completion. Default: 0.1.
    ///
    /// Alt-text should describe what is actually in the figure; low
    /// temperature keeps the model faithful rather than creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate per caption. Default: 512.
    ///
    /// Alt-text is short by nature. 512 leaves room for complex charts
    /// without letting a rambling model burn tokens.
    pub max_tokens: usize,

    /// Maximum retry attempts per image on a failed or empty caption.
    /// Default: 3.
    ///
    /// Captioning is retried with exponential backoff; after the budget is
    /// exhausted the image is reported as caption-unavailable and the
    /// document continues. There is deliberately no unbounded retry: a
    /// persistently empty-responding service must not stall the run.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// How to treat an empty caption response. Default: [`EmptyCaptionPolicy::Retry`].
    pub empty_caption: EmptyCaptionPolicy,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Path of the persisted `reference → {"alt": …}` artifact.
    /// Default: `output-alt-text.json`.
    ///
    /// The path is forwarded to the tag-tree writer on handoff. It is
    /// overwritten for every document, which is why persistence and handoff
    /// run per document rather than once per run.
    pub results_path: PathBuf,

    /// Interpreter used to run the helper tools. Default: `node`.
    pub node_bin: String,

    /// Path to the structure-discovery script (figure bounding boxes).
    /// Default: `get-bbox.js`.
    pub discover_tool: PathBuf,

    /// Path to the tag-tree writer script (alt-text injection).
    /// Default: `add-alt-text.js`.
    pub writer_tool: PathBuf,

    /// Skip the tag-tree writer handoff (generate and persist only).
    /// Default: false.
    pub skip_handoff: bool,
}

impl Default for AltTextConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            min_width: 32,
            min_height: 32,
            max_aspect_ratio: 200.0,
            render_scale: 4.0,
            model: None,
            provider_name: None,
            captioner: None,
            temperature: 0.1,
            max_tokens: 512,
            max_retries: 3,
            retry_backoff_ms: 500,
            empty_caption: EmptyCaptionPolicy::default(),
            system_prompt: None,
            results_path: PathBuf::from("output-alt-text.json"),
            node_bin: "node".to_string(),
            discover_tool: PathBuf::from("get-bbox.js"),
            writer_tool: PathBuf::from("add-alt-text.js"),
            skip_handoff: false,
        }
    }
}

impl fmt::Debug for AltTextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AltTextConfig")
            .field("tolerance", &self.tolerance)
            .field("min_width", &self.min_width)
            .field("min_height", &self.min_height)
            .field("max_aspect_ratio", &self.max_aspect_ratio)
            .field("render_scale", &self.render_scale)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("captioner", &self.captioner.as_ref().map(|_| "<dyn Captioner>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("empty_caption", &self.empty_caption)
            .field("results_path", &self.results_path)
            .field("skip_handoff", &self.skip_handoff)
            .finish()
    }
}

impl AltTextConfig {
    /// Create a new builder for `AltTextConfig`.
    pub fn builder() -> AltTextConfigBuilder {
        AltTextConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AltTextConfig`].
#[derive(Debug)]
pub struct AltTextConfigBuilder {
    config: AltTextConfig,
}

impl AltTextConfigBuilder {
    pub fn tolerance(mut self, tol: f32) -> Self {
        self.config.tolerance = tol;
        self
    }

    pub fn min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.min_width = width.max(1);
        self.config.min_height = height.max(1);
        self
    }

    pub fn max_aspect_ratio(mut self, ratio: f32) -> Self {
        self.config.max_aspect_ratio = ratio;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 8.0);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.config.captioner = Some(captioner);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn empty_caption(mut self, policy: EmptyCaptionPolicy) -> Self {
        self.config.empty_caption = policy;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.results_path = path.into();
        self
    }

    pub fn node_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.node_bin = bin.into();
        self
    }

    pub fn discover_tool(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.discover_tool = path.into();
        self
    }

    pub fn writer_tool(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.writer_tool = path.into();
        self
    }

    pub fn skip_handoff(mut self, v: bool) -> Self {
        self.config.skip_handoff = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AltTextConfig, AltTextError> {
        let c = &self.config;
        if !c.tolerance.is_finite() || c.tolerance < 0.0 {
            return Err(AltTextError::InvalidConfig(format!(
                "Tolerance must be a non-negative number, got {}",
                c.tolerance
            )));
        }
        if c.max_aspect_ratio <= 1.0 {
            return Err(AltTextError::InvalidConfig(format!(
                "Max aspect ratio must be > 1, got {}",
                c.max_aspect_ratio
            )));
        }
        if c.max_tokens == 0 {
            return Err(AltTextError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What an empty caption response means.
///
/// The distinction matters because an empty string can be either a transient
/// service hiccup (worth retrying) or the model declining to describe the
/// image (retrying just burns the budget). The right reading depends on the
/// deployment, so it is a policy knob rather than a hard-coded guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyCaptionPolicy {
    /// Treat empty as transient: retry with backoff until the retry budget
    /// is exhausted, then report the image as caption-unavailable. (default)
    #[default]
    Retry,
    /// Treat empty as the model declining: fail the image immediately
    /// without consuming retries.
    Decline,
}
