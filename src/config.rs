//! Configuration types for catalog extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::CatalogError;
use crate::progress::BatchProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one extraction batch.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use lumispec::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_image_edge(2000)
///     .jpeg_quality(90)
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Longest edge of the rasterised unit image in pixels. Default: 1280.
    ///
    /// Catalog pages are mostly large print; 1280 px keeps the base64 payload
    /// small while staying legible to a VLM. Dense price screenshots benefit
    /// from 2000 px so thin table rules and small digits survive the resize.
    pub max_image_edge: u32,

    /// JPEG quality for the re-encoded unit image (1–100). Default: 80.
    ///
    /// Tabular screenshots with fine digits tolerate compression poorly;
    /// raise to 90 when extracting price tables.
    pub jpeg_quality: u8,

    /// Maximum characters of a unit's text layer embedded in the prompt. Default: 8000.
    ///
    /// A text layer beyond this is truncated, not rejected — the tail of a
    /// very long page is almost always boilerplate, and an oversized prompt
    /// costs more than it recovers.
    pub text_char_budget: usize,

    /// Sampling temperature for the extraction call. Default: 0.2.
    ///
    /// Low temperature keeps the model faithful to what is on the page.
    /// Higher values introduce creativity that corrupts model codes.
    pub temperature: f32,

    /// Maximum tokens the model may generate per unit. Default: 1600.
    pub max_tokens: usize,

    /// Retry policy applied independently to each grounding attempt.
    pub retry: RetryPolicy,

    /// Prompt profile selecting the extraction instructions. Default: [`PromptProfile::Catalog`].
    pub profile: PromptProfile,

    /// LLM model identifier, e.g. "gpt-4o". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Optional per-unit progress callback.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_image_edge: 1280,
            jpeg_quality: 80,
            text_char_budget: 8000,
            temperature: 0.2,
            max_tokens: 1600,
            retry: RetryPolicy::default(),
            profile: PromptProfile::default(),
            model: None,
            provider_name: None,
            provider: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_image_edge", &self.max_image_edge)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("text_char_budget", &self.text_char_budget)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("profile", &self.profile)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_image_edge(mut self, px: u32) -> Self {
        self.config.max_image_edge = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn text_char_budget(mut self, chars: usize) -> Self {
        self.config.text_char_budget = chars.max(200);
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

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn profile(mut self, profile: PromptProfile) -> Self {
        self.config.profile = profile;
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

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, CatalogError> {
        let c = &self.config;
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(CatalogError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.max_tokens == 0 {
            return Err(CatalogError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// How many times a single grounding attempt is retried, and how long to
/// wait between failed calls.
///
/// The policy is a plain value injected through [`ExtractionConfig`] so tests
/// can use [`Backoff::None`] and run the full retry loop without real sleeps.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first call, so each grounding issues `max_retries + 1`
    /// calls at most. Default: 2.
    pub max_retries: u32,
    /// Delay schedule between failed calls.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::Fixed(Duration::from_millis(1200)),
        }
    }
}

impl RetryPolicy {
    /// No retries, no delays. Useful in tests and for interactive probing.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::None,
        }
    }

    /// Delay before retry `attempt` (1-based). `None` means retry immediately.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Fixed(d) => Some(d),
            Backoff::Exponential { base } => {
                Some(base * 2u32.saturating_pow(attempt.saturating_sub(1)))
            }
        }
    }
}

/// Delay schedule between failed calls within one grounding attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same fixed delay before every retry.
    Fixed(Duration),
    /// Wait `base * 2^(attempt-1)` before retry `attempt`.
    Exponential { base: Duration },
}

// ── Prompt profile ───────────────────────────────────────────────────────

/// Which extraction instructions are sent to the model.
///
/// Both profiles share the same fixed nine-field output schema; they differ
/// only in what the model is told to look for on the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptProfile {
    /// Full spec extraction from catalog pages (default).
    #[default]
    Catalog,
    /// Model/price pairs from tabular price screenshots: header synonyms
    /// (型號 / 牌價 / 售價 / 價格), multiple tables per image, currency and
    /// thousands separators stripped, 時價 emitted for non-numeric prices.
    PriceTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_out_of_range_values() {
        let config = ExtractionConfig::builder()
            .max_image_edge(10)
            .jpeg_quality(250)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(config.max_image_edge, 100);
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn build_rejects_zero_max_tokens() {
        let err = ExtractionConfig::builder().max_tokens(0).build();
        assert!(matches!(err, Err(CatalogError::InvalidConfig(_))));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Fixed(Duration::from_millis(800)),
        };
        assert_eq!(policy.delay(1), Some(Duration::from_millis(800)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(800)));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(500),
            },
        };
        assert_eq!(policy.delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn none_policy_never_sleeps() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay(1), None);
    }
}
