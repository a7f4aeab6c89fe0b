//! Inference interaction: per-unit extraction with the text → vision
//! fallback, retry policy, and the provider seam.
//!
//! This module is intentionally thin on prompt content — all wording lives
//! in [`crate::prompts`] so it can change without touching retry or
//! fallback logic here.
//!
//! ## Fallback contract
//!
//! A unit with a non-empty text layer gets a **text-grounded** attempt
//! first; only when that yields zero parseable candidates (or errors out)
//! is the unit's image encoded and a **vision-grounded** attempt made.
//! Each grounding issues up to `retries + 1` calls, with the delay between
//! failed calls taken from the injectable [`crate::config::RetryPolicy`].
//! A call "fails" when the transport errors or no JSON can be recovered
//! from the output; a recovered-but-empty array is a definitive "nothing
//! here" and short-circuits the remaining calls of that grounding.

use crate::config::ExtractionConfig;
use crate::error::{CatalogError, UnitError};
use crate::pipeline::source::SourceUnit;
use crate::pipeline::{encode, recover};
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// One call to the external inference capability.
pub struct InferenceRequest {
    pub system: String,
    pub user: String,
    pub image: Option<ImageData>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Transport-level failure of a single inference call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct InferenceCallError(pub String);

/// The seam to the external multimodal inference capability.
///
/// Production code uses [`ProviderClient`]; tests script responses through a
/// mock implementation so the retry loop runs without a network or sleeps.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Issue one call and return the raw free-form output text.
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceCallError>;
}

// ── Production client ────────────────────────────────────────────────────

/// [`InferenceClient`] backed by an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the provider, from most-specific to least-specific.
    ///
    /// 1. **Pre-built provider** (`config.provider`) — used as-is.
    /// 2. **Named provider + model** (`config.provider_name`) — the factory
    ///    reads the matching API key from the environment.
    /// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
    ///    — honoured before auto-detection so a Makefile/CI-level choice wins
    ///    even when multiple API keys are present.
    /// 4. **OpenAI preference** — `OPENAI_API_KEY` set means OpenAI with the
    ///    configured (or default vision) model.
    /// 5. **Full auto-detection** (`ProviderFactory::from_env`).
    pub fn resolve(config: &ExtractionConfig) -> Result<Self, CatalogError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider)));
        }

        if let Some(ref name) = config.provider_name {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider(name, model).map(Self::new);
        }

        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                return create_vision_provider(&prov, &model).map(Self::new);
            }
        }

        if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
            if !openai_key.is_empty() {
                let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
                return create_vision_provider("openai", model).map(Self::new);
            }
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| CatalogError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                     Error: {}",
                    e
                ),
            })?;

        Ok(Self::new(provider))
    }
}

/// Default model when the caller names a provider but no model.
const DEFAULT_VISION_MODEL: &str = "gpt-4o";

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, CatalogError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CatalogError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[async_trait]
impl InferenceClient for ProviderClient {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceCallError> {
        let mut messages = vec![ChatMessage::system(&request.system)];
        messages.push(match request.image {
            Some(image) => ChatMessage::user_with_images(&request.user, vec![image]),
            None => ChatMessage::user(&request.user),
        });

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        self.provider
            .chat(&messages, Some(&options))
            .await
            .map(|response| response.content)
            .map_err(|e| InferenceCallError(e.to_string()))
    }
}

// ── Per-unit extraction ──────────────────────────────────────────────────

/// Extract raw candidate dicts from one unit.
///
/// Text-grounded first when the unit has a text layer, vision-grounded as
/// fallback. Returns the first non-empty candidate batch, or
/// [`UnitError::Extraction`] when both groundings come up empty — the batch
/// counts the failure and moves on.
pub async fn extract_unit(
    client: &dyn InferenceClient,
    unit: &SourceUnit,
    config: &ExtractionConfig,
) -> Result<Vec<Value>, UnitError> {
    let system = prompts::system_prompt(config.profile);

    if !unit.text.is_empty() {
        let text = truncate_chars(&unit.text, config.text_char_budget);
        let user = prompts::text_user_prompt(config.profile, unit.index, text);
        match attempt_grounding(client, system, &user, None, unit.index, "text", config).await {
            Ok(candidates) if !candidates.is_empty() => return Ok(candidates),
            Ok(_) => debug!(
                "Unit {}: text grounding found no products, trying vision",
                unit.index
            ),
            Err(detail) => warn!(
                "Unit {}: text grounding exhausted retries ({detail}), trying vision",
                unit.index
            ),
        }
    }

    let image = encode::encode_unit_image(&unit.image, config).map_err(|e| UnitError::Render {
        unit: unit.index,
        detail: format!("JPEG encode failed: {e}"),
    })?;
    let user = prompts::vision_user_prompt(config.profile);

    match attempt_grounding(client, system, &user, Some(image), unit.index, "vision", config).await
    {
        Ok(candidates) if !candidates.is_empty() => Ok(candidates),
        Ok(_) => Err(UnitError::Extraction {
            unit: unit.index,
            retries: config.retry.max_retries,
            detail: "no products found by either grounding".into(),
        }),
        Err(detail) => Err(UnitError::Extraction {
            unit: unit.index,
            retries: config.retry.max_retries,
            detail,
        }),
    }
}

/// Run the retry loop for one grounding.
///
/// `Ok` carries the recovered candidate batch (possibly empty — the model
/// definitively said "no products", so retrying the same grounding would be
/// waste). `Err` carries the last failure after retries are exhausted.
async fn attempt_grounding(
    client: &dyn InferenceClient,
    system: &str,
    user: &str,
    image: Option<ImageData>,
    unit: usize,
    grounding: &str,
    config: &ExtractionConfig,
) -> Result<Vec<Value>, String> {
    let mut last_err = String::from("no output");

    for attempt in 0..=config.retry.max_retries {
        if attempt > 0 {
            if let Some(delay) = config.retry.delay(attempt) {
                warn!(
                    "Unit {unit}: {grounding} retry {attempt}/{} after {delay:?}",
                    config.retry.max_retries
                );
                sleep(delay).await;
            }
        }

        let request = InferenceRequest {
            system: system.to_string(),
            user: user.to_string(),
            image: image.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        match client.complete(request).await {
            Ok(raw) => match recover::recover_candidates(&raw) {
                Some(candidates) => {
                    debug!(
                        "Unit {unit}: {grounding} grounding recovered {} candidates",
                        candidates.len()
                    );
                    return Ok(candidates);
                }
                None => {
                    last_err = "no JSON recovered from model output".into();
                    warn!("Unit {unit}: {grounding} attempt {} — {last_err}", attempt + 1);
                }
            },
            Err(e) => {
                last_err = e.to_string();
                warn!("Unit {unit}: {grounding} attempt {} failed — {last_err}", attempt + 1);
            }
        }
    }

    Err(last_err)
}

/// Truncate at a char boundary, not a byte offset.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Keyword classification ───────────────────────────────────────────────

/// Outcome of the optional series/model keyword classification.
///
/// `Unknown` is the safe default: the query engine always matches a keyword
/// against both the `series` and `model` fields, so a wrong (or absent)
/// classification never changes which records a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordKind {
    Series,
    Model,
    Unknown,
}

/// Ask the model whether a keyword names a series or a model code.
///
/// Never fails: any transport error, empty input, or unrecognised reply is
/// `Unknown`.
pub async fn classify_keyword(
    client: &dyn InferenceClient,
    keyword: &str,
    config: &ExtractionConfig,
) -> KeywordKind {
    if keyword.trim().is_empty() {
        return KeywordKind::Unknown;
    }

    let request = InferenceRequest {
        system: prompts::CLASSIFY_SYSTEM_PROMPT.to_string(),
        user: prompts::classify_user_prompt(keyword),
        image: None,
        temperature: 0.0,
        max_tokens: config.max_tokens.min(16),
    };

    match client.complete(request).await {
        Ok(reply) => {
            let lowered = reply.to_lowercase();
            if lowered.contains("series") {
                KeywordKind::Series
            } else if lowered.contains("model") {
                KeywordKind::Model
            } else {
                KeywordKind::Unknown
            }
        }
        Err(e) => {
            warn!("keyword classification failed ({e}), defaulting to unknown");
            KeywordKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("米開朗軌道", 3), "米開朗");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn keyword_kind_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&KeywordKind::Series).unwrap(),
            "\"series\""
        );
        assert_eq!(
            serde_json::to_string(&KeywordKind::Unknown).unwrap(),
            "\"unknown\""
        );
    }
}
