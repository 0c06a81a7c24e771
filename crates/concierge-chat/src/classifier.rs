//! Intent classification.
//!
//! Asks the text generator for a JSON label drawn from the closed
//! [`IntentLabel`] set and validates the answer. Any failure (timeout,
//! transport error, unparseable or out-of-set output) collapses to the
//! deterministic `other` fallback.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use concierge_core::capability::TextGenerator;
use concierge_core::config::{ConciergeConfig, PersonaConfig};
use concierge_core::error::CapabilityError;
use concierge_core::types::{
    ClassificationResult, CompletionRequest, IntentLabel, PromptMessage, ResponseFormat, Role,
    Turn,
};

use crate::deadline::with_deadline;
use crate::prompts;

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("Invalid code fence regex")
});

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Parse and validate raw classifier output.
///
/// Accepts a bare JSON object, optionally wrapped in a markdown code fence.
/// The label is matched leniently (case, surrounding whitespace, `-` or
/// space instead of `_`) but must belong to the label set.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, CapabilityError> {
    let body = match CODE_FENCE_RE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => raw.trim(),
    };
    if body.is_empty() {
        return Err(CapabilityError::Malformed("empty classifier output".into()));
    }

    let parsed: RawClassification = serde_json::from_str(body)
        .map_err(|e| CapabilityError::Malformed(format!("classifier output is not valid JSON: {}", e)))?;

    let intent: IntentLabel = parsed
        .intent
        .parse()
        .map_err(|e| CapabilityError::Malformed(format!("{}", e)))?;

    if let Some(confidence) = parsed.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CapabilityError::Malformed(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
    }

    Ok(ClassificationResult {
        intent,
        confidence: parsed.confidence,
        rationale: parsed
            .rationale
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        fallback: false,
    })
}

/// Maps a message plus recent history to exactly one intent label.
pub struct IntentClassifier {
    generator: Arc<dyn TextGenerator>,
    model: String,
    window: usize,
    timeout: Duration,
    persona: PersonaConfig,
}

impl IntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &ConciergeConfig) -> Self {
        Self {
            generator,
            model: config.models.classifier.clone(),
            window: config.conversation.classifier_window,
            timeout: config.timeouts.classify(),
            persona: config.persona.clone(),
        }
    }

    /// Classify `query`. Never fails: errors yield [`ClassificationResult::fallback`].
    pub async fn classify(&self, query: &str, history: &[Turn]) -> ClassificationResult {
        match self.try_classify(query, history).await {
            Ok(result) => {
                debug!(
                    intent = %result.intent,
                    confidence = ?result.confidence,
                    "Message classified"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "Classification failed, falling back to 'other'");
                ClassificationResult::fallback()
            }
        }
    }

    /// Classify without the fallback, surfacing the underlying error.
    pub async fn try_classify(
        &self,
        query: &str,
        history: &[Turn],
    ) -> Result<ClassificationResult, CapabilityError> {
        let request = self.build_request(query, history);
        let raw = with_deadline("classifier", self.timeout, self.generator.complete(&request)).await?;
        parse_classification(&raw)
    }

    /// Build the completion request for `query`.
    pub fn build_request(&self, query: &str, history: &[Turn]) -> CompletionRequest {
        let start = history.len().saturating_sub(self.window);
        CompletionRequest {
            model: self.model.clone(),
            system_prompt: prompts::classification_prompt(&self.persona, &history[start..]),
            messages: vec![PromptMessage {
                role: Role::User,
                content: query.to_string(),
            }],
            temperature: 0.0,
            response_format: ResponseFormat::JsonSchema {
                name: "intent_classification".to_string(),
                schema: prompts::classification_schema(),
            },
        }
    }
}
