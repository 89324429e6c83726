//! LLM advisory pass
//!
//! The advisor is a suggestion channel, never an oracle: it runs only after
//! a deterministic resolution exists, may rewrite the reasoning and top up
//! the sources, and its confidence is averaged in. A differing resolution
//! is recorded as an error and ignored.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use arbiter_core::{ArbiterError, ResolutionResult, MAX_SOURCES};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// What the advisor may hand back. Every field is optional; absent fields
/// leave the deterministic result untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorReview {
    pub reasoning: Option<String>,
    pub sources: Option<Vec<String>>,
    pub confidence: Option<f64>,
    pub resolution: Option<String>,
}

/// Everything the advisor is shown.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorContext {
    pub query: String,
    pub request: serde_json::Value,
    pub accepted_group_key: Option<String>,
    pub resolution: String,
    pub confidence: f64,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Advisor {
    client: Client<OpenAIConfig>,
    model: String,
}

impl Advisor {
    /// Build from the environment; `None` when no `OPENAI_API_KEY` is set,
    /// which disables the advisory pass entirely.
    pub fn from_env() -> Option<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return None;
        }
        Some(Self {
            client: Client::with_config(OpenAIConfig::default()),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Ask the model to re-summarize the deterministic resolution. Returns
    /// the parsed review and the raw model output for the evidence payload.
    #[instrument(skip(self, context))]
    pub async fn review(
        &self,
        context: &AdvisorContext,
    ) -> Result<(AdvisorReview, String), ArbiterError> {
        let system_prompt = r#"You are a settlement auditor for sports prediction markets. You receive a deterministic resolution computed from multiple data providers, and you summarize the reasoning for a human reviewer.

You may polish the reasoning and suggest additional sources, and you may give your own confidence estimate. You do NOT decide the outcome; the resolution was already computed.

Respond with valid JSON in this exact format:
{
  "reasoning": "One short paragraph explaining the resolution",
  "sources": ["provider or url", "..."],
  "confidence": 0.0,
  "resolution": "Echo the resolution you believe is correct"
}"#;

        let user_prompt = format!(
            r#"## Query
{}

## Structured request
{}

## Deterministic resolution
resolution: {}
confidence: {:.2}
accepted group: {}
supporting providers: {}"#,
            context.query,
            context.request,
            context.resolution,
            context.confidence,
            context.accepted_group_key.as_deref().unwrap_or("-"),
            context.providers.join(", "),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| ArbiterError::internal(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| ArbiterError::internal(e.to_string()))?
                    .into(),
            ])
            .temperature(0.2)
            .build()
            .map_err(|e| ArbiterError::internal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ArbiterError::api(format!("OpenAI API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ArbiterError::parse("No response from model"))?;

        let json_str = extract_json(&content)?;
        let review: AdvisorReview = serde_json::from_str(&json_str)
            .map_err(|e| ArbiterError::parse(format!("Failed to parse advisor review: {}", e)))?;

        Ok((review, content))
    }
}

/// Extract a JSON object from model output, stripping markdown code fences
/// when present.
pub fn extract_json(content: &str) -> Result<String, ArbiterError> {
    let trimmed = content.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return Ok(after[..end].trim().to_string());
        }
    }

    let start = trimmed
        .find('{')
        .ok_or_else(|| ArbiterError::parse("No JSON object in model output"))?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| ArbiterError::parse("Unterminated JSON object in model output"))?;
    Ok(trimmed[start..=end].to_string())
}

/// Merge an advisor review into the deterministic result.
///
/// `reasoning` replaces, `sources` union (capped), `confidence` averages; a
/// differing `resolution` is logged as an error and never applied.
pub fn merge_review(result: &mut ResolutionResult, review: AdvisorReview, raw: String) {
    if let Some(reasoning) = review.reasoning {
        result.evidence.data.model_summary = Some(reasoning.clone());
        result.reasoning = reasoning;
    }

    if let Some(sources) = review.sources {
        for source in sources {
            if result.sources.len() >= MAX_SOURCES {
                break;
            }
            if !result.sources.contains(&source) {
                result.sources.push(source);
            }
        }
    }

    if let Some(confidence) = review.confidence {
        let averaged = (result.confidence + confidence) / 2.0;
        result.confidence = averaged.clamp(0.0, 1.0);
    }

    if let Some(resolution) = review.resolution {
        if resolution != result.resolution {
            debug!(
                "advisor disagreed: {} vs deterministic {}",
                resolution, result.resolution
            );
            result.evidence.errors.push(format!(
                "LLMMismatch: advisor proposed '{}', deterministic resolution '{}' kept",
                resolution, result.resolution
            ));
        }
    }

    result.evidence.model_output_raw = Some(raw);
}
