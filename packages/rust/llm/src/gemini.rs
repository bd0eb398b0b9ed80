//! Gemini `generateContent` REST client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use csvagent_shared::{CsvAgentError, LlmConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{GenerateRequest, Generation, LanguageModel};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("csvagent/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Client settings from the `[llm]` config section and a resolved key.
    pub fn from_llm_config(llm: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: llm.model.clone(),
            base_url: llm.base_url.clone(),
            timeout_secs: llm.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<PartIn>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartIn {
    text: Option<String>,
    thought: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: u64,
    candidates_token_count: u64,
}

impl GenerateContentResponse {
    /// Text of the first candidate, thought parts excluded.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .or_else(|| {
                self.candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                    .filter(|r| *r != "STOP")
            })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`LanguageModel`] backed by the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CsvAgentError::config("model API key is empty"));
        }

        let endpoint = endpoint_url(&config.base_url, &config.model)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CsvAgentError::Model(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

/// `{base}/v1beta/models/{model}:generateContent`
fn endpoint_url(base_url: &str, model: &str) -> Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base)
        .map_err(|e| CsvAgentError::config(format!("invalid model base URL '{base_url}': {e}")))?;
    base.join(&format!("v1beta/models/{model}:generateContent"))
        .map_err(|e| CsvAgentError::config(format!("invalid model name '{model}': {e}")))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, temperature = request.temperature))]
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let body = GenerateContentBody {
            contents: vec![Content {
                parts: vec![PartOut {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                thinking_config: ThinkingConfig {
                    thinking_budget: request.thinking_budget,
                },
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CsvAgentError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "model request rejected");
            return Err(CsvAgentError::Model(format!(
                "HTTP {status}: {}",
                truncate(text.trim())
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CsvAgentError::Model(format!("unexpected response body: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let Some(text) = parsed.text() else {
            let reason = parsed.block_reason().unwrap_or("no candidates");
            return Err(CsvAgentError::Model(format!(
                "model returned no text (reason: {reason})"
            )));
        };

        let usage = parsed.usage_metadata.unwrap_or_default();
        debug!(
            tokens_in = usage.prompt_token_count,
            tokens_out = usage.candidates_token_count,
            latency_ms,
            "generation complete"
        );

        Ok(Generation {
            text,
            tokens_in: usage.prompt_token_count,
            tokens_out: usage.candidates_token_count,
            latency_ms,
        })
    }
}
