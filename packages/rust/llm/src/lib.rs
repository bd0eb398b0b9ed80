//! Hosted language-model access.
//!
//! The pipeline talks to a model only through [`LanguageModel`], so the
//! query and answer steps can run against the Gemini REST API in production
//! and against scripted models in tests.

mod gemini;

use async_trait::async_trait;
use csvagent_shared::Result;
use serde::Serialize;

pub use gemini::{GeminiClient, GeminiConfig};

/// One prompt to send to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub temperature: f32,
    /// Reasoning tokens the model may spend; 0 disables thinking.
    pub thinking_budget: u32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            thinking_budget: 0,
        }
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }
}

/// Model output plus usage accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Generation {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
}

/// A text-generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier of the underlying model, for logs and results.
    fn model_id(&self) -> &str;

    /// Generate a completion for a single prompt.
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation>;
}
