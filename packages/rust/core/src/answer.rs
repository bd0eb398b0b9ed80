//! Answer step: turn the query result into a natural-language reply.

use csvagent_llm::{GenerateRequest, LanguageModel};
use csvagent_shared::RunConfig;
use tracing::{instrument, warn};

use crate::prompts;

/// Everything the answer step looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerContext<'a> {
    pub question: &'a str,
    pub sql: Option<&'a str>,
    pub result_text: Option<&'a str>,
    /// Message of the first step that failed, if any.
    pub error: Option<&'a str>,
}

/// Final answer for the user. Never fails; problems become the answer text.
#[instrument(skip_all)]
pub async fn generate_answer(
    model: &dyn LanguageModel,
    ctx: AnswerContext<'_>,
    settings: &RunConfig,
) -> String {
    if let Some(error) = ctx.error {
        return format!("An error occurred: {error}");
    }

    let Some(result_text) = ctx.result_text.filter(|t| !t.trim().is_empty()) else {
        return "Could not process the query.".to_string();
    };

    let prompt = prompts::build_answer_prompt(
        ctx.question,
        ctx.sql.unwrap_or("N/A"),
        result_text,
        &settings.answer_language,
    );
    let request = GenerateRequest::new(prompt, settings.answer_temperature)
        .with_thinking_budget(settings.thinking_budget);

    match model.generate(&request).await {
        Ok(generation) => generation.text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "answer generation failed");
            format!("Error generating final answer: {}", e.detail())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use csvagent_shared::AppConfig;

    fn settings() -> RunConfig {
        RunConfig::from(&AppConfig::default())
    }

    #[tokio::test]
    async fn earlier_error_skips_model() {
        let model = ScriptedModel::new(["unused"]);
        let ctx = AnswerContext {
            question: "q",
            error: Some("no CSV files found in /tmp/x"),
            ..AnswerContext::default()
        };
        let answer = generate_answer(&model, ctx, &settings()).await;
        assert_eq!(answer, "An error occurred: no CSV files found in /tmp/x");
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_result_is_reported() {
        let model = ScriptedModel::new(["unused"]);
        let ctx = AnswerContext {
            question: "q",
            result_text: Some("  "),
            ..AnswerContext::default()
        };
        assert_eq!(
            generate_answer(&model, ctx, &settings()).await,
            "Could not process the query."
        );
    }

    #[tokio::test]
    async fn summarizes_result_with_answer_temperature() {
        let model = ScriptedModel::new(["  Foram emitidas 3 notas.\n"]);
        let ctx = AnswerContext {
            question: "Quantas notas?",
            sql: Some("SELECT COUNT(*) FROM fiscal_data"),
            result_text: Some("COUNT(*)\n       3"),
            error: None,
        };
        let answer = generate_answer(&model, ctx, &settings()).await;
        assert_eq!(answer, "Foram emitidas 3 notas.");

        let request = &model.requests()[0];
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert!(request.prompt.contains("Brazilian Portuguese"));
        assert!(request.prompt.contains("SELECT COUNT(*) FROM fiscal_data"));
    }

    #[tokio::test]
    async fn model_failure_becomes_answer() {
        let model = ScriptedModel::failing("HTTP 429 Too Many Requests: quota");
        let ctx = AnswerContext {
            question: "q",
            sql: Some("SELECT 1"),
            result_text: Some("1"),
            error: None,
        };
        assert_eq!(
            generate_answer(&model, ctx, &settings()).await,
            "Error generating final answer: HTTP 429 Too Many Requests: quota"
        );
    }
}
