//! Query step: question to SQL, guardrails, execution.

use std::sync::LazyLock;

use csvagent_dataset::Dataset;
use csvagent_llm::{GenerateRequest, LanguageModel};
use csvagent_shared::{CsvAgentError, Result, RunConfig};
use csvagent_storage::{QueryEngine, ResultTable};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::prompts::{self, SQL_DIALECT};

/// Markdown code fences, with or without a language tag.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[a-z]*").expect("valid fence pattern"));

/// What the query step produced.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// The statement that was executed, after cleaning.
    pub sql: String,
    pub result: ResultTable,
    /// `result` rendered for the answer prompt.
    pub result_text: String,
}

/// Strip whitespace, code fences and one trailing `;` from a model reply.
pub fn clean_model_sql(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw.trim(), "");
    let trimmed = unfenced.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    trimmed.trim_end().to_string()
}

/// Accept only a single read statement starting with `SELECT` or `WITH`.
pub fn validate_sql(sql: &str) -> Result<()> {
    let upper = sql.trim().to_uppercase();
    if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
        return Err(CsvAgentError::Query(format!(
            "the model could not generate a valid SQL query for your question. Response received: '{sql}'"
        )));
    }
    if has_trailing_statement(sql) {
        return Err(CsvAgentError::Query(format!(
            "only a single SQL statement is allowed. Response received: '{sql}'"
        )));
    }
    Ok(())
}

/// True when a `;` outside quotes and comments is followed by more SQL.
///
/// Trailing `--` and `/* */` comments after the terminator are fine.
fn has_trailing_statement(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut terminated = false;

    while let Some(ch) = chars.next() {
        match ch {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ if ch.is_whitespace() => {}
            _ if terminated => return true,
            ';' => terminated = true,
            '\'' | '"' | '`' => {
                for c in chars.by_ref() {
                    if c == ch {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

/// Query step.
///
/// Loads `dataset` into `engine` when it holds no table yet, asks the model
/// for SQL, checks it, runs it, and renders the result. Guardrail rejections
/// are returned as is; model and engine failures are wrapped.
#[instrument(skip_all, fields(table = %settings.table_name))]
pub async fn run_query_step(
    model: &dyn LanguageModel,
    engine: &mut QueryEngine,
    dataset: Option<&Dataset>,
    question: &str,
    settings: &RunConfig,
) -> Result<QueryOutcome> {
    let Some(dataset) = dataset else {
        return Err(CsvAgentError::Query(
            "dataset or model client not available for querying".into(),
        ));
    };

    let wrap = |e: CsvAgentError| {
        CsvAgentError::Query(format!(
            "error generating or executing the query: {}",
            e.detail()
        ))
    };

    if engine.table_name().is_none() {
        engine
            .load_dataset(&settings.table_name, dataset)
            .await
            .map_err(wrap)?;
    }

    let prompt = prompts::build_query_prompt(
        question,
        &settings.table_name,
        &dataset.schema_text(),
        SQL_DIALECT,
    );
    let request = GenerateRequest::new(prompt, settings.query_temperature)
        .with_thinking_budget(settings.thinking_budget);

    let generation = model.generate(&request).await.map_err(wrap)?;
    let sql = clean_model_sql(&generation.text);
    info!(model = model.model_id(), %sql, "SQL generated");

    validate_sql(&sql).inspect_err(|_| warn!("model reply is not a usable query"))?;

    let result = engine.query(&sql).await.map_err(|e| {
        warn!(%sql, error = %e, "generated SQL failed");
        wrap(e)
    })?;

    let result_text = result.to_text(settings.max_result_rows);
    debug!(rows = result.row_count(), "query result ready");

    Ok(QueryOutcome {
        sql,
        result,
        result_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use csvagent_shared::AppConfig;
    use csvagent_storage::CellValue;

    fn settings() -> RunConfig {
        RunConfig::from(&AppConfig::default())
    }

    fn notes() -> Dataset {
        Dataset::from_rows(
            vec!["CHAVE DE ACESSO".into(), "UF EMITENTE".into(), "VALOR NOTA FISCAL".into()],
            vec![
                vec![Some("k1".into()), Some("PR".into()), Some("100.5".into())],
                vec![Some("k2".into()), Some("MS".into()), Some("50".into())],
                vec![Some("k3".into()), Some("PR".into()), Some("20".into())],
            ],
        )
    }

    #[test]
    fn cleans_fences_and_semicolon() {
        assert_eq!(
            clean_model_sql("```sql\nSELECT COUNT(*) FROM fiscal_data;\n```\n"),
            "SELECT COUNT(*) FROM fiscal_data"
        );
        assert_eq!(clean_model_sql("  SELECT 1  "), "SELECT 1");
        assert_eq!(clean_model_sql("```SQL\nSELECT 2\n```"), "SELECT 2");
        assert_eq!(clean_model_sql("```sqlite\nSELECT 1\n```"), "SELECT 1");
        assert!(validate_sql(&clean_model_sql("```sqlite\nSELECT 1;\n```")).is_ok());
        assert_eq!(clean_model_sql("SELECT 1;;"), "SELECT 1;");
    }

    #[test]
    fn validation_accepts_select_and_with() {
        assert!(validate_sql("select 1").is_ok());
        assert!(validate_sql("WITH t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(validate_sql("SELECT 'a;b' AS x").is_ok());
    }

    #[test]
    fn comments_do_not_count_as_statements() {
        assert!(validate_sql(&clean_model_sql("SELECT 1;\n-- total per state")).is_ok());
        assert!(validate_sql("SELECT 1; /* done */").is_ok());
        assert!(validate_sql("SELECT 1 -- a; b\nFROM fiscal_data").is_ok());
        assert!(validate_sql("SELECT 1 /* ; */ + 1").is_ok());

        assert!(validate_sql("SELECT 1; /* x */ DELETE FROM fiscal_data").is_err());
        assert!(validate_sql("SELECT 1; -- x\nDELETE FROM fiscal_data").is_err());
    }

    #[test]
    fn validation_rejects_error_reply_and_writes() {
        let err = validate_sql("ERROR").unwrap_err();
        assert_eq!(
            err.detail(),
            "the model could not generate a valid SQL query for your question. Response received: 'ERROR'"
        );
        assert!(validate_sql("DROP TABLE fiscal_data").is_err());
        assert!(validate_sql("SELECT 1; DELETE FROM fiscal_data").is_err());
    }

    #[tokio::test]
    async fn runs_generated_query() {
        let model = ScriptedModel::new([
            "```sql\nSELECT \"UF EMITENTE\", SUM(\"VALOR NOTA FISCAL\") AS total FROM fiscal_data GROUP BY 1 ORDER BY total DESC;\n```",
        ]);
        let mut engine = QueryEngine::open_in_memory().await.unwrap();
        let dataset = notes();

        let outcome = run_query_step(&model, &mut engine, Some(&dataset), "total por UF?", &settings())
            .await
            .unwrap();

        assert!(outcome.sql.starts_with("SELECT \"UF EMITENTE\""));
        assert!(!outcome.sql.ends_with(';'));
        assert_eq!(outcome.result.rows[0][1], CellValue::Real(120.5));
        assert!(outcome.result_text.starts_with("UF EMITENTE  total"));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.0);
        assert!(requests[0].prompt.contains("total por UF?"));
        assert!(requests[0].prompt.contains("VALOR NOTA FISCAL    float64"));
    }

    #[tokio::test]
    async fn missing_dataset_is_reported() {
        let model = ScriptedModel::new(Vec::<&str>::new());
        let mut engine = QueryEngine::open_in_memory().await.unwrap();
        let err = run_query_step(&model, &mut engine, None, "q", &settings())
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "dataset or model client not available for querying");
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn error_reply_is_not_executed() {
        let model = ScriptedModel::new(["ERROR"]);
        let mut engine = QueryEngine::open_in_memory().await.unwrap();
        let err = run_query_step(&model, &mut engine, Some(&notes()), "q", &settings())
            .await
            .unwrap_err();
        assert!(err.detail().starts_with("the model could not generate a valid SQL query"));
    }

    #[tokio::test]
    async fn engine_failure_is_wrapped() {
        let model = ScriptedModel::new(["SELECT missing_column FROM fiscal_data"]);
        let mut engine = QueryEngine::open_in_memory().await.unwrap();
        let err = run_query_step(&model, &mut engine, Some(&notes()), "q", &settings())
            .await
            .unwrap_err();
        assert!(err.detail().starts_with("error generating or executing the query: "));
        assert!(err.detail().contains("missing_column"));
    }

    #[tokio::test]
    async fn model_failure_is_wrapped() {
        let model = ScriptedModel::failing("HTTP 503 Service Unavailable: overloaded");
        let mut engine = QueryEngine::open_in_memory().await.unwrap();
        let err = run_query_step(&model, &mut engine, Some(&notes()), "q", &settings())
            .await
            .unwrap_err();
        assert_eq!(
            err.detail(),
            "error generating or executing the query: HTTP 503 Service Unavailable: overloaded"
        );
    }
}
