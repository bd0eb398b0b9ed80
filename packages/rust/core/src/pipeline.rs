//! End-to-end `ask` pipeline: ZIP → CSVs → merged dataset → SQL → answer.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use csvagent_dataset::{Dataset, load_and_merge};
use csvagent_discovery::{InputRequest, prepare_inputs, select_csv_files};
use csvagent_llm::LanguageModel;
use csvagent_shared::{CsvAgentError, Result, RunConfig};
use csvagent_storage::QueryEngine;

use crate::answer::{self, AnswerContext};
use crate::query;

/// Configuration for the `ask` pipeline.
#[derive(Debug, Clone)]
pub struct AskConfig {
    /// Natural-language question about the data.
    pub question: String,
    /// Optional ZIP archive unpacked into `data_dir` before discovery.
    pub zip_path: Option<PathBuf>,
    /// Directory holding (or receiving) the CSV files.
    pub data_dir: Option<PathBuf>,
    pub run: RunConfig,
}

impl AskConfig {
    fn inputs(&self) -> InputRequest {
        InputRequest {
            zip_path: self.zip_path.clone(),
            data_dir: self.data_dir.clone(),
        }
    }
}

/// Outcome of one `ask` run, including whatever intermediate state was reached.
#[derive(Debug, Clone, Serialize)]
pub struct AskResult {
    pub question: String,
    pub model: String,
    pub available_csvs: Vec<PathBuf>,
    pub selected_csvs: Vec<PathBuf>,
    /// `(rows, columns)` of the merged dataset.
    pub dataset_shape: Option<(usize, usize)>,
    pub sql: Option<String>,
    pub result_text: Option<String>,
    /// Message of the step that failed, if one did.
    pub error: Option<String>,
    pub final_answer: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl AskResult {
    fn new(question: &str, model: &str) -> Self {
        Self {
            question: question.to_string(),
            model: model.to_string(),
            available_csvs: Vec::new(),
            selected_csvs: Vec::new(),
            dataset_shape: None,
            sql: None,
            result_text: None,
            error: None,
            final_answer: String::new(),
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }
}

/// Summary of the merged dataset, without any model involvement.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub selected_csvs: Vec<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    pub schema_text: String,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &AskResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &AskResult) {}
}

/// Run the full `ask` pipeline.
///
/// 1. Unpack the archive and list CSVs
/// 2. Select CSVs
/// 3. Load and merge on the key column
/// 4. Generate, check and execute SQL
/// 5. Summarize the result
///
/// The first failing step skips the remaining ones up to the answer, which
/// then reports that failure. Only a blank question is returned as `Err`.
#[instrument(skip_all, fields(model = model.model_id()))]
pub async fn ask(
    config: &AskConfig,
    model: &dyn LanguageModel,
    progress: &dyn ProgressReporter,
) -> Result<AskResult> {
    let question = config.question.trim();
    if question.is_empty() {
        return Err(CsvAgentError::validation("question must not be empty"));
    }

    let start = Instant::now();
    let mut result = AskResult::new(question, model.model_id());
    info!(%question, "starting ask pipeline");

    if let Err(e) = run_steps(config, question, model, progress, &mut result).await {
        warn!(error = %e, "pipeline step failed");
        result.error = Some(e.detail());
    }

    progress.phase("Writing answer");
    let ctx = AnswerContext {
        question,
        sql: result.sql.as_deref(),
        result_text: result.result_text.as_deref(),
        error: result.error.as_deref(),
    };
    result.final_answer = answer::generate_answer(model, ctx, &config.run).await;

    result.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        elapsed_ms = result.elapsed_ms,
        failed = result.error.is_some(),
        "ask pipeline complete"
    );
    progress.done(&result);
    Ok(result)
}

/// Steps 1 to 4, recording state into `result` as they succeed.
async fn run_steps(
    config: &AskConfig,
    question: &str,
    model: &dyn LanguageModel,
    progress: &dyn ProgressReporter,
    result: &mut AskResult,
) -> Result<()> {
    progress.phase("Preparing input files");
    result.available_csvs = prepare_inputs(&config.inputs())?;

    progress.phase("Selecting CSV files");
    result.selected_csvs = select_csv_files(&result.available_csvs)?;

    progress.phase("Loading and merging data");
    let dataset = load_and_merge(&result.selected_csvs, &config.run.merge_key)?;
    result.dataset_shape = Some(dataset.shape());

    progress.phase("Generating and running SQL");
    let mut engine = QueryEngine::open_in_memory().await?;
    let outcome =
        query::run_query_step(model, &mut engine, Some(&dataset), question, &config.run).await?;

    result.sql = Some(outcome.sql);
    result.result_text = Some(outcome.result_text);
    Ok(())
}

/// Steps 1 to 3 only: the merged dataset's schema and shape.
#[instrument(skip_all)]
pub fn describe(inputs: &InputRequest, run: &RunConfig) -> Result<DatasetSummary> {
    let available = prepare_inputs(inputs)?;
    let selected = select_csv_files(&available)?;
    let dataset: Dataset = load_and_merge(&selected, &run.merge_key)?;
    let (rows, columns) = dataset.shape();

    Ok(DatasetSummary {
        selected_csvs: selected,
        rows,
        columns,
        schema_text: dataset.schema_text(),
    })
}
