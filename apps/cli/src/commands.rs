//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use csvagent_core::{AskConfig, AskResult, InputRequest, ProgressReporter};
use csvagent_llm::{GeminiClient, GeminiConfig};
use csvagent_shared::{
    AppConfig, RunConfig, RunId, expand_home, init_config, load_config, resolve_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Width of the rules framing printed answers.
const RULE_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// csvagent: ask questions about fiscal CSV exports.
#[derive(Parser)]
#[command(
    name = "csvagent",
    version,
    about = "Answer natural-language questions about ZIP archives of CSV files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the CSV files come from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub(crate) struct InputArgs {
    /// ZIP archive of CSV files.
    #[arg(long)]
    pub zip: Option<PathBuf>,

    /// Directory of CSV files (the ZIP, if given, is extracted here).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a question about the data.
    Ask {
        /// The question. Read from stdin when omitted.
        question: Option<String>,

        #[command(flatten)]
        input: InputArgs,

        /// Column the files are joined on (defaults to the configured key).
        #[arg(long)]
        merge_key: Option<String>,

        /// Model to use instead of the configured one.
        #[arg(long)]
        model: Option<String>,

        /// Keep the extraction directory after the run.
        #[arg(long)]
        keep_extracted: bool,

        /// Print the full run result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the merged dataset's schema without calling the model.
    Schema {
        #[command(flatten)]
        input: InputArgs,

        /// Column the files are joined on (defaults to the configured key).
        #[arg(long)]
        merge_key: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Load variables from a `.env` file in the working directory or a parent.
///
/// Variables already set in the process environment win.
pub(crate) fn load_env_file() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "csvagent=info",
        1 => "csvagent=debug",
        _ => "csvagent=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask {
            question,
            input,
            merge_key,
            model,
            keep_extracted,
            json,
        } => cmd_ask(question, &input, merge_key.as_deref(), model, keep_extracted, json).await,
        Command::Schema { input, merge_key } => cmd_schema(&input, merge_key.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Input workspace
// ---------------------------------------------------------------------------

/// Resolved input locations for one run.
struct RunInputs {
    request: InputRequest,
    /// Per-run extraction directory to remove afterwards, if one was created.
    scratch: Option<PathBuf>,
}

impl RunInputs {
    fn resolve(input: &InputArgs, config: &AppConfig) -> Result<Self> {
        if let Some(zip) = &input.zip {
            if !zip.is_file() {
                return Err(eyre!("ZIP file not found: {}", zip.display()));
            }
        }

        if let Some(dir) = &input.dir {
            return Ok(Self {
                request: InputRequest {
                    zip_path: input.zip.clone(),
                    data_dir: Some(dir.clone()),
                },
                scratch: None,
            });
        }

        let run_id = RunId::new();
        let dir = expand_home(&config.defaults.work_dir).join(run_id.dir_name());
        std::fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("cannot create work directory {}", dir.display()))?;
        info!(%run_id, dir = %dir.display(), "created run directory");

        Ok(Self {
            request: InputRequest {
                zip_path: input.zip.clone(),
                data_dir: Some(dir.clone()),
            },
            scratch: Some(dir),
        })
    }

    /// Remove the extraction directory unless asked to keep it.
    fn cleanup(self, keep: bool) {
        let Some(dir) = self.scratch else {
            return;
        };
        if keep {
            eprintln!("Extracted files kept at: {}", dir.display());
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "failed to remove run directory");
        }
    }
}

fn run_config(merge_key: Option<&str>, config: &AppConfig) -> RunConfig {
    let mut run = RunConfig::from(config);
    if let Some(key) = merge_key {
        run.merge_key = key.to_string();
    }
    run
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(
    question: Option<String>,
    input: &InputArgs,
    merge_key: Option<&str>,
    model: Option<String>,
    keep_extracted: bool,
    json: bool,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(model) = model {
        config.llm.model = model;
    }

    // Validate the key and the question before touching any files
    let api_key = resolve_api_key(&config)?;
    let question = match question {
        Some(q) => q,
        None => read_question()?,
    };
    if question.trim().is_empty() {
        return Err(eyre!("question must not be empty"));
    }

    let client = GeminiClient::new(GeminiConfig::from_llm_config(&config.llm, api_key))?;
    let inputs = RunInputs::resolve(input, &config)?;

    let ask_config = AskConfig {
        question,
        zip_path: inputs.request.zip_path.clone(),
        data_dir: inputs.request.data_dir.clone(),
        run: run_config(merge_key, &config),
    };

    info!(model = %config.llm.model, "asking question");

    let reporter = CliProgress::new();
    let outcome = csvagent_core::ask(&ask_config, &client, &reporter).await;
    reporter.spinner.finish_and_clear();

    inputs.cleanup(keep_extracted || config.defaults.keep_extracted);
    let result = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_answer(&result);
    }
    Ok(())
}

async fn cmd_schema(input: &InputArgs, merge_key: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let inputs = RunInputs::resolve(input, &config)?;
    let run = run_config(merge_key, &config);

    let summary = csvagent_core::describe(&inputs.request, &run);
    inputs.cleanup(config.defaults.keep_extracted);
    let summary = summary?;

    println!();
    println!("  Files:   {}", summary.selected_csvs.len());
    for path in &summary.selected_csvs {
        println!("           {}", path.display());
    }
    println!("  Shape:   {} rows x {} columns", summary.rows, summary.columns);
    println!("  Key:     {}", run.merge_key);
    println!();
    for line in summary.schema_text.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn read_question() -> Result<String> {
    eprint!("Question: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_answer(result: &AskResult) {
    let rule = "=".repeat(RULE_WIDTH);
    println!();
    if let Some(sql) = &result.sql {
        println!("Executed SQL:");
        println!("{sql}");
        println!("{rule}");
    }
    println!("{}", result.final_answer);
    println!("{rule}");
    println!(
        "  {} file(s), {:.1}s",
        result.selected_csvs.len(),
        result.elapsed_ms as f64 / 1000.0
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &AskResult) {
        self.spinner.finish_and_clear();
    }
}
