//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use graphqna_core::{CancellationToken, MethodSelector, OrchestratorConfig, ProgressReporter};
use graphqna_engines::build_orchestrator;
use graphqna_shared::{
    AppConfig, AttemptRecord, Category, MethodId, OrchestrationResult, Outcome, QueryOptions,
    Question, RetrievalPlan, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// GraphQnA: hybrid retrieval question answering.
#[derive(Parser)]
#[command(
    name = "graphqna",
    version,
    about = "Answer questions by routing them across vector and graph retrieval engines.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.graphqna/graphqna.toml).
    #[arg(long, global = true, env = "GRAPHQNA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a question (or every line of a file).
    Ask {
        /// The question to answer.
        question: Option<String>,

        /// Force a retrieval method (vector, graph_enhanced, knowledge_graph,
        /// schema_guided_kg, or hybrid for automatic routing).
        #[arg(short, long)]
        method: Option<String>,

        /// Number of results engines should retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the supporting context.
        #[arg(long)]
        context: bool,

        /// Print every attempt made.
        #[arg(long)]
        trace: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,

        /// Read questions from a file, one per line.
        #[arg(short, long, conflicts_with = "question")]
        file: Option<PathBuf>,

        /// Write results (with traces) to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show enabled methods and the category → plan table.
    Methods,

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

/// Options shared by every question in one `ask` invocation.
struct AskArgs {
    method: Option<String>,
    top_k: Option<usize>,
    context: bool,
    trace: bool,
    json: bool,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "graphqna=info",
        1 => "graphqna=debug",
        _ => "graphqna=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config;
    match cli.command {
        Command::Ask {
            question,
            method,
            top_k,
            context,
            trace,
            json,
            file,
            output,
        } => {
            let args = AskArgs {
                method,
                top_k,
                context,
                trace,
                json,
            };
            cmd_ask(
                config_path.as_deref(),
                question,
                file.as_deref(),
                output.as_deref(),
                &args,
            )
            .await
        }
        Command::Methods => cmd_methods(config_path.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Non-empty, non-comment lines of a question file.
fn parse_questions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

async fn cmd_ask(
    config_path: Option<&Path>,
    question: Option<String>,
    file: Option<&Path>,
    output: Option<&Path>,
    args: &AskArgs,
) -> Result<()> {
    let questions = match (question, file) {
        (Some(q), _) => vec![q],
        (None, Some(path)) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
            parse_questions(&content)
        }
        (None, None) => return Err(eyre!("provide a question or --file")),
    };
    if questions.is_empty() {
        return Err(eyre!("no questions to ask"));
    }

    let config = resolve_config(config_path)?;
    let orchestrator = build_orchestrator(&config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut results: Vec<OrchestrationResult> = Vec::with_capacity(questions.len());
    for (i, text) in questions.iter().enumerate() {
        let mut question = Question::new(text.as_str()).with_options(QueryOptions {
            top_k: args.top_k,
            include_context: args.context,
        });
        if let Some(method) = &args.method {
            question = question.with_override(method.as_str());
        }

        let result = if args.json {
            orchestrator
                .orchestrate_with_cancel(&question, &cancel)
                .await?
        } else {
            let progress = CliProgress::new(i + 1, questions.len());
            let result = orchestrator
                .orchestrate_with(&question, &cancel, &progress)
                .await;
            progress.finish();
            result?
        };

        if !args.json {
            print_result(&result, args);
        }
        let cancelled = result.is_cancelled();
        results.push(result);
        if cancelled {
            warn!(remaining = questions.len() - i - 1, "cancelled, skipping remaining questions");
            break;
        }
    }

    if args.json {
        let rendered = match results.as_slice() {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        };
        println!("{rendered}");
    }

    if let Some(path) = output {
        let rendered = serde_json::to_string_pretty(&results)?;
        tokio::fs::write(path, rendered)
            .await
            .map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
        info!(path = %path.display(), count = results.len(), "results written");
    }

    Ok(())
}

fn print_result(result: &OrchestrationResult, args: &AskArgs) {
    println!();
    println!("Q: {}", result.question);
    match (result.outcome, result.presentable()) {
        (Outcome::Cancelled, _) => println!("Cancelled."),
        (_, Some(answer)) => println!("{answer}"),
        (_, None) => println!("No answer found."),
    }
    println!();

    let category = result
        .category
        .map(|c| c.to_string())
        .unwrap_or_else(|| "override".into());
    let method = result
        .selected_method
        .map(|m| m.to_string())
        .unwrap_or_else(|| "none".into());
    println!("  Method:   {method}");
    println!("  Category: {category}");
    println!(
        "  Attempts: {} of {}",
        result.attempts.len(),
        result.plan.len()
    );
    println!("  Time:     {:.1}s", result.elapsed_ms as f64 / 1000.0);

    if args.trace {
        println!();
        for (i, attempt) in result.attempts.iter().enumerate() {
            println!("  {}. {}", i + 1, describe_attempt(attempt));
        }
    }

    if args.context {
        let shown = result
            .attempts
            .iter()
            .rev()
            .find(|a| a.answer.is_some() && (a.acceptable || result.selected_method.is_none()));
        if let Some(attempt) = shown {
            println!();
            println!("  Context ({} items):", attempt.context.len());
            for item in &attempt.context {
                let score = item.score.map(|s| format!(" [{s:.2}]")).unwrap_or_default();
                let source = item
                    .source
                    .as_deref()
                    .map(|s| format!(" ({s})"))
                    .unwrap_or_default();
                println!("   -{score} {}{source}", item.content);
            }
        }
    }
}

fn describe_attempt(attempt: &AttemptRecord) -> String {
    let verdict = match attempt.reason {
        None => "accepted".to_string(),
        Some(reason) => format!("rejected ({reason})"),
    };
    let diagnostic = attempt
        .diagnostic
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default();
    format!(
        "{:<18} {verdict} {} ms{diagnostic}",
        attempt.method.as_str(),
        attempt.elapsed_ms
    )
}

// ---------------------------------------------------------------------------
// methods
// ---------------------------------------------------------------------------

fn cmd_methods(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let resolved = OrchestratorConfig::try_from(&config)?;
    let selector = MethodSelector::new(&resolved.plan_overrides, &resolved.enabled_methods)?;

    println!("Methods:");
    for method in MethodId::ALL {
        let state = if resolved.enabled_methods.contains(&method) {
            "enabled"
        } else {
            "disabled"
        };
        let engine = config
            .engines
            .iter()
            .find(|(name, _)| name.parse::<MethodId>().ok() == Some(method))
            .map(|(_, endpoint)| endpoint.url.to_string())
            .unwrap_or_else(|| "no engine configured".into());
        println!("  {:<18} {state:<9} {engine}", method.as_str());
    }

    println!();
    println!("Plans:");
    for (category, plan) in selector.plans() {
        println!("  {:<13} {plan}", category.as_str());
    }

    println!();
    println!("Classifier: {:?}", config.classifier.mode);
    println!(
        "Attempt timeout: {} ms",
        resolved.attempt_timeout.as_millis()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    prefix: String,
}

impl CliProgress {
    fn new(current: usize, total: usize) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));

        let prefix = if total > 1 {
            format!("[{current}/{total}] ")
        } else {
            String::new()
        };
        spinner.set_message(format!("{prefix}Classifying question"));
        Self { spinner, prefix }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn planned(&self, category: Option<Category>, plan: &RetrievalPlan) {
        let category = category.map(|c| c.to_string()).unwrap_or_else(|| "override".into());
        self.spinner
            .set_message(format!("{}{category}: {plan}", self.prefix));
    }

    fn attempt_started(&self, method: MethodId, position: usize, total: usize) {
        self.spinner.set_message(format!(
            "{}Asking {method} [{position}/{total}]",
            self.prefix
        ));
    }

    fn attempt_finished(&self, record: &AttemptRecord) {
        if let Some(reason) = record.reason {
            self.spinner
                .set_message(format!("{}{} rejected ({reason})", self.prefix, record.method));
        }
    }
}
