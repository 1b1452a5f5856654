use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use lume_intent::classifier::build_prompt;
use lume_intent::{
    Clock, ClassifierConfig, FixedClock, HttpLlmClient, IntentClassifier, IntentReconciler,
    SystemClock, TemporalExtractor,
};

#[derive(Debug, Parser)]
#[command(name = "lume", version, about = "Interpret Portuguese finance/task messages")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logs on stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a message and print the structured intent
    Interpret(InterpretArgs),
    /// Run only the temporal extractor
    Extract(ExtractArgs),
    /// Print the instruction that would be sent to the classifier
    Prompt(MessageArgs),
}

#[derive(Debug, Args)]
struct MessageArgs {
    #[arg(value_name = "MESSAGE", required = true)]
    message: Vec<String>,
}

#[derive(Debug, Args)]
struct InterpretArgs {
    #[command(flatten)]
    input: MessageArgs,

    /// JSON config file (env vars still override it)
    #[arg(long, env = "LUME_CONFIG")]
    config: Option<PathBuf>,

    /// Reference instant, e.g. 2025-06-10T09:00
    #[arg(long, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[command(flatten)]
    input: MessageArgs,

    /// Return no date when the message has no date signal
    #[arg(long)]
    strict: bool,

    #[arg(long, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
}

fn parse_now(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM ({})", e))
}

impl MessageArgs {
    fn text(&self) -> String {
        self.message.join(" ")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Interpret(args) => run_interpret(args).await,
        Command::Extract(args) => run_extract(args),
        Command::Prompt(args) => run_prompt(args),
    }
}

fn init_logging(verbose: bool) {
    let fallback_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ClassifierConfig> {
    match path {
        Some(path) => ClassifierConfig::load_from_file(path),
        None => ClassifierConfig::from_env().context("Invalid classifier environment"),
    }
}

async fn run_interpret(args: InterpretArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    if config.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; the classifier call will likely fail");
    }

    let client = HttpLlmClient::new(&config).context("Failed to build HTTP client")?;
    let mut reconciler = IntentReconciler::new(IntentClassifier::new(client, &config));
    if let Some(now) = args.now {
        reconciler = reconciler.with_clock(Arc::new(FixedClock(now)));
    }

    let intent = reconciler.interpret(&args.input.text()).await;
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let extractor = if args.strict {
        TemporalExtractor::strict()
    } else {
        TemporalExtractor::new()
    };
    let now = args
        .now
        .unwrap_or_else(|| SystemClock.now());

    let candidate = extractor.extract(&args.input.text(), now);
    println!("{}", serde_json::to_string_pretty(&candidate)?);
    Ok(())
}

fn run_prompt(args: MessageArgs) -> Result<()> {
    let config = ClassifierConfig::from_env().context("Invalid classifier environment")?;
    println!("{}", build_prompt(&args.text(), &config.known_categories));
    Ok(())
}
