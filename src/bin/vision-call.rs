//! CLI binary for vision-structured.
//!
//! A thin shim over the library crate for ad-hoc scripts: maps CLI flags to
//! `CallerConfig` + `CallRequest`, runs one call and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use vision_structured::{
    CallRequest, CallerConfig, ImageFormat, OutputSchema, RequestImage, StructuredVisionCaller,
    UsageMetadata, UsageSink, DEFAULT_MODEL,
};

// ── ANSI colour helpers ─────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a table from a page crop via Bedrock (default profile/region)
  vision-call --schema table.json --image page-3.png \
    --prompt "Transcribe the table on this page"

  # Use a named AWS profile and region, allow 2 retries, 60 s per attempt
  vision-call --schema table.json --image crop.png --prompt "..." \
    --profile research --region us-west-2 --max-retries 2 --timeout 60

  # Go through OpenAI instead of Bedrock
  vision-call --transport provider --provider openai --model gpt-4.1-mini \
    --schema summary.json --image figure.jpg --prompt "Summarise the figure"

SCHEMA FILE:
  {
    "name": "TableCorrection",
    "fields": [
      {"name": "corrected_html", "type": "string"},
      {"name": "confidence", "type": "number", "required": false},
      {"name": "notes", "type": {"array": "string"}}
    ]
  }

ENVIRONMENT:
  VISION_MODEL_ID     Model identifier (default: Claude 3.7 Sonnet on Bedrock)
  AWS_PROFILE         Credential profile for the bedrock transport
  AWS_REGION          Region for the bedrock transport
  VISION_MAX_TOKENS   Max output tokens per call
  VISION_USE_LLM      Set to false to disable remote calls
  RUST_LOG            Overrides the log filter (e.g. vision_structured=debug)
"#;

#[derive(Parser, Debug)]
#[command(
    name = "vision-call",
    version,
    about = "Ask a vision LLM a question about images and get schema-validated JSON back",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Instruction text sent with the images.
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// Image file (PNG, JPEG, GIF, BMP, WebP or TIFF). Repeatable.
    #[arg(short, long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// JSON file describing the output schema.
    #[arg(short, long, value_name = "PATH")]
    schema: PathBuf,

    /// Extra attempts after the first on transport or schema failures.
    #[arg(long, default_value_t = 0)]
    max_retries: u32,

    /// Per-attempt timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,

    /// Remote endpoint: bedrock (raw invoke) or provider (edgequake-llm chat).
    #[arg(long, value_enum, default_value = "bedrock")]
    transport: TransportArg,

    /// edgequake-llm provider name when --transport provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = "openai")]
    provider: String,

    /// Model identifier.
    #[arg(long, env = "VISION_MODEL_ID", default_value = DEFAULT_MODEL)]
    model: String,

    /// Credential profile (bedrock transport).
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Region (bedrock transport).
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Max output tokens per call.
    #[arg(long, env = "VISION_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Sampling temperature (0.0–1.0).
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Send images as JPEG at this quality instead of PNG.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Do not call the model (the call fails with "disabled").
    #[arg(long)]
    no_llm: bool,

    /// Use-LLM toggle from the environment.
    #[arg(long, env = "VISION_USE_LLM", default_value_t = true, hide = true, action = clap::ArgAction::Set)]
    use_llm: bool,

    /// Disable the spinner and show INFO-level logs instead.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    Bedrock,
    Provider,
}

/// Default log level when `RUST_LOG` is unset.
fn log_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "debug"
    } else if cli.quiet || !cli.no_progress {
        "error"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers the in-flight call, so library INFO logs are
    // suppressed while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.verbose;
    let filter = log_filter(&cli);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request ────────────────────────────────────────────────────
    let schema_text = std::fs::read_to_string(&cli.schema)
        .with_context(|| format!("Failed to read schema file {}", cli.schema.display()))?;
    let schema: OutputSchema = serde_json::from_str(&schema_text)
        .with_context(|| format!("Invalid schema file {}", cli.schema.display()))?;

    let images = cli
        .images
        .iter()
        .map(|p| RequestImage::from_path(p).with_context(|| format!("Failed to load {}", p.display())))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = CallRequest::builder(cli.prompt.clone(), schema)
        .images(images)
        .max_retries(cli.max_retries);
    if let Some(secs) = cli.timeout {
        builder = builder.timeout_secs(secs);
    }
    let request = builder.build().context("Invalid request")?;

    // ── Build caller ─────────────────────────────────────────────────────
    let mut config = CallerConfig::builder()
        .model(cli.model.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .enabled(cli.use_llm && !cli.no_llm);
    if let Some(ref p) = cli.profile {
        config = config.profile(p.clone());
    }
    if let Some(ref r) = cli.region {
        config = config.region(r.clone());
    }
    if let Some(quality) = cli.jpeg_quality {
        config = config.image_format(ImageFormat::Jpeg { quality });
    }
    let config = config.build().context("Invalid configuration")?;

    let caller = match cli.transport {
        TransportArg::Bedrock => StructuredVisionCaller::bedrock(config),
        TransportArg::Provider => StructuredVisionCaller::provider(config, cli.provider.clone()),
    };

    // ── Run call ─────────────────────────────────────────────────────────
    let spinner = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Calling");
        bar.set_message(format!("{} ({})", cli.model, request.schema().name));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let start = Instant::now();
    let mut usage = UsageMetadata::default();
    let result = caller
        .invoke(&request, Some(&mut usage as &mut dyn UsageSink))
        .await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let instance = match result {
        Ok(instance) => instance,
        Err(failure) => {
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), failure);
            }
            return Err(failure).context("Structured call failed");
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&instance).context("Failed to serialize result")?
    );

    if !cli.quiet {
        eprintln!(
            "{} {} request(s)  {} output tokens  {}",
            green("✔"),
            usage.request_count,
            usage.tokens_used,
            dim(&format!("{:.1}s", start.elapsed().as_secs_f64()))
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["vision-call", "--schema", "s.json"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn log_filter_levels() {
        assert_eq!(log_filter(&parse(&[])), "error");
        assert_eq!(log_filter(&parse(&["--quiet"])), "error");
        assert_eq!(log_filter(&parse(&["--no-progress"])), "info");
        assert_eq!(log_filter(&parse(&["--no-progress", "--quiet"])), "error");
        assert_eq!(log_filter(&parse(&["--verbose"])), "debug");
    }
}
