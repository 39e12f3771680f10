//! CLI binary for rfp-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one document, and prints or saves the JSON.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rfp_extract::pipeline::extract::pdfium_search_path;
use rfp_extract::{
    extract_document_text, render_prompt, DocumentKind, ExtractionConfig, ExtractionConfigBuilder,
    ExtractionProgressCallback, ExtractionResult, Extractor, ModelBackend, ProgressCallback,
    SourceDocument, DOWNLOAD_FILE_NAME,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner that names the current stage, and
/// one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|g| *g)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, name: &str, kind: DocumentKind) {
        if let Ok(mut g) = self.started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing file: {name} ({kind})"))
        ));
        self.bar.set_prefix("Extracting");
        self.bar.set_message(format!("reading {kind} text"));
    }

    fn on_text_extracted(&self, text_chars: usize, page_count: Option<usize>) {
        let pages = page_count
            .map(|n| format!(" from {n} pages"))
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} Text       {}",
            green("✓"),
            dim(&format!("{text_chars} chars{pages}"))
        ));
    }

    fn on_model_request(&self, model: &str, prompt_bytes: usize) {
        self.bar.set_prefix("Asking");
        self.bar.set_message(format!("{model} ({prompt_bytes} bytes)"));
    }

    fn on_model_response(&self, response_bytes: usize) {
        self.bar.println(format!(
            "  {} Model      {}",
            green("✓"),
            dim(&format!("{response_bytes} bytes in {:.1}s", self.elapsed_secs()))
        ));
        self.bar.set_prefix("Parsing");
        self.bar.set_message("locating JSON");
    }

    fn on_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(message));
    }

    fn on_extraction_complete(&self, field_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} fields extracted  {}",
            green("✔"),
            bold(&field_count.to_string()),
            dim(&format!("{:.1}s", self.elapsed_secs()))
        );
    }
}

/// Prints user-reported failures when the spinner is disabled.
struct PlainReporter;

impl ExtractionProgressCallback for PlainReporter {
    fn on_failure(&self, message: &str) {
        eprintln!("{} {}", red("✘"), message);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields and print the JSON
  rfp-extract bid_2024_017.pdf

  # Save as extracted_rfp_data.json in the current directory
  rfp-extract solicitation.html -o .

  # Save to an explicit path
  rfp-extract solicitation.html -o out/road-repair.json

  # Use another provider through edgequake-llm
  rfp-extract --provider openai --model gpt-4.1-mini bid.pdf

  # Dry runs (no API key needed)
  rfp-extract --text-only bid.pdf
  rfp-extract --prompt-only bid.pdf

  # JSON result together with run statistics
  rfp-extract --json bid.pdf > run.json

EXTRACTED FIELDS:
  Bid Number, Title, Due Date, Bid Submission Type, Term of Bid,
  Pre Bid Meeting, Installation, Bid Bond Requirement, Delivery Date,
  Payment Terms, Any Additional Documentation Required,
  MFG for Registration, Contract or Cooperative to use, Model_no,
  Part_no, Product, Contact Info, Company Name, Bid Summary,
  Product Specification

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Gemini API key (placeholder used if unset)
  OPENAI_API_KEY, ...     Keys for --provider backends
  PDFIUM_LIB_PATH         libpdfium file or directory (needed for PDFs)
  RUST_LOG                Log filter, overrides -v / -q

  A .env file in the working directory or its parents is loaded first.
"#;

/// Extract structured bid fields from an RFP document (HTML or PDF).
#[derive(Parser, Debug)]
#[command(
    name = "rfp-extract",
    version,
    about = "Extract structured bid fields from an RFP document (HTML or PDF) with an LLM",
    long_about = "Convert an RFP document to plain text, ask a language model for twenty \
standard bid fields, and print the answer as JSON. Gemini is used by default; any provider \
supported by edgequake-llm (OpenAI, Anthropic, Ollama, ...) can be selected with --provider.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to an .html or .pdf file.
    input: PathBuf,

    /// Write the JSON here. A directory receives extracted_rfp_data.json.
    #[arg(short, long, env = "RFP_EXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Model ID (e.g. gemini-1.5-flash, gemini-1.5-pro, gpt-4.1-mini).
    #[arg(long, env = "RFP_EXTRACT_MODEL", default_value = rfp_extract::config::DEFAULT_MODEL)]
    model: String,

    /// Model provider: gemini (native), or an edgequake-llm provider name.
    #[arg(long, env = "RFP_EXTRACT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "RFP_EXTRACT_ENDPOINT", default_value = rfp_extract::config::DEFAULT_GEMINI_ENDPOINT)]
    endpoint: String,

    /// Path to a custom prompt template containing {document_text} once.
    #[arg(long, env = "RFP_EXTRACT_TEMPLATE")]
    template: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0). Service default if unset.
    #[arg(long, env = "RFP_EXTRACT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Service default if unset.
    #[arg(long, env = "RFP_EXTRACT_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Give up on the model after this many seconds. Waits indefinitely if unset.
    #[arg(long, env = "RFP_EXTRACT_TIMEOUT")]
    timeout: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "RFP_EXTRACT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// libpdfium file or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the extracted document text and stop.
    #[arg(long, conflicts_with = "prompt_only")]
    text_only: bool,

    /// Print the rendered prompt and stop.
    #[arg(long)]
    prompt_only: bool,

    /// Print result and run statistics as one JSON document.
    #[arg(long)]
    json: bool,

    /// List expected fields the model left out.
    #[arg(long)]
    missing: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "RFP_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RFP_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RFP_EXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before clap reads `env = ...` defaults.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already says what is happening; keep INFO logs out of its way.
    let dry_run = cli.text_only || cli.prompt_only;
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else if !cli.quiet {
        Some(Arc::new(PlainReporter) as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    tracing::debug!("pdfium lookup: {}", pdfium_search_path(&config).display());

    // ── Dry runs ─────────────────────────────────────────────────────────
    if cli.text_only {
        let text = extract_document_text(&cli.input, &config)
            .await
            .context("Text extraction failed")?;
        write_stdout(text.as_str())?;
        return Ok(());
    }
    if cli.prompt_only {
        let prompt = render_prompt(&cli.input, &config)
            .await
            .context("Prompt rendering failed")?;
        write_stdout(prompt.as_str())?;
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let extractor = Extractor::new(config).context("Failed to set up the model backend")?;

    if cli.json {
        let document = SourceDocument::from_path(&cli.input)
            .await
            .context("Failed to load document")?;
        let output = extractor
            .extract(document)
            .await
            .context("Extraction failed")?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        if let Some(ref path) = cli.output {
            emit_result(&output.result, Some(path))?;
        }
        return Ok(());
    }

    let Some(result) = extractor
        .process_path(&cli.input)
        .await
        .context("Extraction failed")?
    else {
        // Already reported through the progress callback or the log.
        std::process::exit(EXIT_NO_DATA);
    };

    match emit_result(&result, cli.output.as_deref())? {
        Some(written) => {
            if !cli.quiet {
                eprintln!(
                    "{}  {} fields  →  {}",
                    green("✔"),
                    result.len(),
                    bold(&written.display().to_string())
                );
            }
        }
        None => {
            if !cli.quiet && !show_progress {
                eprintln!(
                    "{}",
                    dim(&format!("Save with -o . to get {DOWNLOAD_FILE_NAME}"))
                );
            }
        }
    }

    if cli.missing && !cli.quiet {
        print_missing(&result);
    }

    Ok(())
}

/// Exit code when the document yields no data.
const EXIT_NO_DATA: i32 = 1;

/// Save `result` to `output`, or print it when no output is given.
///
/// An empty object counts as no data: nothing is printed or written.
fn emit_result(result: &ExtractionResult, output: Option<&Path>) -> Result<Option<PathBuf>> {
    if result.is_empty() {
        anyhow::bail!("The model returned no field values; nothing was saved");
    }
    match output {
        Some(path) => {
            let written = result.write_json(path).context("Failed to write JSON")?;
            Ok(Some(written))
        }
        None => {
            write_stdout(&result.to_pretty_json())?;
            Ok(None)
        }
    }
}

fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_missing(result: &ExtractionResult) {
    let missing = result.missing_fields();
    if missing.is_empty() {
        eprintln!("{} all {} expected fields present", green("✓"), rfp_extract::RFP_FIELDS.len());
    } else {
        eprintln!("{} {} expected fields missing:", cyan("⚠"), missing.len());
        for field in missing {
            eprintln!("    {}", dim(field));
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let template = if let Some(ref path) = cli.template {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt template from {:?}", path))?,
        )
    } else {
        None
    };

    // Environment first; explicit flags below override it.
    let mut builder = ExtractionConfigBuilder::from_env()
        .model(cli.model.clone())
        .backend(ModelBackend::from_name(&cli.provider))
        .endpoint(cli.endpoint.clone());

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(t) = template {
        builder = builder.prompt_template(t);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
