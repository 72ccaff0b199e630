//! CLI binary for edgequake-docfill.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FillConfig`, runs a `Session` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_docfill::{
    scan_template, write_atomic, Delimiters, FillConfig, FillOutput, FillProgressCallback,
    Mapping, ProgressCallback, Session, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner per stage, switching to a page counter while
/// the reports are being read.
struct CliProgressCallback {
    bar: ProgressBar,
    pages_done: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            pages_done: AtomicUsize::new(0),
        })
    }

    fn activate_page_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }
}

impl FillProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(match stage {
            Stage::Scan => "Template",
            Stage::Render => "Reports",
            Stage::Ocr => "Reading",
            Stage::Mapping => "Mapping",
            Stage::Fill => "Filling",
        });
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_page_start(&self, page_num: usize, total: usize) {
        if page_num == 1 || self.bar.length() != Some(total as u64) {
            self.activate_page_bar(total);
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.pages_done.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
    }

    fn on_run_complete(&self, placeholders: usize, occurrences: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} placeholder(s), {} occurrence(s) filled from {} page(s)",
            green("✔"),
            bold(&placeholders.to_string()),
            bold(&occurrences.to_string()),
            self.pages_done.load(Ordering::SeqCst),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill a template from two scanned reports
  docfill template.docx claim.pdf medical.pdf -o filled.docx

  # List the placeholders of a template (no API key needed)
  docfill --scan-only template.docx

  # Fill from a mapping you already have (no API key needed)
  docfill --mapping values.json template.docx -o filled.docx

  # Keep the OCR text and the mapping for review
  docfill template.docx report.pdf -o out.docx --dump-text text.txt --dump-mapping map.json

  # Reports can be URLs
  docfill template.docx https://example.com/report.pdf -o out.docx

  # Square-bracket placeholders: [[NAME]]
  docfill --open '[[' --close ']]' template.docx report.pdf -o out.docx

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider, gemini-2.5-flash)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise the system library is used
  RUST_LOG                Log filter, e.g. edgequake_docfill=debug
"#;

/// Fill DOCX templates from scanned PDF reports using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docfill",
    version,
    about = "Fill DOCX templates from scanned PDF reports using Vision LLMs",
    long_about = "Read PDF reports (local files or URLs) with a vision model, map the text \
onto the {{PLACEHOLDER}} tokens of a DOCX template with a language model, and write the \
filled document. Formatting of the template runs is preserved.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// DOCX template containing {{NAME}} placeholders.
    template: PathBuf,

    /// Report PDFs: local paths or HTTP/HTTPS URLs, read in this order.
    reports: Vec<String>,

    /// Write the filled DOCX here.
    #[arg(short, long, env = "DOCFILL_OUTPUT", required_unless_present = "scan_only")]
    output: Option<PathBuf>,

    /// Print the template's placeholders and exit.
    #[arg(long)]
    scan_only: bool,

    /// Fill from this JSON mapping file instead of calling the AI service.
    #[arg(long, env = "DOCFILL_MAPPING")]
    mapping: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "DOCFILL_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted reports.
    #[arg(long, env = "DOCFILL_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom OCR instruction.
    #[arg(long, env = "DOCFILL_OCR_PROMPT")]
    ocr_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCFILL_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCFILL_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per AI call on failure.
    #[arg(long, env = "DOCFILL_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Opening placeholder delimiter.
    #[arg(long, env = "DOCFILL_OPEN", default_value = "{{")]
    open: String,

    /// Closing placeholder delimiter.
    #[arg(long, env = "DOCFILL_CLOSE", default_value = "}}")]
    close: String,

    /// Do not fail when placeholders remain in the filled document.
    #[arg(long, env = "DOCFILL_NO_VERIFY")]
    no_verify: bool,

    /// Write the extracted report text to this file (also on failure).
    #[arg(long)]
    dump_text: Option<PathBuf>,

    /// Write the placeholder mapping as JSON to this file (also on failure).
    #[arg(long)]
    dump_mapping: Option<PathBuf>,

    /// Print a JSON run summary to stdout.
    #[arg(long, env = "DOCFILL_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCFILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCFILL_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCFILL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.scan_only;
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

    let delimiters = Delimiters::new(cli.open.clone(), cli.close.clone());

    // ── Scan-only mode ───────────────────────────────────────────────────
    if cli.scan_only {
        let names = scan_template(&cli.template, &delimiters).context("Failed to scan template")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&names).context("Failed to serialise placeholders")?
            );
        } else {
            for name in &names {
                println!("{name}");
            }
            if !cli.quiet {
                eprintln!("{} placeholder(s)", names.len());
            }
        }
        return Ok(());
    }

    let output_path = cli
        .output
        .clone()
        .context("--output is required unless --scan-only is given")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn FillProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, delimiters, progress_cb).await?;

    let mut template = BufReader::new(
        File::open(&cli.template)
            .with_context(|| format!("Failed to open template {}", cli.template.display()))?,
    );
    let mut session = Session::new(config);

    // ── Run ──────────────────────────────────────────────────────────────
    let result = if let Some(ref mapping_path) = cli.mapping {
        let mapping = Mapping::from_json_file(mapping_path).context("Failed to load mapping")?;
        session.fill_with_mapping(&mut template, mapping)
    } else {
        if cli.reports.is_empty() {
            bail!("At least one report PDF is required (or pass --mapping)");
        }
        session.run(&mut template, &cli.reports).await
    };

    // Dumps are written even when a later stage failed.
    write_dumps(&cli, &session).await?;

    let output = result.context("Fill failed")?;
    write_atomic(&output_path, &output.document)
        .await
        .context("Failed to write output document")?;

    print_summary(&cli, &output, &output_path)?;
    Ok(())
}

/// Map CLI args to `FillConfig`.
async fn build_config(
    cli: &Cli,
    delimiters: Delimiters,
    progress: Option<ProgressCallback>,
) -> Result<FillConfig> {
    let mut builder = FillConfig::builder()
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .delimiters(delimiters)
        .verify_output(!cli.no_verify)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.ocr_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read OCR prompt from {:?}", path))?;
        builder = builder.ocr_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn write_dumps(cli: &Cli, session: &Session) -> Result<()> {
    let artifacts = session.artifacts();

    if let (Some(path), Some(corpus)) = (&cli.dump_text, artifacts.corpus_so_far()) {
        write_text(path, &corpus).await?;
    }
    if let (Some(path), Some(mapping)) = (&cli.dump_mapping, &artifacts.mapping) {
        let json = serde_json::to_string_pretty(mapping).context("Failed to serialise mapping")?;
        write_text(path, &json).await?;
    }
    Ok(())
}

async fn write_text(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(cli: &Cli, output: &FillOutput, output_path: &Path) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    let stats = &output.stats;
    eprintln!(
        "{}  {}/{} placeholders filled  {}ms  →  {}",
        if output.report.missing.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.mapped,
        stats.placeholders,
        stats.total_duration_ms,
        bold(&output_path.display().to_string()),
    );
    if !output.report.missing.is_empty() {
        let missing: Vec<&str> = output.report.missing.iter().map(String::as_str).collect();
        eprintln!("   {} {}", cyan("no value for:"), missing.join(", "));
    }
    if stats.pages > 0 {
        eprintln!(
            "   {} pages  /  {} tokens in  /  {} tokens out",
            stats.pages,
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }
    Ok(())
}
