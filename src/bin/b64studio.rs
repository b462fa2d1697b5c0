//! CLI binary for base64-studio.
//!
//! A thin shim over the library crate: `extract` maps flags to
//! `StudioConfig` and runs a batch, `decode` turns base64 back into files.

use anyhow::{Context, Result};
use base64_studio::debounce::{spawn_auto_decoder, DecodeEvent};
use base64_studio::decode::{self, Preview, PreviewKind, Trigger};
use base64_studio::display::{format_file_size, render_record};
use base64_studio::export::DEFAULT_EXPORT_FILE;
use base64_studio::pipeline::input::resolve_inputs;
use base64_studio::pipeline::postprocess::EXTRACTION_FAILED_PREFIX;
use base64_studio::{
    export_records, BatchProcessor, BatchProgressCallback, BatchStore, DecodeConfig,
    ExtractedDocument, FileRecord, ProgressCallback, StudioConfig, UnknownFormatPolicy,
    XlsxSheetWriter,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
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

/// Terminal progress callback: a live progress bar plus one log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the file currently being processed.
    file_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            file_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        let secs = self
            .file_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        *self.file_started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, record: &FileRecord) {
        let detail = match record.document() {
            ExtractedDocument::Recognized(doc) => doc
                .document_category
                .clone()
                .unwrap_or_else(|| "uncategorised".to_string()),
            ExtractedDocument::Unrecognized { raw } if raw.starts_with(EXTRACTION_FAILED_PREFIX) => {
                red("extraction failed")
            }
            ExtractedDocument::Unrecognized { .. } => "unstructured".to_string(),
        };
        let pages = record
            .pages
            .as_ref()
            .map(|p| format!(" {} pages", p.len()))
            .unwrap_or_default();

        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<32} {:<9}{} {}  {}",
            green("✓"),
            index + 1,
            total,
            record.name,
            dim(&format_file_size(record.size)),
            dim(&pages),
            detail,
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<32} {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, completed: usize) {
        let failed = total_files.saturating_sub(completed);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files processed successfully",
                green("✔"),
                bold(&completed.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files processed  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&completed.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields from a folder of scans
  b64studio extract scans/

  # Several files and a URL, then export to a spreadsheet
  b64studio extract passport.jpg licence.pdf https://example.com/id.png \
      --export processed_documents.xlsx

  # Use a specific model
  b64studio extract --provider openai --model gpt-4.1 id.png

  # Records as JSON
  b64studio extract --json scans/ > records.json

  # Decode a base64 string (or data URI) to a file
  b64studio decode "JVBERi0xLjQK..." -o ./out/

  # Decode from a file or stdin
  b64studio decode --file payload.txt -o image.png
  pbpaste | b64studio decode

  # Live mode: each stdin line replaces the input, converted after 500 ms idle
  b64studio decode --watch

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred when set)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Document images/PDFs → base64 → structured fields, and base64 → files.
#[derive(Parser, Debug)]
#[command(
    name = "b64studio",
    version,
    about = "Convert documents to base64, extract fields with Vision LLMs, and decode base64 back to files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "B64STUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "B64STUDIO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract structured fields from images and PDFs.
    Extract(ExtractArgs),
    /// Decode a base64 string or data URI into a file.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Files, folders, or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write completed records to this .xlsx workbook.
    #[arg(long, env = "B64STUDIO_EXPORT", num_args = 0..=1,
          default_missing_value = DEFAULT_EXPORT_FILE)]
    export: Option<PathBuf>,

    /// Print records as JSON instead of the text view.
    #[arg(long, env = "B64STUDIO_JSON")]
    json: bool,

    /// Show full extracted JSON without shortening long strings.
    #[arg(long)]
    full: bool,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "B64STUDIO_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "B64STUDIO_PROVIDER")]
    provider: Option<String>,

    /// PDF page upscale factor (0.5–4.0).
    #[arg(long, env = "B64STUDIO_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Cap on rendered page width/height in pixels.
    #[arg(long, env = "B64STUDIO_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_path: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "B64STUDIO_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per file.
    #[arg(long, env = "B64STUDIO_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "B64STUDIO_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-file extraction timeout in seconds.
    #[arg(long, env = "B64STUDIO_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "B64STUDIO_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "B64STUDIO_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Base64 string or data URI. Read from --file or stdin when omitted.
    input: Option<String>,

    /// Read the base64 text from this file.
    #[arg(long, conflicts_with = "input")]
    file: Option<PathBuf>,

    /// Write the decoded file here. A directory gets `converted-file.<ext>`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail on payloads with no known file signature instead of assuming PNG.
    #[arg(long)]
    strict: bool,

    /// Read stdin line by line; each line replaces the input and is
    /// converted once typing pauses.
    #[arg(long, conflicts_with_all = ["input", "file"])]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Decode(_) => false,
    };
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

    match cli.command {
        Command::Extract(args) => run_extract(args, show_progress, cli.quiet).await,
        Command::Decode(args) => run_decode(args, cli.quiet).await,
    }
}

// ── extract ──────────────────────────────────────────────────────────────────

async fn run_extract(args: ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args, progress_cb).await?;

    let files = resolve_inputs(&args.inputs, &config)
        .await
        .context("Failed to resolve inputs")?;
    if files.is_empty() {
        anyhow::bail!("No supported files found in the given inputs");
    }

    let processor =
        BatchProcessor::from_config(config.clone()).context("Failed to set up extraction")?;
    let store = BatchStore::new();
    let summary = processor
        .submit(&store, &files)
        .await
        .context("Batch processing failed")?;

    let records = store.snapshot();
    if args.json {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialise records")?;
        println!("{json}");
    } else {
        for record in &records {
            println!("{}", render_record(record, args.full));
        }
    }

    if !quiet && !show_progress {
        eprintln!(
            "Processed {}/{} files ({} failed, {} pages) in {}ms",
            summary.completed, summary.total, summary.failed, summary.pages, summary.duration_ms
        );
    }

    if let Some(ref path) = args.export {
        let outcome = export_records(
            &records,
            path,
            &XlsxSheetWriter,
            config.export_base64_max_len,
        )
        .await
        .context("Export failed")?;
        if !quiet {
            eprintln!("{} {}", cyan("◆"), outcome);
        }
    }

    Ok(())
}

/// Map CLI args to `StudioConfig`.
async fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<StudioConfig> {
    let mut builder = StudioConfig::builder()
        .render_scale(args.scale)
        .max_rendered_pixels(args.max_pixels)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref dir) = args.pdfium_path {
        builder = builder.pdfium_library_path(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── decode ───────────────────────────────────────────────────────────────────

async fn run_decode(args: DecodeArgs, quiet: bool) -> Result<()> {
    let policy = if args.strict {
        UnknownFormatPolicy::Reject
    } else {
        UnknownFormatPolicy::AssumePng
    };

    if args.watch {
        return watch_stdin(policy, args.output.as_deref(), quiet).await;
    }

    let text = match (&args.input, &args.file) {
        (Some(s), _) => s.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let preview = decode::convert(&text, Trigger::Manual, policy)?
        .context("Nothing to decode")?;
    report_preview(&preview, args.output.as_deref(), quiet).await
}

async fn watch_stdin(policy: UnknownFormatPolicy, output: Option<&Path>, quiet: bool) -> Result<()> {
    let config = DecodeConfig {
        unknown_format: policy,
        ..DecodeConfig::default()
    };
    let quiet_period = config.quiet_period;
    let (handle, mut events) = spawn_auto_decoder(config);

    if !quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            dim("Paste base64 (one input per line). `:convert` converts now, `:clear` resets.")
        );
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(l) if l.trim() == ":convert" => { handle.convert_now(); }
                    Some(l) if l.trim() == ":clear" => { handle.clear(); }
                    Some(l) => { handle.set_input(l); }
                    None => {
                        // Let an armed timer fire before shutting the decoder down.
                        tokio::time::sleep(quiet_period + Duration::from_millis(50)).await;
                        break;
                    }
                }
            }
            Some(event) = events.next() => handle_event(event, output, quiet).await?,
        }
    }

    drop(handle);
    while let Some(event) = events.next().await {
        handle_event(event, output, quiet).await?;
    }
    Ok(())
}

async fn handle_event(event: DecodeEvent, output: Option<&Path>, quiet: bool) -> Result<()> {
    match event {
        DecodeEvent::Preview(preview) => report_preview(&preview, output, quiet).await?,
        DecodeEvent::Failed(e) => eprintln!("{} {}", red("✗"), e),
        DecodeEvent::Cleared => {
            if !quiet {
                eprintln!("{}", dim("cleared"));
            }
        }
    }
    Ok(())
}

async fn report_preview(preview: &Preview, output: Option<&Path>, quiet: bool) -> Result<()> {
    let res = &preview.resource;
    let shape = match preview.kind {
        PreviewKind::Image { width, height } => format!("{width}×{height}"),
        PreviewKind::Document => "document".to_string(),
    };

    if !quiet {
        eprintln!(
            "{} {}  {}  {}  {}",
            green("✓"),
            bold(&res.mime_type),
            shape,
            dim(&format_file_size(preview.bytes.len() as u64)),
            dim(&format!("{:?}", res.source).to_lowercase()),
        );
    }

    match output {
        Some(path) => {
            let target = if path.is_dir() {
                path.join(res.file_name())
            } else {
                path.to_path_buf()
            };
            tokio::fs::write(&target, &preview.bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", target))?;
            println!("{}", target.display());
        }
        None => {
            if !quiet {
                eprintln!(
                    "  {}",
                    dim(&format!("use -o to save as {}", res.file_name()))
                );
            }
        }
    }
    Ok(())
}
