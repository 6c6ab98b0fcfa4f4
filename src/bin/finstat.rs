//! CLI binary for finstat-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the extraction and prints the tables as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use finstat_extract::{
    extract_tables, load_page_images, test_connection, CredentialStore, EnvCredentialStore,
    ExtractionConfig, ExtractionProgressCallback, ExtractionWarning, FileCredentialStore,
    ProgressCallback, ProviderCredentials,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over pages; retry warnings and failures are printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
    }

    fn on_warning(&self, warning: &ExtractionWarning) {
        self.bar.println(format!("  {} {}", yellow("⚠"), warning));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, rows: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {rows} rows",
            green("✓"),
            page_num,
            total
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(error)
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} pages extracted", green("✔"), bold(&total_pages.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract from page images using credentials in the environment
  OPENAI_API_KEY=sk-... finstat extract --provider openai p1.jpg p2.jpg

  # Save credentials once, then extract with the active provider
  finstat keys set --provider gemini --api-key AIza... --keys-file ~/.finstat/keys.json
  finstat extract --keys-file ~/.finstat/keys.json scan-*.png -o tables.json

  # Check that an OpenAI-compatible proxy answers
  finstat test-connection --provider custom --api-key k --base-url http://localhost:4000/v1 --model my-vlm

SUPPORTED PROVIDERS (default model):
  openai      gpt-4o
  anthropic   claude-3-5-sonnet-20240620
  gemini      gemini-1.5-pro
  custom      proxy-model  (OpenAI-compatible endpoint, set --base-url)

ENVIRONMENT VARIABLES (used when --keys-file is not given):
  {PROVIDER}_API_KEY      e.g. OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY
  {PROVIDER}_BASE_URL     Endpoint override
  {PROVIDER}_MODEL        Model override
"#;

/// Extract financial statements from report page images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "finstat",
    version,
    about = "Extract balance sheets, income and cash-flow statements from report page images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FINSTAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FINSTAT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the three statements from page images (files, URLs or data URLs).
    Extract(ExtractArgs),
    /// Send a one-line probe to a provider.
    TestConnection(ConnectionArgs),
    /// Manage stored provider credentials.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Page images in document order.
    #[arg(required = true)]
    images: Vec<String>,

    /// Provider: openai, anthropic, gemini, custom. Defaults to the key file's active provider.
    #[arg(long, env = "FINSTAT_PROVIDER")]
    provider: Option<String>,

    /// JSON credentials file (see `finstat keys set`). Without it, keys come from the environment.
    #[arg(long, env = "FINSTAT_KEYS_FILE")]
    keys_file: Option<PathBuf>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "FINSTAT_OUTPUT")]
    output: Option<PathBuf>,

    /// Emit compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FINSTAT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens per page [default: 8192, 4096 for anthropic].
    #[arg(long, env = "FINSTAT_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Retries per page after a rate-limit response.
    #[arg(long, env = "FINSTAT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff unit in ms; retry n waits n × this.
    #[arg(long, env = "FINSTAT_RETRY_BACKOFF_MS", default_value_t = 2000)]
    retry_backoff_ms: u64,

    /// Per-request model timeout in seconds.
    #[arg(long, env = "FINSTAT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Timeout for downloading page images given as URLs, in seconds.
    #[arg(long, env = "FINSTAT_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "FINSTAT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Provider to probe.
    #[arg(long)]
    provider: String,

    /// API key; falls back to the key file or environment.
    #[arg(long)]
    api_key: Option<String>,

    /// Endpoint override.
    #[arg(long)]
    base_url: Option<String>,

    /// Model override.
    #[arg(long)]
    model: Option<String>,

    /// JSON credentials file to read the key from.
    #[arg(long, env = "FINSTAT_KEYS_FILE")]
    keys_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// Save a provider's credentials and make it the active provider.
    Set {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, env = "FINSTAT_KEYS_FILE")]
        keys_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless -v is given.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress,
        _ => false,
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
        Command::TestConnection(args) => run_test_connection(args, cli.quiet).await,
        Command::Keys { action } => run_keys(action, cli.quiet),
    }
}

async fn run_extract(args: ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args, progress).await?;

    let file_store = args
        .keys_file
        .as_ref()
        .map(FileCredentialStore::open)
        .transpose()
        .context("Failed to open credentials file")?;
    let provider = args
        .provider
        .clone()
        .or_else(|| file_store.as_ref().map(|s| s.active_provider().to_string()))
        .unwrap_or_else(|| finstat_extract::credentials::DEFAULT_ACTIVE_PROVIDER.to_string());
    let store: &dyn CredentialStore = match file_store {
        Some(ref s) => s,
        None => &EnvCredentialStore,
    };

    let pages = load_page_images(args.images.as_slice(), config.download_timeout_secs)
        .await
        .context("Failed to load page images")?;

    let tables = extract_tables(pages, &provider, store, &config)
        .await
        .context("Extraction failed")?;

    let json = if args.compact {
        serde_json::to_string(&tables)
    } else {
        serde_json::to_string_pretty(&tables)
    }
    .context("Failed to serialise tables")?;

    if let Some(ref path) = args.output {
        write_atomic(path, &json).await?;
        if !quiet {
            eprintln!(
                "{}  balance sheet {} · income {} · cash flow {} rows  →  {}",
                green("✔"),
                tables.balance_sheet.len(),
                tables.income_statement.len(),
                tables.cash_flow_statement.len(),
                bold(&path.display().to_string())
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    }
    Ok(())
}

async fn run_test_connection(args: ConnectionArgs, quiet: bool) -> Result<()> {
    let stored = match args.keys_file {
        Some(ref path) => FileCredentialStore::open(path)
            .context("Failed to open credentials file")?
            .get_credentials(&args.provider),
        None => EnvCredentialStore.get_credentials(&args.provider),
    };

    let mut credentials = match (args.api_key, stored) {
        (Some(key), _) => ProviderCredentials::new(key),
        (None, Some(stored)) => stored,
        (None, None) => anyhow::bail!(
            "No API key for provider '{}': pass --api-key or store one with `finstat keys set`",
            args.provider
        ),
    };
    if args.base_url.is_some() {
        credentials.base_url = args.base_url;
    }
    if args.model.is_some() {
        credentials.model_name = args.model;
    }

    test_connection(&args.provider, &credentials, &ExtractionConfig::default()).await?;
    if !quiet {
        eprintln!("{} {} answered", green("✔"), bold(&args.provider));
    }
    Ok(())
}

fn run_keys(action: KeysAction, quiet: bool) -> Result<()> {
    match action {
        KeysAction::Set {
            provider,
            api_key,
            base_url,
            model,
            keys_file,
        } => {
            // Reject unknown providers before anything is written.
            provider.parse::<finstat_extract::ProviderKind>()?;

            let mut store =
                FileCredentialStore::open(&keys_file).context("Failed to open credentials file")?;
            store.save_credentials(
                &provider,
                ProviderCredentials {
                    api_key,
                    base_url,
                    model_name: model,
                },
            );
            store.persist()?;
            if !quiet {
                eprintln!(
                    "{} saved credentials for {} (now active) in {}",
                    green("✔"),
                    bold(&provider),
                    keys_file.display()
                );
            }
            Ok(())
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_retries(args.max_retries)
        .retry_backoff_ms(args.retry_backoff_ms)
        .request_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);

    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Atomic write: temp file, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
