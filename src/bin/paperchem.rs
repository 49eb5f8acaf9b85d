//! CLI binary for paperchem.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use paperchem::{
    compare_documents, convert_batch, extract_entities, extract_entities_to_file, inspect,
    ComparisonResult, DocumentEntities, ExtractionProgressCallback, PipelineConfig,
    ProgressCallback, StructuredDocument,
};
use std::io;
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

/// Terminal progress callback: a spinner while the PDF is converted, then a
/// bar over the mentions with one log line per resolved chemical.
struct CliProgressCallback {
    bar: ProgressBar,
    misses: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            misses: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} mentions  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Resolving");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, input: &str) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(input.to_string());
    }

    fn on_conversion_complete(&self, input: &str, markup_len: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(input),
            dim(&format!("{markup_len} bytes of TEI"))
        ));
    }

    fn on_extraction_start(&self, total_mentions: usize) {
        self.misses.store(0, Ordering::SeqCst);
        self.activate_bar(total_mentions);
    }

    fn on_mention_resolved(&self, _index: usize, _total: usize, mention: &str, cid: u64) {
        self.bar.println(format!(
            "  {} {:<40}  {}",
            green("✓"),
            mention,
            dim(&format!("CID {cid}"))
        ));
        self.bar.inc(1);
    }

    fn on_mention_duplicate(&self, _index: usize, _total: usize, _mention: &str, _cid: u64) {
        self.bar.inc(1);
    }

    fn on_mention_miss(&self, _index: usize, _total: usize, _mention: &str) {
        self.misses.fetch_add(1, Ordering::SeqCst);
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_mentions: usize, entity_count: usize) {
        self.bar.finish_and_clear();
        let misses = self.misses.load(Ordering::SeqCst);
        eprintln!(
            "{} {} chemicals from {} mentions  {}",
            green("✔"),
            bold(&entity_count.to_string()),
            total_mentions,
            dim(&format!("({misses} unresolved)")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Chemicals of one paper (GROBID on localhost:8070)
  paperchem extract paper.pdf

  # Save as JSON
  paperchem extract paper.pdf -o paper.json

  # Already-converted TEI, no conversion service needed
  paperchem extract paper.tei.xml

  # Compare two papers
  paperchem compare a.pdf b.pdf

  # Document structure only, no PubChem requests
  paperchem inspect paper.pdf

  # Convert a batch to TEI through the remote backend
  paperchem --no-grobid --backend-url https://backend.example.org \
      convert --out-dir tei/ papers/*.pdf

ENVIRONMENT VARIABLES:
  PAPERCHEM_GROBID_URL        GROBID base URL (default http://localhost:8070)
  PAPERCHEM_BACKEND_URL       Remote conversion backend
  PAPERCHEM_BACKEND_USER      Backend user name
  PAPERCHEM_BACKEND_PASSWORD  Backend password
  PAPERCHEM_TOKEN_CACHE       File caching the backend token between runs
  PAPERCHEM_PUBCHEM_URL       PubChem PUG REST base URL
  RUST_LOG                    Override log filter (e.g. paperchem=debug)
"#;

/// Extract, enrich and compare chemical entities in scientific papers.
#[derive(Parser, Debug)]
#[command(
    name = "paperchem",
    version,
    about = "Extract, enrich and compare chemical entities in scientific papers",
    long_about = "Convert scientific PDFs to TEI with GROBID (or an authenticated conversion \
backend), find chemical mentions, resolve them against PubChem and deduplicate them into one \
entry per compound. Two papers can be compared on the chemicals they share.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    services: ServiceArgs,

    /// Output structured JSON.
    #[arg(long, global = true, env = "PAPERCHEM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PAPERCHEM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPERCHEM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPERCHEM_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// GROBID base URL.
    #[arg(long, global = true, env = "PAPERCHEM_GROBID_URL", default_value = paperchem::config::DEFAULT_GROBID_URL)]
    grobid_url: String,

    /// Skip GROBID and convert with the remote backend only.
    #[arg(long, global = true, env = "PAPERCHEM_NO_GROBID")]
    no_grobid: bool,

    /// Remote conversion backend, used when GROBID is unavailable.
    #[arg(long, global = true, env = "PAPERCHEM_BACKEND_URL")]
    backend_url: Option<String>,

    #[arg(long, global = true, env = "PAPERCHEM_BACKEND_USER")]
    backend_user: Option<String>,

    #[arg(long, global = true, env = "PAPERCHEM_BACKEND_PASSWORD", hide_env_values = true)]
    backend_password: Option<String>,

    /// Identifier sent with every backend upload.
    #[arg(long, global = true, env = "PAPERCHEM_EXTERNAL_ID", default_value = "paperchem")]
    external_id: String,

    /// File caching the backend token between runs.
    #[arg(long, global = true, env = "PAPERCHEM_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,

    /// PubChem PUG REST base URL.
    #[arg(long, global = true, env = "PAPERCHEM_PUBCHEM_URL", default_value = paperchem::config::DEFAULT_PUBCHEM_URL)]
    pubchem_url: String,

    /// Concurrent uploads/downloads for batch conversion.
    #[arg(short, long, global = true, env = "PAPERCHEM_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Retries per PubChem request on transient failures.
    #[arg(long, global = true, env = "PAPERCHEM_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Do not download structure images.
    #[arg(long, global = true, env = "PAPERCHEM_NO_IMAGES")]
    no_images: bool,

    /// Also save converted TEI into this directory.
    #[arg(long, global = true, env = "PAPERCHEM_MARKUP_DIR")]
    markup_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PAPERCHEM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Conversion request timeout in seconds.
    #[arg(long, global = true, env = "PAPERCHEM_CONVERSION_TIMEOUT", default_value_t = 300)]
    conversion_timeout: u64,

    /// PubChem request timeout in seconds.
    #[arg(long, global = true, env = "PAPERCHEM_LOOKUP_TIMEOUT", default_value_t = 30)]
    lookup_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the deduplicated chemicals of one paper.
    Extract {
        /// PDF path, HTTP/HTTPS URL, or TEI file (*.xml).
        input: String,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long, env = "PAPERCHEM_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Compare the chemicals of two papers.
    Compare { left: String, right: String },

    /// Print document structure without PubChem lookups.
    Inspect { input: String },

    /// Convert PDFs to TEI.
    Convert {
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Directory for the `.tei.xml` files.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let uses_progress = matches!(cli.command, Command::Extract { .. } | Command::Compare { .. });
    let show_progress = uses_progress && !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli.services, progress_cb)?;

    match &cli.command {
        Command::Extract { input, output } => {
            if let Some(path) = output {
                let stats = extract_entities_to_file(input, path, &config)
                    .await
                    .context("Extraction failed")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} chemicals  {} misses  {}ms  →  {}",
                        green("✔"),
                        stats.resolved,
                        stats.misses,
                        stats.conversion_ms + stats.lookup_ms,
                        bold(&path.display().to_string()),
                    );
                }
            } else {
                let doc = extract_entities(input, &config)
                    .await
                    .context("Extraction failed")?;
                if cli.json {
                    print_json(&doc)?;
                } else {
                    print_entities(&doc);
                }
            }
        }

        Command::Compare { left, right } => {
            let result = compare_documents(left, right, &config)
                .await
                .context("Comparison failed")?;
            if cli.json {
                print_json(&result)?;
            } else {
                print_comparison(&result);
            }
        }

        Command::Inspect { input } => {
            let doc = inspect(input, &config)
                .await
                .context("Failed to inspect document")?;
            if cli.json {
                print_json(&doc)?;
            } else {
                print_structure(input, &doc);
            }
        }

        Command::Convert { inputs, out_dir } => {
            run_convert(inputs.clone(), out_dir, &config, cli.quiet).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &ServiceArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .pubchem_url(&args.pubchem_url)
        .external_id(&args.external_id)
        .concurrency(args.concurrency)
        .max_retries(args.max_retries)
        .fetch_images(!args.no_images)
        .download_timeout_secs(args.download_timeout)
        .conversion_timeout_secs(args.conversion_timeout)
        .lookup_timeout_secs(args.lookup_timeout);

    builder = if args.no_grobid {
        builder.no_grobid()
    } else {
        builder.grobid_url(&args.grobid_url)
    };
    if let Some(ref url) = args.backend_url {
        builder = builder.backend_url(url);
    }
    if let (Some(user), Some(password)) = (&args.backend_user, &args.backend_password) {
        builder = builder.backend_credentials(user, password);
    }
    if let Some(ref path) = args.token_cache {
        builder = builder.token_cache_path(path);
    }
    if let Some(ref dir) = args.markup_dir {
        builder = builder.markup_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_convert(
    inputs: Vec<String>,
    out_dir: &Path,
    config: &PipelineConfig,
    quiet: bool,
) -> Result<()> {
    let total = inputs.len();
    let mut stream = convert_batch(inputs, config).context("Batch conversion failed")?;
    let mut failed = 0;

    while let Some(item) = stream.next().await {
        match item {
            Ok(doc) => {
                let stem = Path::new(&doc.input)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                let stem = stem.strip_suffix(".tei").unwrap_or(&stem).to_string();
                let target = out_dir.join(format!("{stem}.tei.xml"));
                tokio::fs::create_dir_all(out_dir)
                    .await
                    .with_context(|| format!("Failed to create {}", out_dir.display()))?;
                tokio::fs::write(&target, &doc.markup)
                    .await
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                if !quiet {
                    eprintln!(
                        "  {} {}  {}",
                        green("✓"),
                        target.display(),
                        dim(&format!("{:.1}s", doc.duration_ms as f64 / 1000.0))
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}", red("✗"), red(&e.to_string()));
            }
        }
    }

    if !quiet {
        eprintln!(
            "{} {}/{} documents converted",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&(total - failed).to_string()),
            total
        );
    }
    if failed == total && total > 0 {
        anyhow::bail!("All {} conversions failed", total);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_entities(doc: &DocumentEntities) {
    if let Some(ref title) = doc.metadata.title {
        println!("{}", bold(title));
    }
    println!(
        "{} chemicals  {}",
        doc.entities.len(),
        dim(&format!(
            "({} mentions, {} duplicates, {} unresolved)",
            doc.stats.mentions, doc.stats.duplicates, doc.stats.misses
        ))
    );
    println!();
    for chem in &doc.entities {
        println!(
            "  {:>10}  {:<16}  {:>9.3}  {}",
            chem.cid,
            chem.molecular_formula,
            chem.molecular_weight,
            chem.name
        );
        if chem.name != chem.mention {
            println!("  {:>10}  {}", "", dim(&format!("mentioned as '{}'", chem.mention)));
        }
    }
}

fn print_comparison(result: &ComparisonResult) {
    let title = |d: &DocumentEntities| d.metadata.title.clone().unwrap_or_else(|| d.source.clone());
    println!("A: {}  {}", bold(&title(&result.left)), dim(&format!("({} chemicals)", result.left.entities.len())));
    println!("B: {}  {}", bold(&title(&result.right)), dim(&format!("({} chemicals)", result.right.entities.len())));
    println!();
    println!("{} shared chemicals", bold(&result.matches.len().to_string()));
    for &(i, j) in &result.matches {
        let chem = &result.left.entities[i];
        println!("  A[{i:>3}] B[{j:>3}]  {:>10}  {}", chem.cid, chem.name);
    }
    println!();
    println!("Text overlap (word bigrams): {:.3}", result.text_overlap);
}

fn print_structure(input: &str, doc: &StructuredDocument) {
    println!("File:          {}", input);
    if let Some(ref t) = doc.metadata.title {
        println!("Title:         {}", t);
    }
    if !doc.metadata.authors.is_empty() {
        println!("Authors:       {}", doc.metadata.authors.join(", "));
    }
    if let Some(ref d) = doc.metadata.date {
        println!("Date:          {}", d);
    }
    if let Some(ref d) = doc.metadata.doi {
        println!("DOI:           {}", d);
    }
    println!("Headings:      {}", doc.headings.len());
    println!("Paragraphs:    {}", doc.paragraphs.len());
    println!("Figures:       {}", doc.figures.len());
    println!("Tables:        {}", doc.tables.len());
    println!("References:    {}", doc.bibliography.len());
    println!("Mentions:      {}", doc.mention_count());
    for record in &doc.records {
        if !record.names().is_empty() {
            println!("  {}", dim(&record.names().join(" / ")));
        }
    }
}
