//! CLI binary for lumispec.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `QueryParams` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lumispec::{
    classify_keyword, extract_image_folder, extract_pdf, load_series_map, run_query, BatchOutput,
    BatchProgressCallback, CatalogStore, ExtractionConfig, PromptProfile, ProviderClient,
    QueryParams, RangeBound, RetryPolicy,
};
use std::io::{self, Write};
use std::path::PathBuf;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// processed unit. Units arrive strictly in order, so no out-of-order
/// bookkeeping is needed.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set by `on_batch_start` once the source is open.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening source…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_units: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_units as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting extraction of {total_units} units…"))
        ));
    }

    fn on_unit_start(&self, _unit: usize, _total: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_unit_complete(&self, unit: usize, total: usize, records: usize) {
        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{records:>3} records")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} units extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} units extracted  ({} failed)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a catalog PDF into catalog.json
  lumispec extract catalog.pdf -o catalog.json

  # Append a second catalog to an existing file
  lumispec extract catalog-2024.pdf -o catalog.json --append

  # Extract a folder of price-table screenshots
  lumispec scan ./screenshots -o catalog.json --append

  # Query by keyword and attribute ranges
  lumispec query -c catalog.json "軌道燈" --watt 10:30 --price :5000

  # Ask the model whether a keyword is a series or a model code
  lumispec query -c catalog.json "ORB-10" --classify

  # Machine-readable query output
  lumispec query -c catalog.json "orbit" --json > result.json

  # Catalog status
  lumispec status -c catalog.json

  # Build the series map from the sales spreadsheet
  lumispec series products.xlsx -o series.json

RANGE SYNTAX:
  --watt 10:30     closed interval, endpoints included
  --watt 10:       lower bound only
  --watt :30       upper bound only

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         lumispec extract catalog.pdf -o catalog.json
  3. Query:           lumispec query -c catalog.json "orbit" --watt 10:30
"#;

/// Extract and query lighting-product catalogs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "lumispec",
    version,
    about = "Extract and query lighting-product catalogs using Vision LLMs",
    long_about = "Extract structured product records from catalog PDFs and price-table \
screenshots using Vision Language Models, persist them as a JSON catalog, and query the \
result by keyword and attribute ranges. Supports OpenAI, Anthropic, Google Gemini, and \
any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LUMISPEC_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LUMISPEC_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract product records from a catalog PDF.
    Extract(ExtractArgs),
    /// Extract model/price pairs from a folder of price-table screenshots.
    Scan(ExtractArgs),
    /// Query a persisted catalog by keyword and attribute ranges.
    Query(QueryArgs),
    /// Show load state and record count of a persisted catalog.
    Status {
        /// Path to the persisted catalog JSON file.
        #[arg(short, long, env = "LUMISPEC_CATALOG", default_value = "catalog.json")]
        catalog: PathBuf,
    },
    /// Build the series → models map from a product-list spreadsheet.
    Series {
        /// Path to the xlsx file (first worksheet is read).
        input: PathBuf,
        /// Write the series map to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// Catalog PDF path (extract) or screenshot folder path (scan).
    input: PathBuf,

    /// Write the catalog JSON to this file.
    #[arg(short, long, env = "LUMISPEC_CATALOG", default_value = "catalog.json")]
    output: PathBuf,

    /// Load the existing output catalog first and append to it.
    #[arg(long)]
    append: bool,

    /// Vision LLM model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Longest edge of the unit image in pixels (scan default: 2000).
    #[arg(long, env = "LUMISPEC_MAX_IMAGE_EDGE")]
    max_image_edge: Option<u32>,

    /// JPEG quality 1-100 (scan default: 90).
    #[arg(long, env = "LUMISPEC_JPEG_QUALITY")]
    jpeg_quality: Option<u8>,

    /// Max LLM output tokens per unit.
    #[arg(long, env = "LUMISPEC_MAX_TOKENS", default_value_t = 1600)]
    max_tokens: usize,

    /// LLM temperature (0.0-2.0).
    #[arg(long, env = "LUMISPEC_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per grounding attempt on LLM failure.
    #[arg(long, env = "LUMISPEC_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Print the batch report as JSON to stdout.
    #[arg(long, env = "LUMISPEC_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "LUMISPEC_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Keyword, matched against series and model (any whitespace token).
    /// Empty matches the whole catalog.
    #[arg(default_value = "")]
    keyword: String,

    /// Path to the persisted catalog JSON file.
    #[arg(short, long, env = "LUMISPEC_CATALOG", default_value = "catalog.json")]
    catalog: PathBuf,

    /// Wattage range, lo:hi.
    #[arg(long)]
    watt: Option<String>,

    /// Colour-temperature range in kelvin, lo:hi.
    #[arg(long)]
    cct: Option<String>,

    /// Beam-angle range in degrees, lo:hi.
    #[arg(long)]
    beam: Option<String>,

    /// Luminous-flux range in lumen, lo:hi.
    #[arg(long)]
    lumen: Option<String>,

    /// Price range, lo:hi. Time-price records compare as 0.
    #[arg(long)]
    price: Option<String>,

    /// Maximum number of records returned.
    #[arg(long, default_value_t = 50)]
    top_k: usize,

    /// Print the full outcome envelope as JSON.
    #[arg(long, env = "LUMISPEC_JSON")]
    json: bool,

    /// Also ask the model whether the keyword is a series or a model code
    /// (requires a configured provider; never changes the results).
    #[arg(long)]
    classify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        match cli.command {
            Command::Extract(ref a) | Command::Scan(ref a) if !a.no_progress && !a.json => "error",
            _ => "info",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract(ref args) => run_extract(&cli, args, PromptProfile::Catalog).await,
        Command::Scan(ref args) => run_extract(&cli, args, PromptProfile::PriceTable).await,
        Command::Query(ref args) => run_query_cmd(args).await,
        Command::Status { ref catalog } => run_status(catalog),
        Command::Series { ref input, ref output } => run_series(input, output.as_deref()),
    }
}

async fn run_extract(cli: &Cli, args: &ExtractArgs, profile: PromptProfile) -> Result<()> {
    let config = build_config(cli, args, profile)?;
    let client = ProviderClient::resolve(&config).context("No usable LLM provider")?;

    let output: BatchOutput = match profile {
        PromptProfile::Catalog => extract_pdf(&args.input, &client, &config)
            .await
            .context("Extraction failed")?,
        PromptProfile::PriceTable => extract_image_folder(&args.input, &client, &config)
            .await
            .context("Extraction failed")?,
    };

    let store = CatalogStore::new();
    if args.append && args.output.exists() {
        let prior = store
            .reload(&args.output)
            .with_context(|| format!("Failed to reload {:?} for --append", args.output))?;
        if !cli.quiet {
            eprintln!("{} {} existing records loaded", dim("·"), prior);
        }
    }
    store.merge_from_batch(output.records);
    let written = store
        .persist(&args.output)
        .context("Failed to write catalog")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.report).context("Failed to serialise report")?
        );
    }

    if !cli.quiet {
        let r = &output.report;
        eprintln!(
            "{}  {}/{} units  {} records (+{} dropped)  {}ms  →  {}",
            if r.fail_units == 0 { green("✔") } else { cyan("⚠") },
            r.success_units,
            r.total_units,
            bold(&r.records_added.to_string()),
            r.dropped_candidates,
            r.duration_ms,
            bold(&args.output.display().to_string()),
        );
        eprintln!("   {} records in catalog", dim(&written.to_string()));
    }

    if output.report.success_units == 0 && output.report.total_units > 0 {
        anyhow::bail!("every unit failed — see the log above");
    }
    Ok(())
}

async fn run_query_cmd(args: &QueryArgs) -> Result<()> {
    let store = CatalogStore::new();
    // A missing catalog is reported through the outcome envelope, not as a
    // hard error; queries never fail.
    if args.catalog.exists() {
        store
            .reload(&args.catalog)
            .with_context(|| format!("Failed to load catalog {:?}", args.catalog))?;
    }

    let params = QueryParams {
        keyword: args.keyword.clone(),
        watt: parse_range(args.watt.as_deref(), "--watt")?,
        cct: parse_range(args.cct.as_deref(), "--cct")?,
        beam: parse_range(args.beam.as_deref(), "--beam")?,
        lumen: parse_range(args.lumen.as_deref(), "--lumen")?,
        price: parse_range(args.price.as_deref(), "--price")?,
        top_k: args.top_k,
    };

    let outcome = run_query(&store, &params);

    if args.classify && !args.keyword.trim().is_empty() {
        let config = ExtractionConfig::default();
        let client = ProviderClient::resolve(&config).context("No usable LLM provider")?;
        let kind = classify_keyword(&client, &args.keyword, &config).await;
        eprintln!("{} keyword kind: {:?}", cyan("◆"), kind);
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
        );
        return Ok(());
    }

    if !outcome.ok {
        eprintln!("{} {}", red("✗"), outcome.message);
        return Ok(());
    }

    eprintln!("{} {}", green("✔"), outcome.message);
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for item in &outcome.items {
        writeln!(
            handle,
            "{:<24} {:<16} {:>6}W {:>6}K {:>5}° {:>7}lm  {}",
            item.model,
            item.series,
            item.watt,
            item.cct,
            item.beam,
            item.lumen,
            serde_json::to_string(&item.price).unwrap_or_default(),
        )
        .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn run_status(catalog: &PathBuf) -> Result<()> {
    let store = CatalogStore::new();
    if catalog.exists() {
        store
            .reload(catalog)
            .with_context(|| format!("Failed to load catalog {:?}", catalog))?;
    }
    let status = store.status();
    println!("Catalog:  {}", catalog.display());
    println!("Loaded:   {}", status.loaded);
    println!("Records:  {}", status.count);
    Ok(())
}

fn run_series(input: &PathBuf, output: Option<&std::path::Path>) -> Result<()> {
    let map = load_series_map(input).context("Failed to load series spreadsheet")?;
    let json = serde_json::to_string_pretty(&map).context("Failed to serialise series map")?;

    match output {
        Some(path) => {
            std::fs::write(path, json.as_bytes())
                .with_context(|| format!("Failed to write {path:?}"))?;
            eprintln!(
                "{} {} series written to {}",
                green("✔"),
                bold(&map.len().to_string()),
                bold(&path.display().to_string())
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, args: &ExtractArgs, profile: PromptProfile) -> Result<ExtractionConfig> {
    // Price screenshots carry dense tables; default to a larger, crisper
    // image unless the caller overrides.
    let (default_edge, default_quality) = match profile {
        PromptProfile::Catalog => (1280, 80),
        PromptProfile::PriceTable => (2000, 90),
    };

    let show_progress = !cli.quiet && !args.no_progress && !args.json;

    let mut builder = ExtractionConfig::builder()
        .profile(profile)
        .max_image_edge(args.max_image_edge.unwrap_or(default_edge))
        .jpeg_quality(args.jpeg_quality.unwrap_or(default_quality))
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .retry(RetryPolicy {
            max_retries: args.max_retries,
            ..Default::default()
        });

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new_dynamic());
    }

    builder.build().context("Invalid configuration")
}

/// Parse a `lo:hi` range flag; either endpoint may be omitted.
fn parse_range(s: Option<&str>, flag: &str) -> Result<RangeBound> {
    let Some(s) = s else {
        return Ok(RangeBound::open());
    };
    let s = s.trim();

    let (lo_s, hi_s) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("{flag} expects lo:hi (either side may be empty), got '{s}'"))?;

    let lo = if lo_s.trim().is_empty() {
        f64::MIN
    } else {
        lo_s.trim()
            .parse::<f64>()
            .with_context(|| format!("Invalid lower bound for {flag}: '{lo_s}'"))?
    };
    let hi = if hi_s.trim().is_empty() {
        f64::MAX
    } else {
        hi_s.trim()
            .parse::<f64>()
            .with_context(|| format!("Invalid upper bound for {flag}: '{hi_s}'"))?
    };

    if lo > hi {
        anyhow::bail!("{flag} range is inverted: {lo} > {hi}");
    }
    Ok(RangeBound::closed(lo, hi))
}
