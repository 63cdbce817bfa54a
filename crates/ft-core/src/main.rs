//! Frame Tally Core - context counting engine
//!
//! The main entry point for ft-core, handling:
//! - Number set catalog inspection
//! - Training a model from a token corpus
//! - Querying the trained model for one frame
//! - Configuration inspection and validation

use clap::{Args, Parser, Subcommand};
use ft_combinatorics::{
    dependent_subsets, dependent_to_string, is_bridge, is_sequence, set_to_string,
    set_to_string_position, subsets_for_window, NumberSetFamily, MAX_WINDOW,
};
use ft_common::error::{format_error_human, StructuredError};
use ft_common::{Error, OutputFormat, Result, ValueId};
use ft_config::{
    check_dependent_budget, load_config, validate_trainer, AccumulatorKind, ConfigSource,
    TrainerConfig, CONFIG_SCHEMA_VERSION,
};
use ft_core::encoding::{DefaultTokenEncoder, TokenEncoder, EMPTY_VECT};
use ft_core::exit_codes::ExitCode;
use ft_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use ft_core::log_event;
use ft_core::train::{Example, Frame, Model, Prediction, TrainSummary, TrainingAggregator};
use ft_core::vectset::StoreStats;
use serde::Serialize;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Frame Tally Core - count which value follows which context
#[derive(Parser)]
#[command(name = "ft-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Trainer config file (falls back to FRAME_TALLY_CONFIG, XDG, /etc)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the number sets a window and family produce
    Catalog(CatalogArgs),

    /// Train a model from a whitespace-tokenized corpus
    Train(TrainArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Positions per frame
    #[arg(long, short = 'w', default_value_t = 5)]
    window: usize,

    /// Predicted position inside the window
    #[arg(long, default_value_t = 2)]
    focus: usize,

    /// Number set family
    #[arg(long, default_value = "all")]
    family: NumberSetFamily,

    /// Also list dependent layouts with this many tiers
    #[arg(long, default_value_t = 0)]
    dependent: usize,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Corpus file, one sequence per line ("-" for stdin)
    input: PathBuf,

    /// Tokens are `word/label`; the label is the value to learn.
    /// Without this the value is the token after the focus.
    #[arg(long)]
    labeled: bool,

    /// Override window_size
    #[arg(long, short = 'w')]
    window: Option<usize>,

    /// Override focus
    #[arg(long)]
    focus: Option<usize>,

    /// Override the number set family
    #[arg(long)]
    family: Option<NumberSetFamily>,

    /// Override the accumulator kind
    #[arg(long)]
    accumulator: Option<AccumulatorKind>,

    /// Override worker thread count
    #[arg(long)]
    workers: Option<usize>,

    /// Drop contexts seen at most this many times (full window kept)
    #[arg(long)]
    min_total: Option<u32>,

    /// Compact the vector set store after training
    #[arg(long)]
    compact: bool,

    /// Frame to predict after training: window_size tokens, `_` for empty
    #[arg(long)]
    query: Option<String>,

    /// How many of the most frequent values to report
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Print the JSON schema of trainer.json
    Schema,

    /// Validate a config file (or the resolved one)
    Validate {
        /// File to validate
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Catalog(args) => run_catalog(&cli.global, args),
        Commands::Train(args) => run_train(&cli.global, args),
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Output helpers
// ============================================================================

/// Print `value` as JSON; `jsonl` prints one compact line.
fn print_json<T: Serialize>(global: &GlobalOpts, value: &T) -> Result<()> {
    let text = match global.format {
        OutputFormat::Jsonl => serde_json::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    };
    println!("{}", text);
    Ok(())
}

/// Output an error in the appropriate format.
fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    let structured = StructuredError::from(err);
    match global.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&structured) {
            Ok(text) => eprintln!("{}", text),
            Err(_) => eprintln!("{}", structured.to_json()),
        },
        OutputFormat::Jsonl => eprintln!("{}", structured.to_json()),
        OutputFormat::Summary => eprintln!("error {}: {}", err.code(), err),
        OutputFormat::Md => {
            let color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, color));
        }
    }
    ExitCode::from(err)
}

fn finish(global: &GlobalOpts, result: Result<ExitCode>) -> ExitCode {
    result.unwrap_or_else(|e| report_error(global, &e))
}

// ============================================================================
// catalog
// ============================================================================

#[derive(Serialize)]
struct CatalogEntry {
    set_number: usize,
    offsets: Vec<usize>,
    pattern: String,
    context: bool,
    sequence: bool,
    bridge: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependent: Vec<String>,
}

#[derive(Serialize)]
struct CatalogReport {
    schema_version: &'static str,
    window: usize,
    focus: usize,
    family: NumberSetFamily,
    count: usize,
    sets: Vec<CatalogEntry>,
}

fn run_catalog(global: &GlobalOpts, args: &CatalogArgs) -> ExitCode {
    finish(global, catalog(global, args))
}

fn catalog(global: &GlobalOpts, args: &CatalogArgs) -> Result<ExitCode> {
    if subsets_for_window(args.window).is_none() {
        return Err(Error::WindowOutOfRange {
            window: args.window,
            max: MAX_WINDOW,
        });
    }
    if args.focus >= args.window {
        return Err(Error::InvalidConfig {
            field: "focus".to_string(),
            message: format!("must be below the window size {}", args.window),
        });
    }
    check_dependent_budget(args.window, args.dependent)?;

    let sets: Vec<CatalogEntry> = args
        .family
        .sets(args.window, args.focus)
        .into_iter()
        .enumerate()
        .map(|(n, set)| CatalogEntry {
            set_number: n,
            pattern: set_to_string_position(&set, args.window, args.focus),
            context: !set.contains(&args.focus),
            sequence: is_sequence(&set),
            bridge: is_bridge(&set),
            dependent: if args.dependent > 0 {
                dependent_subsets(&set, args.dependent)
                    .iter()
                    .skip(1)
                    .map(|layout| dependent_to_string(layout))
                    .collect()
            } else {
                Vec::new()
            },
            offsets: set,
        })
        .collect();

    tracing::info!(
        target: event_names::CATALOG_BUILT,
        window = args.window,
        focus = args.focus,
        family = %args.family,
        count = sets.len(),
        "catalog built"
    );

    let report = CatalogReport {
        schema_version: CONFIG_SCHEMA_VERSION,
        window: args.window,
        focus: args.focus,
        family: args.family,
        count: sets.len(),
        sets,
    };

    match global.format {
        OutputFormat::Json => print_json(global, &report)?,
        OutputFormat::Jsonl => {
            for entry in &report.sets {
                print_json(global, entry)?;
            }
        }
        OutputFormat::Summary => {
            println!(
                "catalog: window={} focus={} family={} sets={}",
                report.window, report.focus, report.family, report.count
            );
        }
        OutputFormat::Md => {
            println!("# Number sets (window {}, focus {})", report.window, report.focus);
            println!();
            println!("| # | offsets | pattern | context | sequence | bridge |");
            println!("|---|---------|---------|---------|----------|--------|");
            for e in &report.sets {
                println!(
                    "| {} | {} | `{}` | {} | {} | {} |",
                    e.set_number,
                    set_to_string(&e.offsets),
                    e.pattern,
                    e.context,
                    e.sequence,
                    e.bridge
                );
                for layout in &e.dependent {
                    println!("|   | {} | | | | |", layout);
                }
            }
        }
    }
    Ok(ExitCode::Clean)
}

// ============================================================================
// train
// ============================================================================

/// Examples read from a corpus plus the text behind each value id.
struct Corpus {
    examples: Vec<Example>,
    labels: HashMap<ValueId, String>,
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        Ok(std::io::read_to_string(std::io::stdin())?)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// One example per position of every non-empty line.
///
/// Labeled corpora learn each token's label; plain corpora learn the token
/// that follows the focus, so the last token of a line yields no example.
fn parse_corpus(text: &str, window: usize, focus: usize, labeled: bool) -> Corpus {
    let encoder = DefaultTokenEncoder;
    let mut examples = Vec::new();
    let mut labels = HashMap::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let (words, values): (Vec<&str>, Vec<&str>) = if labeled {
            tokens
                .iter()
                .map(|&t| t.rsplit_once('/').unwrap_or((t, t)))
                .unzip()
        } else {
            (tokens.clone(), tokens.iter().skip(1).copied().collect())
        };
        let sequence: Vec<i32> = words.iter().map(|w| encoder.token_vid(w)).collect();
        for (position, label) in values.into_iter().enumerate() {
            let value = ValueId::from(encoder.token_vid(label));
            labels.entry(value).or_insert_with(|| label.to_string());
            let frame = Frame::from_sequence(&sequence, position, window, focus);
            examples.push(Example::new(frame, value));
        }
    }

    Corpus { examples, labels }
}

/// Frame from a `--query` string; `_` marks an empty position.
fn parse_query(query: &str, window: usize, focus: usize) -> Result<Frame> {
    let encoder = DefaultTokenEncoder;
    let values: Vec<i32> = query
        .split_whitespace()
        .map(|t| if t == "_" { EMPTY_VECT } else { encoder.token_vid(t) })
        .collect();
    if values.len() != window {
        return Err(Error::FrameMismatch {
            expected: window,
            actual: values.len(),
        });
    }
    Ok(Frame::new(values, focus))
}

#[derive(Serialize)]
struct ValueReport {
    value: ValueId,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    count: u32,
    probability: f64,
}

#[derive(Serialize)]
struct CompactionReport {
    slots: usize,
    unchanged: bool,
}

#[derive(Serialize)]
struct PredictionReport {
    set_number: usize,
    offsets: String,
    total: u32,
    value: ValueReport,
}

#[derive(Serialize)]
struct TrainReport {
    schema_version: &'static str,
    run_id: String,
    model_id: String,
    generated_at: String,
    config_source: String,
    window_size: usize,
    focus: usize,
    accumulator: AccumulatorKind,
    number_sets: usize,
    accumulators: usize,
    summary: TrainSummary,
    store: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pruned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compaction: Option<CompactionReport>,
    top_values: Vec<ValueReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predictions: Option<Vec<PredictionReport>>,
}

fn run_train(global: &GlobalOpts, args: &TrainArgs) -> ExitCode {
    finish(global, train(global, args))
}

fn resolved_config(global: &GlobalOpts) -> Result<(TrainerConfig, ConfigSource)> {
    Ok(load_config(global.config.as_deref())?)
}

fn train(global: &GlobalOpts, args: &TrainArgs) -> Result<ExitCode> {
    let ctx = LogContext::new(generate_run_id(), get_host_id());
    log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "train run started");

    let (mut cfg, source) = match resolved_config(global) {
        Ok(loaded) => loaded,
        Err(e) => {
            log_event!(ctx, ERROR, event_names::CONFIG_ERROR, Stage::Init, "config rejected", code = e.code());
            return Err(e);
        }
    };
    if source == ConfigSource::BuiltinDefault {
        log_event!(ctx, DEBUG, event_names::CONFIG_DEFAULT_USED, Stage::Init, "using builtin config");
    } else {
        log_event!(ctx, INFO, event_names::CONFIG_LOADED, Stage::Init, "config loaded", source = tracing::field::display(source));
    }

    if let Some(window) = args.window {
        cfg.window_size = window;
    }
    if let Some(focus) = args.focus {
        cfg.focus = focus;
    }
    if let Some(family) = args.family {
        cfg.number_sets.family = family;
    }
    if let Some(kind) = args.accumulator {
        cfg.accumulator = kind;
    }
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }

    let mut model = Model::new(cfg)?;
    let ctx = ctx.with_model_id(model.id().to_string());
    let window = model.window();
    let focus = model.focus();
    let query = args
        .query
        .as_deref()
        .map(|q| parse_query(q, window, focus))
        .transpose()?;

    let corpus = parse_corpus(&read_input(&args.input)?, window, focus, args.labeled);
    let summary = {
        let aggregator = TrainingAggregator::new(&model);
        aggregator.train_parallel(&corpus.examples, model.config().workers)?;
        aggregator.stats()
    };

    let pruned = args
        .min_total
        .map(|max| model.remove_below_total(max))
        .transpose()?;
    let compaction = if args.compact {
        let map = model.optimize_vect_sets()?;
        Some(CompactionReport {
            slots: map.len(),
            unchanged: map.is_identity(),
        })
    } else {
        None
    };

    let value_report = |value: ValueId, count: u32, probability: f64| ValueReport {
        value,
        label: corpus.labels.get(&value).cloned(),
        count,
        probability,
    };
    let top_values = model
        .default_accumulator()?
        .val_ps_sorted()
        .into_iter()
        .take(args.top)
        .map(|vp| value_report(vp.value, vp.count, vp.probability))
        .collect();
    let predictions = match &query {
        Some(frame) => Some(
            model
                .predict(frame)?
                .into_iter()
                .map(|p: Prediction| PredictionReport {
                    set_number: p.set_number.0,
                    offsets: set_to_string(&p.number_set),
                    total: p.total,
                    value: value_report(p.best.value, p.best.count, p.best.probability),
                })
                .collect(),
        ),
        None => None,
    };

    let report = TrainReport {
        schema_version: CONFIG_SCHEMA_VERSION,
        run_id: ctx.run_id.clone(),
        model_id: model.id().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        config_source: source.to_string(),
        window_size: window,
        focus,
        accumulator: model.config().accumulator,
        number_sets: model.indices().len(),
        accumulators: model.accumulator_count(),
        summary,
        store: model.store()?.stats(),
        pruned,
        compaction,
        top_values,
        predictions,
    };

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Train,
        "train run finished",
        trained = summary.trained,
        accumulators = report.accumulators
    );

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(global, &report)?,
        OutputFormat::Summary => {
            println!(
                "[{}] trained {}/{} examples, {} accumulators over {} number sets",
                report.model_id,
                summary.trained,
                summary.examples,
                report.accumulators,
                report.number_sets
            );
        }
        OutputFormat::Md => print_train_md(&report),
    }

    if summary.trained == 0 {
        Ok(ExitCode::NothingTrained)
    } else {
        Ok(ExitCode::Clean)
    }
}

fn print_train_md(report: &TrainReport) {
    let label = |v: &ValueReport| v.label.clone().unwrap_or_else(|| v.value.to_string());
    println!("# ft-core train");
    println!();
    println!("Model: {}", report.model_id);
    println!("Config: {}", report.config_source);
    println!(
        "Window: {} (focus {}), {} number sets, accumulator {}",
        report.window_size, report.focus, report.number_sets, report.accumulator
    );
    println!(
        "Examples: {} trained, {} skipped, {} accumulators",
        report.summary.trained, report.summary.skipped, report.accumulators
    );
    println!("Stored vectors: {}", report.store.live);
    println!();
    println!("## Most frequent values");
    println!();
    println!("| value | count | p |");
    println!("|-------|-------|---|");
    for v in &report.top_values {
        println!("| {} | {} | {:.4} |", label(v), v.count, v.probability);
    }
    if let Some(preds) = &report.predictions {
        println!();
        println!("## Predictions");
        println!();
        println!("| set | offsets | total | value | p |");
        println!("|-----|---------|-------|-------|---|");
        for p in preds {
            println!(
                "| {} | {} | {} | {} | {:.4} |",
                p.set_number,
                p.offsets,
                p.total,
                label(&p.value),
                p.value.probability
            );
        }
    }
}

// ============================================================================
// config
// ============================================================================

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    let result = match &args.command {
        ConfigCommands::Show => config_show(global),
        ConfigCommands::Schema => {
            print_json(global, &TrainerConfig::json_schema()).map(|_| ExitCode::Clean)
        }
        ConfigCommands::Validate { path } => config_validate(global, path.as_deref()),
    };
    finish(global, result)
}

/// Display the resolved configuration (defaults if no file is found).
fn config_show(global: &GlobalOpts) -> Result<ExitCode> {
    let (cfg, source) = resolved_config(global)?;
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": CONFIG_SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": source.to_string(),
                "using_defaults": source == ConfigSource::BuiltinDefault,
                "trainer": cfg,
            });
            print_json(global, &response)?;
        }
        OutputFormat::Summary => {
            println!(
                "config: source={} window={} focus={} family={} accumulator={}",
                source, cfg.window_size, cfg.focus, cfg.number_sets.family, cfg.accumulator
            );
        }
        OutputFormat::Md => {
            println!("# ft-core config show");
            println!();
            println!("Source: {}", source);
            println!();
            println!("```json");
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            println!("```");
        }
    }
    Ok(ExitCode::Clean)
}

/// Validate a config file. An explicit path must exist.
fn config_validate(global: &GlobalOpts, path: Option<&Path>) -> Result<ExitCode> {
    let (cfg, source) = match path {
        Some(p) => {
            let cfg = TrainerConfig::from_file(p)?;
            validate_trainer(&cfg)?;
            (cfg, p.display().to_string())
        }
        None => {
            let (cfg, source) = resolved_config(global)?;
            (cfg, source.to_string())
        }
    };
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": CONFIG_SCHEMA_VERSION,
                "status": "valid",
                "source": source,
                "window_size": cfg.window_size,
                "focus": cfg.focus,
            });
            print_json(global, &response)?;
        }
        OutputFormat::Summary => println!("config validate: OK ({})", source),
        OutputFormat::Md => {
            println!("# Configuration Validation");
            println!();
            println!("Status: ✓ Valid");
            println!("Source: {}", source);
        }
    }
    Ok(ExitCode::Clean)
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": CONFIG_SCHEMA_VERSION,
        "ft_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            if let Err(e) = print_json(global, &version_info) {
                report_error(global, &e);
            }
        }
        _ => {
            println!("ft-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", CONFIG_SCHEMA_VERSION);
        }
    }
}
