//! CLI entry point for vecprobe.
//!
//! Provides commands for generating vector data, running exact and IVF
//! searches over it, and benchmarking the strategies against each other.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use tracing_subscriber::EnvFilter;

use vecprobe::bench::{AllocationTracker, BenchmarkHarness};
use vecprobe::config::{DEFAULT_CONFIG_FILE, Settings};
use vecprobe::display::{
    THEME, create_benchmark_progress, create_benchmark_table, create_results_table,
    create_samples_table, with_spinner,
};
use vecprobe::io::{
    ExitCode, generate_clustered, generate_uniform, load_queries, load_store, save_records,
};
use vecprobe::vector::{DistanceMetric, IndexState, SearchStrategy, VectorError, VectorSearchEngine};
use vecprobe::{AppError, AppResult};

#[global_allocator]
static GLOBAL: AllocationTracker = AllocationTracker;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Exact and IVF nearest-neighbor search with benchmarking
#[derive(Parser)]
#[command(
    name = "vecprobe",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compare exact and IVF vector search on latency, memory and recall",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to a settings file (default: ./vecprobe.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write random vector records to a JSON file
    #[command(
        after_help = "Examples:\n  vecprobe generate -o elements.json --count 20000 --dimension 512\n  vecprobe generate -o queries.json --count 10 --dimension 512 --seed 7"
    )]
    Generate {
        /// Output file
        #[arg(short, long, default_value = "elements.json")]
        output: PathBuf,

        /// Number of vectors (overrides generate.count)
        #[arg(long)]
        count: Option<usize>,

        /// Components per vector (overrides generate.dimension)
        #[arg(long)]
        dimension: Option<usize>,

        /// Lower bound of each component (overrides generate.low)
        #[arg(long, allow_hyphen_values = true)]
        low: Option<f64>,

        /// Upper bound of each component (overrides generate.high)
        #[arg(long, allow_hyphen_values = true)]
        high: Option<f64>,

        /// RNG seed; random when omitted
        #[arg(long)]
        seed: Option<u64>,

        /// Scatter vectors around this many centers instead of uniformly
        #[arg(long)]
        centers: Option<usize>,

        /// Per-component noise around each center
        #[arg(long, default_value_t = 0.05, requires = "centers")]
        noise: f64,
    },

    /// Find the nearest records for every query vector
    Search {
        /// Record file: [{"id": ..., "vector": [...]}]
        #[arg(short, long)]
        records: PathBuf,

        /// Query file: [{"vector": [...]}]
        #[arg(short, long)]
        queries: PathBuf,

        #[arg(short, long, value_enum, default_value_t = StrategyKind::Exact)]
        strategy: StrategyKind,

        #[command(flatten)]
        search: SearchArgs,

        /// Clusters scanned per query (overrides index.num_probe)
        #[arg(long)]
        probe: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Benchmark exact search against IVF at one or more probe counts
    #[command(
        after_help = "Example:\n  vecprobe bench -r elements.json -q queries.json --clusters 100 --probe 1 --probe 10 --probe 100"
    )]
    Bench {
        #[arg(short, long)]
        records: PathBuf,

        #[arg(short, long)]
        queries: PathBuf,

        #[command(flatten)]
        search: SearchArgs,

        /// Probe counts to benchmark, one IVF strategy each (default: index.num_probe)
        #[arg(long)]
        probe: Vec<usize>,

        /// Measured runs per strategy (overrides benchmark.repetitions)
        #[arg(long)]
        repetitions: Option<usize>,

        /// Unmeasured runs per strategy (overrides benchmark.warmup)
        #[arg(long)]
        warmup: Option<usize>,

        /// Also print every run's samples
        #[arg(long)]
        samples: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Neighbors per query (overrides search.k)
    #[arg(short)]
    k: Option<usize>,

    /// Distance metric (overrides search.metric)
    #[arg(long)]
    metric: Option<DistanceMetric>,

    /// IVF cluster count (overrides index.num_clusters)
    #[arg(long)]
    clusters: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    Exact,
    Ivf,
}

impl SearchArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(k) = self.k {
            settings.search.k = k;
        }
        if let Some(metric) = self.metric {
            settings.search.metric = metric;
        }
        if let Some(clusters) = self.clusters {
            settings.index.num_clusters = clusters;
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => return report_error(AppError::from(e)),
    };
    init_tracing(&settings.log_level);

    match run(cli, settings) {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => report_error(e),
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(error: AppError) -> std::process::ExitCode {
    eprintln!("{}", THEME.error_with_icon(&error.to_string()));
    for suggestion in error.recovery_suggestions() {
        eprintln!("  {}", THEME.apply(&THEME.dim, suggestion));
    }
    tracing::debug!(status = error.status_code(), "command failed");
    ExitCode::from_error(&error).into()
}

fn run(cli: Cli, mut settings: Settings) -> AppResult<()> {
    match cli.command {
        Commands::Generate {
            output,
            count,
            dimension,
            low,
            high,
            seed,
            centers,
            noise,
        } => {
            let generate = &mut settings.generate;
            generate.count = count.unwrap_or(generate.count);
            generate.dimension = dimension.unwrap_or(generate.dimension);
            generate.low = low.unwrap_or(generate.low);
            generate.high = high.unwrap_or(generate.high);
            let seed = seed.unwrap_or_else(rand::random);
            run_generate(&output, &settings, seed, centers, noise)
        }
        Commands::Search {
            records,
            queries,
            strategy,
            search,
            probe,
            json,
        } => {
            search.apply(&mut settings);
            if let Some(probe) = probe {
                settings.index.num_probe = probe;
            }
            run_search(&records, &queries, strategy, &settings, json)
        }
        Commands::Bench {
            records,
            queries,
            search,
            probe,
            repetitions,
            warmup,
            samples,
        } => {
            search.apply(&mut settings);
            if let Some(repetitions) = repetitions {
                settings.benchmark.repetitions = repetitions;
            }
            if let Some(warmup) = warmup {
                settings.benchmark.warmup = warmup;
            }
            let probes = if probe.is_empty() {
                vec![settings.index.num_probe]
            } else {
                probe
            };
            run_bench(&records, &queries, &probes, &settings, samples)
        }
        Commands::Config { save } => run_config(&settings, cli.config.as_deref(), save),
    }
}

fn run_generate(
    output: &Path,
    settings: &Settings,
    seed: u64,
    centers: Option<usize>,
    noise: f64,
) -> AppResult<()> {
    let generate = &settings.generate;
    let records = match centers {
        Some(centers) => generate_clustered(
            generate.count,
            generate.dimension,
            centers,
            generate.high - generate.low,
            noise,
            seed,
        )?,
        None => generate_uniform(
            generate.count,
            generate.dimension,
            generate.low,
            generate.high,
            seed,
        )?,
    };
    save_records(output, &records)?;

    println!(
        "{}",
        THEME.success_with_icon(&format!(
            "Saved {} vectors of dimension {} to {}",
            records.len(),
            generate.dimension,
            output.display()
        ))
    );
    Ok(())
}

fn run_search(
    records: &Path,
    queries: &Path,
    strategy: StrategyKind,
    settings: &Settings,
    json: bool,
) -> AppResult<()> {
    let engine = load_engine(records, settings)?;
    let queries = load_queries(queries)?;
    let k = settings.search.k;

    let results = match strategy {
        StrategyKind::Exact => engine.search_batch_exact(&queries, k)?,
        StrategyKind::Ivf => {
            build_index(&engine, settings.index.num_clusters)?;
            engine.search_batch_approximate(&queries, k, settings.index.num_probe)?
        }
    };

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &results)
            .map_err(|e| AppError::Output(e.into()))?;
        writeln!(stdout).map_err(AppError::Output)?;
    } else {
        writeln!(stdout, "{}", create_results_table(&results)).map_err(AppError::Output)?;
    }
    Ok(())
}

fn run_bench(
    records: &Path,
    queries: &Path,
    probes: &[usize],
    settings: &Settings,
    print_samples: bool,
) -> AppResult<()> {
    let engine = load_engine(records, settings)?;
    let queries = load_queries(queries)?;
    let k = settings.search.k;

    // Probe counts are validated before the expensive build
    if let Some(&zero) = probes.iter().find(|&&p| p == 0) {
        return Err(VectorError::invalid_parameter(
            "num_probe",
            format!("probe counts must be at least 1, got {zero}"),
        )
        .into());
    }

    build_index(&engine, settings.index.num_clusters)?;
    let index = engine.index().ok_or(VectorError::IndexNotBuilt {
        state: IndexState::Untrained,
    })?;

    let exact = engine.exact();
    let probed: Vec<_> = probes.iter().map(|&p| index.with_probe(p)).collect();
    let mut strategies: Vec<&dyn SearchStrategy> = vec![&exact];
    strategies.extend(probed.iter().map(|p| p as &dyn SearchStrategy));

    let harness = BenchmarkHarness::new(settings.benchmark.clone())?;
    tracing::info!(probe = harness.probe_name(), "measuring peak memory");
    let progress = create_benchmark_progress(strategies.len() as u64);
    let reports = harness.compare_with(
        &strategies,
        Some(&exact as &dyn SearchStrategy),
        &queries,
        k,
        |report| {
            progress.set_message(report.strategy_name.clone());
            progress.inc(1);
        },
    );
    progress.finish_and_clear();
    let reports = reports?;

    println!(
        "{}",
        THEME.apply(
            &THEME.header,
            format!(
                "{} records, {} queries, k={k}, metric={}",
                engine.store().size(),
                queries.len(),
                engine.metric()
            )
        )
    );
    println!("{}", create_benchmark_table(&reports));
    if print_samples {
        for report in &reports {
            println!("{}", THEME.apply(&THEME.header, &report.strategy_name));
            println!("{}", create_samples_table(report));
        }
    }
    Ok(())
}

fn run_config(settings: &Settings, source: Option<&Path>, save: Option<PathBuf>) -> AppResult<()> {
    let source = source.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    println!(
        "{} {}",
        THEME.apply(&THEME.header, "Effective settings from"),
        THEME.apply(&THEME.path, source.display())
    );
    println!("{}", settings.to_toml()?);

    if let Some(path) = save {
        settings.save(&path)?;
        println!(
            "{}",
            THEME.success_with_icon(&format!("Saved to {}", path.display()))
        );
    }
    Ok(())
}

fn load_engine(records: &Path, settings: &Settings) -> AppResult<VectorSearchEngine> {
    let store = load_store(records)?;
    Ok(VectorSearchEngine::with_store(
        store,
        settings.search.metric,
        settings.index.kmeans(),
    ))
}

fn build_index(engine: &VectorSearchEngine, num_clusters: usize) -> AppResult<()> {
    with_spinner(
        &format!("Training IVF index with {num_clusters} clusters"),
        || engine.build_index(num_clusters),
    )?;
    Ok(())
}
