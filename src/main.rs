use clap::{Parser, Subcommand};
use std::path::PathBuf;
use survey_pipeline::cache::CacheStore;
use survey_pipeline::checks;
use survey_pipeline::config::PipelineConfig;
use survey_pipeline::logging;
use survey_pipeline::metrics::FacadeMetrics;
use survey_pipeline::pipeline::{PipelineRunner, RunParams};
use tracing::error;

#[derive(Parser)]
#[command(name = "survey_pipeline")]
#[command(about = "Survey data pipeline: load → sample → validate → transform → enrich → cache")]
#[command(version = "0.1.0")]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline against an input location
    Run {
        /// Path to a CSV file, a zip archive, or a directory containing both
        #[arg(long, short)]
        input: PathBuf,
        /// Sample percentage in (0, 100]; defaults to the configured fraction
        #[arg(long)]
        sample_pct: Option<f64>,
        /// Random seed for stratified sampling; defaults to the configured seed
        #[arg(long)]
        seed: Option<u64>,
        /// Skip building the SQLite cache
        #[arg(long)]
        skip_cache: bool,
    },
    /// Print cache statistics
    CacheStats,
    /// Run cache health checks
    Check,
}

fn load_config(path: &Option<PathBuf>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(PipelineConfig::load(p)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            input,
            sample_pct,
            seed,
            skip_cache,
        } => {
            let sample_pct = sample_pct.unwrap_or(config.sample_pct * 100.0);
            let seed = seed.unwrap_or(config.seed);
            if !(sample_pct > 0.0 && sample_pct <= 100.0) {
                eprintln!("Error: --sample-pct must be in (0, 100]");
                std::process::exit(1);
            }
            println!("🔄 Running survey pipeline...");

            let metrics = FacadeMetrics;
            let runner = PipelineRunner::with_metrics(&config, &metrics);
            let params = RunParams {
                input,
                sample_pct: sample_pct / 100.0,
                seed,
                skip_cache,
            };
            let progress = |line: &str| println!("{line}");
            let report = runner.run(&params, Some(&progress))?;

            println!("\n📊 Pipeline Results for run {}:", report.run_id);
            for stage in &report.stages {
                println!("   {}: {} rows", stage.stage_name(), stage.rows_out());
            }
            match &report.cache {
                Some(outcome) if outcome.ok => println!(
                    "   Cache: {} rows, {}",
                    outcome.rows,
                    outcome.path.as_deref().unwrap_or("")
                ),
                Some(outcome) => println!(
                    "   ⚠️  Cache error: {}",
                    outcome.message.as_deref().unwrap_or("unknown")
                ),
                None => {}
            }

            if !report.ok {
                error!("pipeline run failed: {:?}", report.error);
                println!(
                    "❌ Pipeline failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }
            println!("✅ Pipeline completed successfully");
        }
        Commands::CacheStats => {
            let stats = CacheStore::from_config(&config).stats();
            if !stats.exists {
                println!("No cache found at {}", stats.path);
            } else {
                println!("Cache stats:");
                println!("  Rows: {}", stats.rows);
                println!("  Size: {:.2} MB", stats.size_bytes as f64 / (1024.0 * 1024.0));
                println!("  Built at: {}", stats.built_at);
                println!("  Source: {}", stats.source);
                println!("  Years: {}", stats.years);
            }
        }
        Commands::Check => {
            let store = CacheStore::from_config(&config);
            let mut failed = false;
            for result in checks::run_all(&store, &config) {
                let icon = if result.passed { "✅" } else { "❌" };
                println!("{icon} {}: {}", result.name, result.message);
                failed |= !result.passed;
            }
            if failed {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
