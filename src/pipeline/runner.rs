//! Run orchestrator: drives load → sample → validate → transform → enrich
//! → cache, persisting a stage artifact after each stage and a run report
//! at the end regardless of outcome.

use crate::cache::CacheStore;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::{names, MetricsSink, NoopMetrics};
use crate::pipeline::sample::SampleOptions;
use crate::pipeline::stats::{RunReport, StageStats};
use crate::pipeline::{artifacts, enrich, loader, sample, transform, validate};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

static NOOP_METRICS: NoopMetrics = NoopMetrics;

#[derive(Debug, Clone)]
pub struct RunParams {
    /// CSV file, zip archive, or directory of sources.
    pub input: PathBuf,
    /// Sampling fraction in (0, 1].
    pub sample_pct: f64,
    pub seed: u64,
    pub skip_cache: bool,
}

pub struct PipelineRunner<'a> {
    config: &'a PipelineConfig,
    metrics: &'a dyn MetricsSink,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            metrics: &NOOP_METRICS,
        }
    }

    pub fn with_metrics(config: &'a PipelineConfig, metrics: &'a dyn MetricsSink) -> Self {
        Self { config, metrics }
    }

    /// Run the full pipeline. Returns `Err` only for caller-side parameter
    /// problems; every failure past that point comes back as a persisted
    /// report with `ok: false` and the terminal error message.
    pub fn run(
        &self,
        params: &RunParams,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<RunReport> {
        if !(params.sample_pct > 0.0 && params.sample_pct <= 1.0) {
            return Err(PipelineError::Config(format!(
                "sample_pct must be in (0, 1], got {}",
                params.sample_pct
            )));
        }
        self.config.ensure_dirs()?;

        let run_id = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let mut report = RunReport::begin(
            run_id.clone(),
            params.input.display().to_string(),
            params.sample_pct,
            params.seed,
        );
        self.metrics.counter(names::RUNS_STARTED, 1);

        let say = |line: &str| {
            info!("{}", line.trim_start());
            if let Some(callback) = progress {
                callback(line);
            }
        };
        say(&format!("Data Pipeline Run: {run_id}"));

        match self.execute_stages(&mut report, params, &say) {
            Ok(()) => {
                report.ok = true;
                self.metrics.counter(names::RUNS_SUCCEEDED, 1);
                say(&format!("Pipeline completed: {run_id}"));
            }
            Err(e) => {
                error!("pipeline run {run_id} failed: {e}");
                say(&format!("  ERROR: {e}"));
                report.error = Some(e.to_string());
                self.metrics.counter(names::RUNS_FAILED, 1);
            }
        }
        report.finished_at = Some(Utc::now());

        // A run must never disappear without a trace: the report is written
        // before returning, success or failure.
        match artifacts::save_run_report(&self.config.stage_root(), &report) {
            Ok(path) => say(&format!("Run report: {}", path.display())),
            Err(e) => warn!("failed to persist run report: {e}"),
        }
        Ok(report)
    }

    fn execute_stages(
        &self,
        report: &mut RunReport,
        params: &RunParams,
        say: &dyn Fn(&str),
    ) -> Result<()> {
        let config = self.config;
        let stage_root = config.stage_root();
        let run_id = report.run_id.clone();

        // 1. Load. Archive expansion uses run-scoped scratch storage that is
        // released when the TempDir drops, on failure as well as success.
        say("[1/6] Loading data...");
        let timer = Instant::now();
        let scratch = tempfile::tempdir()?;
        let files = loader::discover_source_files(&params.input, scratch.path())?;
        say(&format!("  Found {} CSV file(s)", files.len()));
        let options = loader::LoaderOptions::from_config(config);
        let (loaded, load_stats) =
            loader::load_files(&files, &config.year_column, &options, &mut |line| say(line))?;
        drop(scratch);
        say(&format!(
            "  Total: {} rows, {} columns",
            loaded.len(),
            loaded.columns().len()
        ));
        self.metrics.counter(names::ROWS_LOADED, loaded.len() as u64);
        self.metrics
            .counter(names::FILES_SKIPPED, load_stats.files_skipped.len() as u64);
        let stats = StageStats::Load(load_stats);
        artifacts::save_stage_artifact(&stage_root, &run_id, &stats, &loaded)?;
        report.stages.push(stats);
        self.metrics
            .timing(names::STAGE_DURATION_SECONDS, timer.elapsed().as_secs_f64());

        // 2. Sample first to reduce volume before the heavier stages.
        say(&format!(
            "\n[2/6] Stratified sampling ({}% by role)...",
            report.sample_pct
        ));
        let timer = Instant::now();
        let sample_options = SampleOptions {
            sample_pct: params.sample_pct,
            min_per_stratum: config.min_per_stratum,
            seed: params.seed,
        };
        let (sampled, sample_stats) = sample::stratified_sample(&loaded, config, &sample_options)?;
        say(&format!(
            "  {} → {} rows ({}% reduction)",
            sample_stats.rows_in, sample_stats.rows_out, sample_stats.reduction_pct
        ));
        self.metrics
            .counter(names::ROWS_SAMPLED, sampled.len() as u64);
        let stats = StageStats::Sample(sample_stats);
        artifacts::save_stage_artifact(&stage_root, &run_id, &stats, &sampled)?;
        report.stages.push(stats);
        self.metrics
            .timing(names::STAGE_DURATION_SECONDS, timer.elapsed().as_secs_f64());

        // 3. Validate.
        say("\n[3/6] Validating data...");
        let timer = Instant::now();
        let (valid, quarantine, validate_stats) = validate::validate(&sampled, config)?;
        say(&format!(
            "  Valid: {}, Quarantined: {}",
            validate_stats.rows_valid, validate_stats.rows_quarantined
        ));
        self.metrics
            .counter(names::ROWS_QUARANTINED, quarantine.len() as u64);
        let stats = StageStats::Validate(validate_stats);
        artifacts::save_stage_artifact(&stage_root, &run_id, &stats, &valid)?;
        artifacts::save_quarantine(&stage_root, &run_id, &quarantine)?;
        report.stages.push(stats);
        self.metrics
            .timing(names::STAGE_DURATION_SECONDS, timer.elapsed().as_secs_f64());

        // 4. Transform.
        say("\n[4/6] Transforming data...");
        let timer = Instant::now();
        let (transformed, transform_stats) = transform::transform(&valid, config)?;
        say(&format!(
            "  Transforms: {}",
            transform_stats.transforms_applied.len()
        ));
        let stats = StageStats::Transform(transform_stats);
        artifacts::save_stage_artifact(&stage_root, &run_id, &stats, &transformed)?;
        report.stages.push(stats);
        self.metrics
            .timing(names::STAGE_DURATION_SECONDS, timer.elapsed().as_secs_f64());

        // 5. Enrich.
        say("\n[5/6] Enriching data...");
        let timer = Instant::now();
        let source_label = format!("pipeline-{run_id}");
        let (enriched, enrich_stats) = enrich::enrich(&transformed, config, &source_label)?;
        say(&format!("  Fields added: {:?}", enrich_stats.fields_added));
        let stats = StageStats::Enrich(enrich_stats);
        artifacts::save_stage_artifact(&stage_root, &run_id, &stats, &enriched)?;
        report.stages.push(stats);
        self.metrics
            .timing(names::STAGE_DURATION_SECONDS, timer.elapsed().as_secs_f64());

        // 6. Materialize the cache. Failures are recorded in the report,
        // never raised.
        if params.skip_cache {
            say("\n[6/6] Skipping cache build");
            return Ok(());
        }
        say("\n[6/6] Building SQLite cache...");
        let store = CacheStore::from_config(config);
        let outcome = store.materialize(
            &enriched,
            &format!("{}% stratified sample", report.sample_pct),
        );
        if outcome.ok {
            say(&format!(
                "  Cache: {} rows, {}",
                outcome.rows,
                outcome.path.as_deref().unwrap_or("")
            ));
            self.metrics.counter(names::CACHE_BUILDS_SUCCESS, 1);
            self.metrics
                .counter(names::CACHE_ROWS_WRITTEN, outcome.rows as u64);
        } else {
            say(&format!(
                "  Cache error: {}",
                outcome.message.as_deref().unwrap_or("unknown")
            ));
            self.metrics.counter(names::CACHE_BUILDS_ERROR, 1);
        }
        report.cache = Some(outcome);
        Ok(())
    }
}
