//! Metrics capability for the pipeline.
//!
//! The orchestrator holds a `MetricsSink` reference and emits best-effort
//! counters and timings through it. The default `NoopMetrics` keeps runs
//! independently testable; `FacadeMetrics` forwards to the `metrics` macro
//! facade for processes that install a recorder.

/// Metric names, following Prometheus naming conventions.
pub mod names {
    pub const RUNS_STARTED: &str = "survey_pipeline_runs_started_total";
    pub const RUNS_SUCCEEDED: &str = "survey_pipeline_runs_succeeded_total";
    pub const RUNS_FAILED: &str = "survey_pipeline_runs_failed_total";
    pub const ROWS_LOADED: &str = "survey_pipeline_rows_loaded_total";
    pub const ROWS_SAMPLED: &str = "survey_pipeline_rows_sampled_total";
    pub const ROWS_QUARANTINED: &str = "survey_pipeline_rows_quarantined_total";
    pub const FILES_SKIPPED: &str = "survey_pipeline_files_skipped_total";
    pub const STAGE_DURATION_SECONDS: &str = "survey_pipeline_stage_duration_seconds";
    pub const CACHE_BUILDS_SUCCESS: &str = "survey_pipeline_cache_builds_success_total";
    pub const CACHE_BUILDS_ERROR: &str = "survey_pipeline_cache_builds_error_total";
    pub const CACHE_ROWS_WRITTEN: &str = "survey_pipeline_cache_rows_written";
}

/// Fire-and-forget metrics sink. Implementations must never fail the
/// pipeline: all methods are infallible and swallow sink-side problems.
pub trait MetricsSink: Send + Sync {
    fn counter(&self, name: &'static str, value: u64);
    fn timing(&self, name: &'static str, seconds: f64);
    fn event(&self, event_type: &'static str, detail: &str);
}

/// Discards everything. The default for library callers and tests.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter(&self, _name: &'static str, _value: u64) {}
    fn timing(&self, _name: &'static str, _seconds: f64) {}
    fn event(&self, _event_type: &'static str, _detail: &str) {}
}

/// Forwards to the `metrics` macro facade. A no-op unless the hosting
/// process installs a recorder.
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn counter(&self, name: &'static str, value: u64) {
        ::metrics::counter!(name).increment(value);
    }

    fn timing(&self, name: &'static str, seconds: f64) {
        ::metrics::histogram!(name).record(seconds);
    }

    fn event(&self, event_type: &'static str, detail: &str) {
        ::metrics::counter!(event_type).increment(1);
        tracing::debug!(event = event_type, detail = detail, "pipeline event");
    }
}
