//! Typed per-stage statistics and the accumulated run report.

use crate::cache::CacheBuildOutcome;
use crate::config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStats {
    pub files_discovered: usize,
    pub files_loaded: usize,
    /// Per-file diagnostics for sources that failed to parse or were skipped.
    pub files_skipped: Vec<String>,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumCount {
    pub original: usize,
    pub sampled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleStats {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Sampling fraction as a percentage, for humans.
    pub sample_pct: f64,
    pub reduction_pct: f64,
    pub strata: BTreeMap<String, StratumCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateStats {
    pub rows_in: usize,
    pub rows_valid: usize,
    pub rows_quarantined: usize,
    pub duplicates_removed: usize,
    pub id_duplicates_removed: usize,
    pub issues: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformStats {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Ordered human-readable log of applied transforms.
    pub transforms_applied: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichStats {
    pub rows_in: usize,
    pub rows_out: usize,
    pub fields_added: Vec<String>,
}

/// Statistics record for one completed stage. The tag makes each persisted
/// stats.json self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageStats {
    Load(LoadStats),
    Sample(SampleStats),
    Validate(ValidateStats),
    Transform(TransformStats),
    Enrich(EnrichStats),
}

impl StageStats {
    /// Artifact directory key for this stage.
    pub fn stage_name(&self) -> &'static str {
        match self {
            StageStats::Load(_) => config::STAGE_LOAD,
            StageStats::Sample(_) => config::STAGE_SAMPLE,
            StageStats::Validate(_) => config::STAGE_VALIDATE,
            StageStats::Transform(_) => config::STAGE_TRANSFORM,
            StageStats::Enrich(_) => config::STAGE_ENRICH,
        }
    }

    pub fn rows_out(&self) -> usize {
        match self {
            StageStats::Load(s) => s.rows,
            StageStats::Sample(s) => s.rows_out,
            StageStats::Validate(s) => s.rows_valid,
            StageStats::Transform(s) => s.rows_out,
            StageStats::Enrich(s) => s.rows_out,
        }
    }
}

/// Accumulated record of one pipeline execution. Created at run start,
/// appended to as stages complete, persisted at run end regardless of
/// outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub input_path: String,
    /// Sampling fraction as a percentage, for humans.
    pub sample_pct: f64,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageStats>,
    pub cache: Option<CacheBuildOutcome>,
    pub ok: bool,
    pub error: Option<String>,
}

impl RunReport {
    pub fn begin(run_id: String, input_path: String, sample_pct: f64, seed: u64) -> Self {
        Self {
            run_id,
            input_path,
            sample_pct: sample_pct * 100.0,
            seed,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            cache: None,
            ok: false,
            error: None,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage_name() == name)
    }
}
