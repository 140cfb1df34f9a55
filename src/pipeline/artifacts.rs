//! Stage artifact and run report persistence.
//!
//! Every stage leaves a durable checkpoint behind: the output dataset
//! snapshot, its typed stats, and a manifest with a content checksum so an
//! audit can verify a snapshot without re-running the pipeline.

use crate::config;
use crate::error::{PipelineError, Result};
use crate::pipeline::stats::{RunReport, StageStats};
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub stage: String,
    pub run_id: String,
    pub rows: usize,
    pub columns: usize,
    pub sha256: String,
    pub written_at: DateTime<Utc>,
}

/// Serialize a table to CSV bytes: header row, then cells in column order
/// with missing cells as empty fields.
pub fn table_to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    if table.columns().is_empty() {
        return Ok(Vec::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        let record: Vec<&str> = table
            .columns()
            .iter()
            .map(|c| row.get(c).unwrap_or(""))
            .collect();
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|e| {
        PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })
}

/// Persist one stage's checkpoint under `<stage_root>/<run_id>/<stage>/`.
/// Returns the artifact directory.
pub fn save_stage_artifact(
    stage_root: &Path,
    run_id: &str,
    stats: &StageStats,
    table: &Table,
) -> Result<PathBuf> {
    let dir = stage_root.join(run_id).join(stats.stage_name());
    fs::create_dir_all(&dir)?;

    let bytes = table_to_csv_bytes(table)?;
    fs::write(dir.join("output.csv"), &bytes)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let manifest = ArtifactManifest {
        stage: stats.stage_name().to_string(),
        run_id: run_id.to_string(),
        rows: table.len(),
        columns: table.columns().len(),
        sha256: hex::encode(hasher.finalize()),
        written_at: Utc::now(),
    };
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_vec_pretty(&manifest)?,
    )?;
    fs::write(dir.join("stats.json"), serde_json::to_vec_pretty(stats)?)?;
    Ok(dir)
}

/// Quarantined rows ride along with the validate artifact for inspection.
pub fn save_quarantine(stage_root: &Path, run_id: &str, quarantine: &Table) -> Result<()> {
    let dir = stage_root.join(run_id).join(config::STAGE_VALIDATE);
    fs::create_dir_all(&dir)?;
    let bytes = table_to_csv_bytes(quarantine)?;
    fs::write(dir.join("quarantine.csv"), bytes)?;
    Ok(())
}

/// Persist the run report as `run_<id>.json` under the stage root.
pub fn save_run_report(stage_root: &Path, report: &RunReport) -> Result<PathBuf> {
    fs::create_dir_all(stage_root)?;
    let path = stage_root.join(format!("run_{}.json", report.run_id));
    fs::write(&path, serde_json::to_vec_pretty(report)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::LoadStats;
    use crate::table::Row;
    use tempfile::tempdir;

    fn small_table() -> Table {
        let mut table = Table::with_columns(["a", "b"]);
        let mut row = Row::new();
        row.set("a", "1");
        table.push_row(row);
        table
    }

    #[test]
    fn test_artifact_layout_and_checksum() {
        let dir = tempdir().unwrap();
        let stats = StageStats::Load(LoadStats {
            files_discovered: 1,
            files_loaded: 1,
            files_skipped: vec![],
            rows: 1,
            columns: 2,
        });
        let artifact_dir =
            save_stage_artifact(dir.path(), "20240101_000000", &stats, &small_table()).unwrap();

        let csv_bytes = fs::read(artifact_dir.join("output.csv")).unwrap();
        assert_eq!(String::from_utf8_lossy(&csv_bytes), "a,b\n1,\n");

        let manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(artifact_dir.join("manifest.json")).unwrap()).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(&csv_bytes);
        assert_eq!(manifest.sha256, hex::encode(hasher.finalize()));
        assert_eq!(manifest.rows, 1);

        let stats_back: StageStats =
            serde_json::from_slice(&fs::read(artifact_dir.join("stats.json")).unwrap()).unwrap();
        assert_eq!(stats_back.stage_name(), config::STAGE_LOAD);
    }

    #[test]
    fn test_run_report_round_trip() {
        let dir = tempdir().unwrap();
        let report = RunReport::begin("20240101_000000".into(), "input".into(), 0.05, 42);
        let path = save_run_report(dir.path(), &report).unwrap();
        let back: RunReport = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(back.run_id, report.run_id);
        assert!(!back.ok);
    }
}
