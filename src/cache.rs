//! SQLite cache store: the single live, queryable materialization of the
//! pipeline's final dataset.
//!
//! All values are serialized to TEXT before storage to avoid type-coercion
//! surprises on read-back. A successful materialization fully replaces the
//! previous snapshot.

use crate::config::{PipelineConfig, DATA_TABLE, META_TABLE};
use crate::error::{PipelineError, Result};
use crate::pipeline::transform::normalize_year;
use crate::table::{Row, Table};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a cache build. Failures are reported here, never raised past
/// the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBuildOutcome {
    pub ok: bool,
    pub rows: usize,
    pub path: Option<String>,
    pub years: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub exists: bool,
    pub path: String,
    pub rows: usize,
    pub size_bytes: u64,
    pub built_at: String,
    pub source: String,
    pub years: String,
}

pub struct CacheStore {
    path: PathBuf,
    year_column: String,
}

impl CacheStore {
    pub fn new(path: PathBuf, year_column: impl Into<String>) -> Self {
        Self {
            path,
            year_column: year_column.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cache_path(), config.year_column.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the dataset and its metadata record, replacing any prior
    /// snapshot. Never returns an error: failures come back as
    /// `ok: false` with a message.
    pub fn materialize(&self, table: &Table, source: &str) -> CacheBuildOutcome {
        match self.write_snapshot(table, source) {
            Ok(years) => {
                info!(rows = table.len(), path = %self.path.display(), "cache materialized");
                CacheBuildOutcome {
                    ok: true,
                    rows: table.len(),
                    path: Some(self.path.display().to_string()),
                    years: Some(years),
                    message: None,
                }
            }
            Err(e) => {
                warn!("cache build failed: {e}");
                CacheBuildOutcome {
                    ok: false,
                    rows: 0,
                    path: None,
                    years: None,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    fn write_snapshot(&self, table: &Table, source: &str) -> Result<String> {
        if table.columns().is_empty() {
            return Err(PipelineError::Precondition(
                "nothing to materialize: dataset has no columns".to_string(),
            ));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let columns = table.columns();
        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;

        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {DATA_TABLE}; CREATE TABLE {DATA_TABLE} ({});",
            column_defs.join(", ")
        ))?;

        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let insert_sql = format!(
            "INSERT INTO {DATA_TABLE} ({}) VALUES ({})",
            column_list.join(", "),
            placeholders.join(", ")
        );
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in table.rows() {
                let values: Vec<&str> = columns.iter().map(|c| row.get(c).unwrap_or("")).collect();
                stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            }
        }

        let years = self.distinct_years(table);
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {META_TABLE} (key TEXT PRIMARY KEY, value TEXT); \
             DELETE FROM {META_TABLE};"
        ))?;
        tx.execute(
            &format!("INSERT INTO {META_TABLE} (key, value) VALUES (?1, ?2), (?3, ?4), (?5, ?6)"),
            params![
                "built_at",
                Utc::now().to_rfc3339(),
                "source",
                source,
                "years",
                years
            ],
        )?;
        tx.commit()?;
        Ok(years)
    }

    /// Sorted distinct-years summary, e.g. "2023, 2024".
    fn distinct_years(&self, table: &Table) -> String {
        if !table.has_column(&self.year_column) {
            return String::new();
        }
        let mut years = BTreeSet::new();
        for row in table.rows() {
            if let Some(value) = row.get(&self.year_column) {
                let year = normalize_year(value);
                if !year.is_empty() && year != "nan" && year != "None" {
                    years.insert(year);
                }
            }
        }
        years.into_iter().collect::<Vec<_>>().join(", ")
    }

    /// Read the full snapshot, or only rows matching one year. Returns
    /// `None` when no snapshot exists or the read fails.
    pub fn read(&self, year: Option<&str>) -> Option<Table> {
        if !self.path.exists() {
            return None;
        }
        self.try_read(year).ok()
    }

    fn try_read(&self, year: Option<&str>) -> Result<Table> {
        let conn = Connection::open(&self.path)?;
        let sql = match year {
            Some(_) => format!(
                "SELECT * FROM {DATA_TABLE} WHERE {} = ?1",
                quote_ident(&self.year_column)
            ),
            None => format!("SELECT * FROM {DATA_TABLE}"),
        };
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = match year {
            Some(y) => stmt.query(params![y])?,
            None => stmt.query(params![])?,
        };
        let mut table = Table::with_columns(columns.clone());
        while let Some(sql_row) = rows.next()? {
            let mut row = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value: Option<String> = sql_row.get(i)?;
                if let Some(v) = value {
                    if !v.is_empty() {
                        row.set(column.clone(), v);
                    }
                }
            }
            table.push_row(row);
        }
        Ok(table)
    }

    pub fn stats(&self) -> CacheStats {
        if !self.path.exists() {
            return CacheStats {
                exists: false,
                path: self.path.display().to_string(),
                ..CacheStats::default()
            };
        }
        match self.try_stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("cache stats read failed: {e}");
                CacheStats {
                    exists: true,
                    path: self.path.display().to_string(),
                    ..CacheStats::default()
                }
            }
        }
    }

    fn try_stats(&self) -> Result<CacheStats> {
        let size_bytes = fs::metadata(&self.path)?.len();
        let conn = Connection::open(&self.path)?;
        let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {DATA_TABLE}"), [], |r| {
            r.get(0)
        })?;

        let mut built_at = String::new();
        let mut source = String::new();
        let mut years = String::new();
        let mut stmt = conn.prepare(&format!("SELECT key, value FROM {META_TABLE}"))?;
        let mut meta_rows = stmt.query([])?;
        while let Some(row) = meta_rows.next()? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            match key.as_str() {
                "built_at" => built_at = value,
                "source" => source = value,
                "years" => years = value,
                _ => {}
            }
        }

        Ok(CacheStats {
            exists: true,
            path: self.path.display().to_string(),
            rows: rows as usize,
            size_bytes,
            built_at,
            source,
            years,
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
