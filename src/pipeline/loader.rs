//! Input discovery and loading.
//!
//! A location may be a single CSV file, a zip archive, or a directory tree
//! mixing both. Archives are expanded into a run-scoped scratch area before
//! scanning; discovery is recursive and the result sorted so pipeline
//! behavior never depends on filesystem iteration order.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::stats::LoadStats;
use crate::table::{Row, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::ZipArchive;

static DEFAULT_YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})").expect("static pattern is valid"));

/// Strategy for resolving the survey year of a source file. A resolved year
/// is stamped onto every row of that file only when the file itself lacks
/// the year column.
#[derive(Debug, Clone)]
pub enum YearResolver {
    /// Trust the data: never stamp a year.
    ColumnOnly,
    /// Extract a year token from the file name.
    FilenamePattern(Regex),
    /// Stamp a caller-supplied year on every file.
    Fixed(String),
}

impl Default for YearResolver {
    fn default() -> Self {
        YearResolver::FilenamePattern(DEFAULT_YEAR_PATTERN.clone())
    }
}

impl YearResolver {
    pub fn resolve(&self, path: &Path) -> Option<String> {
        match self {
            YearResolver::ColumnOnly => None,
            YearResolver::FilenamePattern(pattern) => {
                let name = path.file_name()?.to_string_lossy();
                pattern.captures(&name).and_then(|caps| {
                    caps.get(caps.len() - 1).map(|m| m.as_str().to_string())
                })
            }
            YearResolver::Fixed(year) => Some(year.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Skip files whose name contains "schema".
    pub skip_schema_files: bool,
    pub year_resolver: YearResolver,
}

impl LoaderOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            skip_schema_files: config.skip_schema_files,
            year_resolver: YearResolver::default(),
        }
    }
}

/// Discover every tabular source file reachable from `input`. Archives are
/// expanded under `scratch`, each into its own subdirectory keyed by the
/// archive name. Zero discoverable files is a precondition failure.
pub fn discover_source_files(input: &Path, scratch: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    if input.is_file() {
        if has_extension(input, "csv") {
            found.push(input.to_path_buf());
        } else if has_extension(input, "zip") {
            let dest = expansion_dir(scratch, input);
            extract_archive(input, &dest)?;
            collect_files(&dest, "csv", &mut found)?;
        }
    } else if input.is_dir() {
        collect_files(input, "csv", &mut found)?;
        let mut archives = Vec::new();
        collect_files(input, "zip", &mut archives)?;
        archives.sort();
        for archive in archives {
            let dest = expansion_dir(scratch, &archive);
            extract_archive(&archive, &dest)?;
            collect_files(&dest, "csv", &mut found)?;
        }
    } else {
        return Err(PipelineError::Precondition(format!(
            "input path does not exist: {}",
            input.display()
        )));
    }

    found.sort();
    found.dedup();
    if found.is_empty() {
        return Err(PipelineError::Precondition(format!(
            "no CSV files found in {} (looked for .csv and .zip)",
            input.display()
        )));
    }
    Ok(found)
}

/// Load and concatenate the discovered files. A file that fails to parse is
/// skipped with a diagnostic; the stage only fails when nothing loads.
pub fn load_files(
    files: &[PathBuf],
    year_column: &str,
    options: &LoaderOptions,
    progress: &mut dyn FnMut(&str),
) -> Result<(Table, LoadStats)> {
    let mut combined = Table::new();
    let mut stats = LoadStats {
        files_discovered: files.len(),
        files_loaded: 0,
        files_skipped: Vec::new(),
        rows: 0,
        columns: 0,
    };

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if options.skip_schema_files && name.to_lowercase().contains("schema") {
            progress(&format!("  Skipping schema file: {name}"));
            stats.files_skipped.push(format!("{name}: schema file"));
            continue;
        }

        match read_csv_table(file) {
            Ok(mut table) => {
                if !table.has_column(year_column) {
                    if let Some(year) = options.year_resolver.resolve(file) {
                        table.set_column(year_column, &year);
                    }
                }
                progress(&format!("  Loaded {name}: {} rows", table.len()));
                stats.files_loaded += 1;
                combined.append(table);
            }
            Err(e) => {
                warn!("failed to load {name}: {e}");
                progress(&format!("  Error loading {name}: {e}"));
                stats.files_skipped.push(format!("{name}: {e}"));
            }
        }
    }

    if combined.is_empty() {
        return Err(PipelineError::Precondition("no data loaded".to_string()));
    }
    stats.rows = combined.len();
    stats.columns = combined.columns().len();
    Ok((combined, stats))
}

fn read_csv_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut table = Table::with_columns(headers.clone());
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (i, field) in record.iter().enumerate() {
            if let Some(column) = headers.get(i) {
                if !field.is_empty() {
                    row.set(column.clone(), field.to_string());
                }
            }
        }
        table.push_row(row);
    }
    Ok(table)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Scratch subdirectory for one archive, keyed by archive name. Appends a
/// counter when two archives share a stem.
fn expansion_dir(scratch: &Path, archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    let mut dest = scratch.join(&stem);
    let mut suffix = 1;
    while dest.exists() {
        suffix += 1;
        dest = scratch.join(format!("{stem}_{suffix}"));
    }
    dest
}

fn extract_archive(path: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

fn collect_files(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, ext, out)?;
        } else if has_extension(&path, ext) {
            out.push(path);
        }
    }
    Ok(())
}
