//! Health checks over the cache snapshot, for post-run verification.

use crate::cache::CacheStore;
use crate::config::PipelineConfig;
use crate::pipeline::transform::normalize_year;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

pub fn run_all(store: &CacheStore, config: &PipelineConfig) -> Vec<CheckResult> {
    vec![
        cache_exists(store),
        cache_readable(store),
        cache_required_columns(store, config),
        cache_years_consistent(store, config),
    ]
}

fn cache_exists(store: &CacheStore) -> CheckResult {
    let exists = store.exists();
    CheckResult {
        name: "cache_exists",
        passed: exists,
        message: if exists {
            "Cache file exists".to_string()
        } else {
            format!("Cache file not found at {}", store.path().display())
        },
    }
}

fn cache_readable(store: &CacheStore) -> CheckResult {
    match store.read(None) {
        Some(table) if !table.is_empty() => CheckResult {
            name: "cache_readable",
            passed: true,
            message: format!("Cache readable, {} rows", table.len()),
        },
        _ => CheckResult {
            name: "cache_readable",
            passed: false,
            message: "Cache unreadable or empty".to_string(),
        },
    }
}

fn cache_required_columns(store: &CacheStore, config: &PipelineConfig) -> CheckResult {
    let table = match store.read(None) {
        Some(table) if !table.is_empty() => table,
        _ => {
            return CheckResult {
                name: "cache_required_columns",
                passed: false,
                message: "No data to validate".to_string(),
            }
        }
    };
    let mut expected = config.required_columns.clone();
    expected.push(config.role_column.clone());
    let missing: Vec<String> = expected
        .into_iter()
        .filter(|c| !table.has_column(c))
        .collect();
    CheckResult {
        name: "cache_required_columns",
        passed: missing.is_empty(),
        message: if missing.is_empty() {
            "Required columns present".to_string()
        } else {
            format!("Missing columns: {missing:?}")
        },
    }
}

fn cache_years_consistent(store: &CacheStore, config: &PipelineConfig) -> CheckResult {
    let table = match store.read(None) {
        Some(table) if !table.is_empty() => table,
        _ => {
            return CheckResult {
                name: "cache_years_consistent",
                passed: false,
                message: "No data to validate".to_string(),
            }
        }
    };
    if !table.has_column(&config.year_column) {
        return CheckResult {
            name: "cache_years_consistent",
            passed: true,
            message: "No year column in snapshot".to_string(),
        };
    }

    let data_years: BTreeSet<String> = table
        .rows()
        .iter()
        .filter_map(|r| r.get(&config.year_column))
        .map(normalize_year)
        .filter(|y| !y.is_empty())
        .collect();
    let meta_years: BTreeSet<String> = store
        .stats()
        .years
        .split(", ")
        .filter(|y| !y.is_empty())
        .map(|y| y.to_string())
        .collect();

    let passed = data_years == meta_years;
    CheckResult {
        name: "cache_years_consistent",
        passed,
        message: if passed {
            format!("Years metadata matches data: {meta_years:?}")
        } else {
            format!("Metadata years {meta_years:?} != data years {data_years:?}")
        },
    }
}
