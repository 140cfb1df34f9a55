//! Transformation: pure cleaning, no row removal.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::schema;
use crate::pipeline::stats::TransformStats;
use crate::table::Table;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

/// Fixed set of equivalences collapsing common country spellings.
static COUNTRY_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("USA", "United States"),
        ("United States of America", "United States"),
        ("UK", "United Kingdom"),
        ("Great Britain", "United Kingdom"),
    ])
});

/// Canonical year form: trimmed, trailing ".0" stripped.
pub fn normalize_year(value: &str) -> String {
    let trimmed = value.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Lenient numeric parse; non-finite values count as unparsable.
pub fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical numeric form: integral values render without a decimal part,
/// so re-parsing and re-formatting is a fixed point.
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Clean the dataset: canonical year format, compensation outlier nulling,
/// country alias collapsing, whitespace trimming, experience coercion.
/// Re-running on its own output changes nothing.
pub fn transform(table: &Table, config: &PipelineConfig) -> Result<(Table, TransformStats)> {
    let check = schema::transform_contract(config).check(table);
    if !check.missing_optional.is_empty() {
        debug!("transform: absent optional columns {:?}", check.missing_optional);
    }

    let mut out = table.clone();
    let mut applied = Vec::new();

    if out.has_column(&config.year_column) {
        out.map_column(&config.year_column, |v| normalize_year(v));
        applied.push(format!("normalized {}", config.year_column));
    }

    for column in &config.compensation_columns {
        if out.has_column(column) {
            let ceiling = config.compensation_ceiling;
            out.map_column(column, move |v| match parse_numeric(v) {
                Some(n) if n < 0.0 || n > ceiling => String::new(),
                Some(n) => format_numeric(n),
                None => String::new(),
            });
            applied.push(format!("cleaned {column}"));
        }
    }

    if out.has_column(&config.country_column) {
        out.map_column(&config.country_column, |v| {
            match COUNTRY_ALIASES.get(v.trim()) {
                Some(canonical) => canonical.to_string(),
                None => v.to_string(),
            }
        });
        applied.push(format!("normalized {}", config.country_column));
    }

    let columns: Vec<String> = out.columns().to_vec();
    for column in &columns {
        out.map_column(column, |v| {
            let trimmed = v.trim();
            if trimmed == "nan" || trimmed == "None" {
                String::new()
            } else {
                trimmed.to_string()
            }
        });
    }
    applied.push(format!("stripped whitespace ({} columns)", columns.len()));

    if out.has_column(&config.experience_column) {
        out.map_column(&config.experience_column, |v| {
            parse_numeric(v).map(format_numeric).unwrap_or_default()
        });
        applied.push(format!("converted {} to numeric", config.experience_column));
    }

    let stats = TransformStats {
        rows_in: table.len(),
        rows_out: out.len(),
        transforms_applied: applied,
    };
    Ok((out, stats))
}
