//! Enrichment: derived, non-destructive columns only.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::schema;
use crate::pipeline::stats::EnrichStats;
use crate::pipeline::transform::{normalize_year, parse_numeric};
use crate::table::Table;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

/// Fixed country → region lookup. Unmapped countries bucket to "Other".
static REGION_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("United States", "North America"),
        ("Canada", "North America"),
        ("Mexico", "North America"),
        ("United Kingdom", "Europe"),
        ("Germany", "Europe"),
        ("France", "Europe"),
        ("Netherlands", "Europe"),
        ("Spain", "Europe"),
        ("Italy", "Europe"),
        ("Poland", "Europe"),
        ("Sweden", "Europe"),
        ("India", "Asia"),
        ("China", "Asia"),
        ("Japan", "Asia"),
        ("Singapore", "Asia"),
        ("Australia", "Oceania"),
        ("New Zealand", "Oceania"),
        ("Brazil", "South America"),
        ("Argentina", "South America"),
        ("South Africa", "Africa"),
        ("Nigeria", "Africa"),
    ])
});

/// Experience tier over right-closed bins (-1, 2, 5, 10, 20, 100].
pub fn experience_bucket(years: f64) -> Option<&'static str> {
    if years <= -1.0 || years > 100.0 {
        None
    } else if years <= 2.0 {
        Some("0-2 years")
    } else if years <= 5.0 {
        Some("3-5 years")
    } else if years <= 10.0 {
        Some("6-10 years")
    } else if years <= 20.0 {
        Some("11-20 years")
    } else {
        Some("20+ years")
    }
}

/// Compensation tier over right-closed bins (-1, 50k, 100k, 150k, 200k, ∞].
pub fn compensation_tier(amount: f64) -> Option<&'static str> {
    if amount <= -1.0 {
        None
    } else if amount <= 50_000.0 {
        Some("<50k")
    } else if amount <= 100_000.0 {
        Some("50-100k")
    } else if amount <= 150_000.0 {
        Some("100-150k")
    } else if amount <= 200_000.0 {
        Some("150-200k")
    } else {
        Some("200k+")
    }
}

/// Add derived fields and process-provenance metadata. Never removes rows.
pub fn enrich(
    table: &Table,
    config: &PipelineConfig,
    source_label: &str,
) -> Result<(Table, EnrichStats)> {
    let check = schema::enrich_contract(config).check(table);
    if !check.missing_optional.is_empty() {
        debug!("enrich: absent optional columns {:?}", check.missing_optional);
    }

    let mut out = table.clone();
    let mut fields = Vec::new();

    if out.has_column(&config.year_column) {
        out.derive_column(&config.year_column, "year_label", |v| {
            v.map(normalize_year)
        });
        fields.push("year_label".to_string());
    }

    if out.has_column(&config.country_column) {
        out.derive_column(&config.country_column, "region_group", |v| {
            let region = v
                .and_then(|c| REGION_MAP.get(c.trim()).copied())
                .unwrap_or("Other");
            Some(region.to_string())
        });
        fields.push("region_group".to_string());
    }

    if out.has_column(&config.experience_column) {
        out.derive_column(&config.experience_column, "experience_bucket", |v| {
            v.and_then(parse_numeric)
                .and_then(experience_bucket)
                .map(str::to_string)
        });
        fields.push("experience_bucket".to_string());
    }

    if out.has_column(&config.comp_tier_column) {
        out.derive_column(&config.comp_tier_column, "comp_tier", |v| {
            v.and_then(parse_numeric)
                .and_then(compensation_tier)
                .map(str::to_string)
        });
        fields.push("comp_tier".to_string());
    }

    out.set_column("_source", source_label);
    out.set_column("_enriched_at", &Utc::now().to_rfc3339());
    fields.push("_source".to_string());
    fields.push("_enriched_at".to_string());

    let stats = EnrichStats {
        rows_in: table.len(),
        rows_out: out.len(),
        fields_added: fields,
    };
    Ok((out, stats))
}
