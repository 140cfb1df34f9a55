//! Stratified sampling by primary role.
//!
//! Runs first in the pipeline to reduce volume before the heavier stages.
//! Each stratum draws from its own deterministic generator keyed by the run
//! seed and the stratum name, so sampled row identity is reproducible and
//! independent of map iteration order.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::schema;
use crate::pipeline::stats::{SampleStats, StratumCount};
use crate::rng::{stable_hash_str, DeterministicRng};
use crate::table::Table;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy)]
pub struct SampleOptions {
    /// Sampling fraction in (0, 1].
    pub sample_pct: f64,
    /// Every stratum keeps at least this many rows (or all, if smaller).
    pub min_per_stratum: usize,
    pub seed: u64,
}

/// First `;`-separated role token, or "Unknown" when the cell is missing or
/// blank.
pub fn primary_role(value: Option<&str>) -> String {
    let raw = match value {
        Some(v) => v.trim(),
        None => return "Unknown".to_string(),
    };
    if raw.is_empty() || raw == "nan" || raw == "None" {
        return "Unknown".to_string();
    }
    let first = raw.split(';').next().unwrap_or("").trim();
    if first.is_empty() {
        "Unknown".to_string()
    } else {
        first.to_string()
    }
}

/// Draw `max(m, min(n, round(n·p)))` rows without replacement from each
/// stratum. Output concatenates the per-stratum draws in stratum first-seen
/// order; within a stratum sampled rows keep their relative input order.
pub fn stratified_sample(
    table: &Table,
    config: &PipelineConfig,
    options: &SampleOptions,
) -> Result<(Table, SampleStats)> {
    schema::sample_contract(config).enforce(table)?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        let role = primary_role(row.get(&config.role_column));
        if !groups.contains_key(&role) {
            order.push(role.clone());
        }
        groups.entry(role).or_default().push(i);
    }

    let mut out = table.select(&[]);
    let mut strata = BTreeMap::new();
    for role in &order {
        let indices = &groups[role];
        let n = indices.len();
        let target = (n as f64 * options.sample_pct).round() as usize;
        let k = options.min_per_stratum.max(target.min(n));

        let chosen: Vec<usize> = if k >= n {
            indices.clone()
        } else {
            let mut rng = DeterministicRng::new(stable_hash_str(options.seed, role));
            let mut picks = rand::seq::index::sample(&mut rng, n, k).into_vec();
            picks.sort_unstable();
            picks.into_iter().map(|p| indices[p]).collect()
        };

        strata.insert(
            role.clone(),
            StratumCount {
                original: n,
                sampled: chosen.len(),
            },
        );
        out.append(table.select(&chosen));
    }

    let rows_in = table.len();
    let rows_out = out.len();
    let reduction_pct = if rows_in == 0 {
        0.0
    } else {
        ((1.0 - rows_out as f64 / rows_in as f64) * 1000.0).round() / 10.0
    };
    let stats = SampleStats {
        rows_in,
        rows_out,
        sample_pct: options.sample_pct * 100.0,
        reduction_pct,
        strata,
    };
    Ok((out, stats))
}
