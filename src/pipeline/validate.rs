//! Validation: de-duplication and quality quarantine.
//!
//! Rows failing the key-column null-fraction rule are never dropped; they
//! are routed to the quarantine partition and retained for inspection.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::schema;
use crate::pipeline::stats::ValidateStats;
use crate::table::Table;

/// Deduplicate and partition rows into (valid, quarantine). Missing
/// required columns degrade to a recorded issue; downstream stages may then
/// fail on their own contracts.
pub fn validate(table: &Table, config: &PipelineConfig) -> Result<(Table, Table, ValidateStats)> {
    let rows_in = table.len();
    let mut issues = Vec::new();

    let check = schema::validate_contract(config).check(table);
    if !check.missing_required.is_empty() {
        issues.push(format!("Missing columns: {:?}", check.missing_required));
    }

    let mut work = table.clone();
    let duplicates_removed = work.dedup_exact();
    if duplicates_removed > 0 {
        issues.push(format!("Removed {duplicates_removed} duplicate rows"));
    }

    let mut id_duplicates_removed = 0;
    if work.has_column(&config.id_column) {
        id_duplicates_removed = work.dedup_by_column(&config.id_column);
        if id_duplicates_removed > 0 {
            issues.push(format!(
                "Removed {} duplicate {} values",
                id_duplicates_removed, config.id_column
            ));
        }
    }

    let key_columns: Vec<String> = config
        .key_columns()
        .into_iter()
        .filter(|c| work.has_column(c))
        .collect();

    let (valid, quarantine) = if key_columns.is_empty() {
        let quarantine = Table::with_columns(work.columns().to_vec());
        (work, quarantine)
    } else {
        let threshold = config.quarantine_null_threshold;
        let key_count = key_columns.len() as f64;
        work.partition(|row| {
            let nulls = key_columns.iter().filter(|c| row.is_missing(c)).count() as f64;
            nulls / key_count <= threshold
        })
    };

    let stats = ValidateStats {
        rows_in,
        rows_valid: valid.len(),
        rows_quarantined: quarantine.len(),
        duplicates_removed,
        id_duplicates_removed,
        issues,
        columns: valid.columns().to_vec(),
    };
    Ok((valid, quarantine, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn full_row(id: &str, country: &str, role: &str, year: &str) -> Row {
        let mut row = Row::new();
        row.set("ResponseId", id);
        row.set("Country", country);
        row.set("DevType", role);
        row.set("survey_year", year);
        row
    }

    fn base_table() -> Table {
        let mut table =
            Table::with_columns(["ResponseId", "Country", "DevType", "survey_year"]);
        table.push_row(full_row("1", "Germany", "Data scientist", "2024"));
        table.push_row(full_row("2", "India", "Developer, back-end", "2024"));
        table.push_row(full_row("3", "Japan", "DevOps specialist", "2025"));
        table
    }

    #[test]
    fn test_exact_duplicates_removed() {
        let mut table = base_table();
        table.push_row(full_row("1", "Germany", "Data scientist", "2024"));
        let config = PipelineConfig::default();
        let (valid, _, stats) = validate(&table, &config).unwrap();
        assert_eq!(valid.len(), 3);
        assert_eq!(stats.duplicates_removed, 1);
        assert!(stats.issues.iter().any(|i| i.contains("duplicate rows")));
    }

    #[test]
    fn test_id_duplicates_keep_first() {
        let mut table = base_table();
        table.push_row(full_row("1", "France", "Data scientist", "2025"));
        let config = PipelineConfig::default();
        let (valid, _, stats) = validate(&table, &config).unwrap();
        assert_eq!(stats.id_duplicates_removed, 1);
        let first = valid
            .rows()
            .iter()
            .find(|r| r.get("ResponseId") == Some("1"))
            .unwrap();
        assert_eq!(first.get("Country"), Some("Germany"));
    }

    #[test]
    fn test_quarantine_partition_law() {
        let mut table = base_table();
        // Only the id present: 2 of 3 key columns null, fraction > 0.5.
        let mut sparse = Row::new();
        sparse.set("ResponseId", "4");
        table.push_row(sparse);
        // Role missing only: 1 of 3 null, stays valid.
        let mut partial = full_row("5", "Brazil", "", "2025");
        partial.remove("DevType");
        table.push_row(partial);

        let config = PipelineConfig::default();
        let (valid, quarantine, stats) = validate(&table, &config).unwrap();
        assert_eq!(stats.rows_valid + stats.rows_quarantined, 5);
        assert_eq!(quarantine.len(), 1);
        assert_eq!(quarantine.rows()[0].get("ResponseId"), Some("4"));
        assert_eq!(valid.len(), 4);
    }

    #[test]
    fn test_missing_required_columns_degrade_to_issue() {
        let mut table = Table::with_columns(["DevType", "survey_year"]);
        let mut row = Row::new();
        row.set("DevType", "Data scientist");
        row.set("survey_year", "2024");
        table.push_row(row);

        let config = PipelineConfig::default();
        let (valid, _, stats) = validate(&table, &config).unwrap();
        assert_eq!(valid.len(), 1);
        assert!(stats.issues.iter().any(|i| i.contains("Missing columns")));
    }

    #[test]
    fn test_no_key_columns_means_no_quarantine() {
        let mut table = Table::with_columns(["Country"]);
        let mut row = Row::new();
        row.set("Country", "Spain");
        table.push_row(row);

        let config = PipelineConfig::default();
        let (valid, quarantine, _) = validate(&table, &config).unwrap();
        assert_eq!(valid.len(), 1);
        assert!(quarantine.is_empty());
        assert_eq!(quarantine.columns(), valid.columns());
    }
}
