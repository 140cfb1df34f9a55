//! Per-stage input-schema contracts.
//!
//! Each stage declares the columns it needs up front; the check runs once
//! at the stage boundary so schema drift surfaces in one place instead of
//! silently skipping work scattered through the stage bodies.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Declared column requirements for one stage.
#[derive(Debug, Clone)]
pub struct ColumnContract {
    pub stage: &'static str,
    /// Columns the stage cannot run without.
    pub required: Vec<String>,
    /// Columns the stage uses when present and skips otherwise.
    pub optional: Vec<String>,
}

/// Outcome of checking a contract against a concrete table.
#[derive(Debug, Clone, Default)]
pub struct ContractCheck {
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl ContractCheck {
    /// Issue lines for stage stats, one per missing column set.
    pub fn issues(&self, stage: &str) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.missing_required.is_empty() {
            issues.push(format!(
                "{stage}: missing columns: {:?}",
                self.missing_required
            ));
        }
        if !self.missing_optional.is_empty() {
            issues.push(format!(
                "{stage}: optional columns absent, derived fields skipped: {:?}",
                self.missing_optional
            ));
        }
        issues
    }
}

impl ColumnContract {
    pub fn check(&self, table: &Table) -> ContractCheck {
        ContractCheck {
            missing_required: self
                .required
                .iter()
                .filter(|c| !table.has_column(c))
                .cloned()
                .collect(),
            missing_optional: self
                .optional
                .iter()
                .filter(|c| !table.has_column(c))
                .cloned()
                .collect(),
        }
    }

    /// Check and fail hard when a required column is absent. Used by stages
    /// whose contract is a precondition rather than a degraded mode.
    pub fn enforce(&self, table: &Table) -> Result<ContractCheck> {
        let check = self.check(table);
        if let Some(missing) = check.missing_required.first() {
            return Err(PipelineError::MissingColumn(format!(
                "{} (required by {})",
                missing, self.stage
            )));
        }
        Ok(check)
    }
}

pub fn sample_contract(config: &PipelineConfig) -> ColumnContract {
    ColumnContract {
        stage: "sample",
        required: vec![config.role_column.clone()],
        optional: Vec::new(),
    }
}

pub fn validate_contract(config: &PipelineConfig) -> ColumnContract {
    ColumnContract {
        stage: "validate",
        required: config.required_columns.clone(),
        optional: config.key_columns(),
    }
}

pub fn transform_contract(config: &PipelineConfig) -> ColumnContract {
    let mut optional = vec![
        config.year_column.clone(),
        config.country_column.clone(),
        config.experience_column.clone(),
    ];
    optional.extend(config.compensation_columns.iter().cloned());
    ColumnContract {
        stage: "transform",
        required: Vec::new(),
        optional,
    }
}

pub fn enrich_contract(config: &PipelineConfig) -> ColumnContract {
    ColumnContract {
        stage: "enrich",
        required: Vec::new(),
        optional: vec![
            config.year_column.clone(),
            config.country_column.clone(),
            config.experience_column.clone(),
            config.comp_tier_column.clone(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforce_fails_on_missing_required_column() {
        let config = PipelineConfig::default();
        let table = Table::with_columns(["ResponseId"]);
        let err = sample_contract(&config).enforce(&table).unwrap_err();
        assert!(err.to_string().contains("DevType"));
    }

    #[test]
    fn test_check_reports_optional_without_failing() {
        let config = PipelineConfig::default();
        let table = Table::with_columns(["ResponseId", "Country"]);
        let check = validate_contract(&config).check(&table);
        assert!(check.missing_required.is_empty());
        assert!(check.missing_optional.contains(&"DevType".to_string()));
        assert!(!check.issues("validate").is_empty());
    }
}
