use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_DB_NAME: &str = "survey_cache.db";
pub const DATA_TABLE: &str = "survey_data";
pub const META_TABLE: &str = "cache_meta";

/// Stage names in execution order, used as artifact directory keys.
pub const STAGE_LOAD: &str = "00_load";
pub const STAGE_SAMPLE: &str = "01_sample";
pub const STAGE_VALIDATE: &str = "02_validate";
pub const STAGE_TRANSFORM: &str = "03_transform";
pub const STAGE_ENRICH: &str = "04_enrich";

/// Pipeline configuration. Every field has a default so a config file is
/// optional; a partial TOML file overrides only the fields it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory for cache, stage artifacts and run reports.
    pub data_root: PathBuf,
    /// Column holding the unique response identifier.
    pub id_column: String,
    /// Column holding the respondent country.
    pub country_column: String,
    /// Column holding the semicolon-delimited role descriptor.
    pub role_column: String,
    /// Column holding the survey year.
    pub year_column: String,
    /// Column holding years of experience.
    pub experience_column: String,
    /// Compensation columns subject to outlier cleaning.
    pub compensation_columns: Vec<String>,
    /// Compensation column used for the tier bucketing during enrichment.
    pub comp_tier_column: String,
    /// Columns the validator reports as issues when absent.
    pub required_columns: Vec<String>,
    /// Default sampling fraction in (0, 1].
    pub sample_pct: f64,
    /// Minimum rows kept per stratum.
    pub min_per_stratum: usize,
    /// Default sampling seed.
    pub seed: u64,
    /// Rows whose key-column null fraction exceeds this go to quarantine.
    pub quarantine_null_threshold: f64,
    /// Compensation values above this are nulled as outliers.
    pub compensation_ceiling: f64,
    /// Skip `*schema*` files during load.
    pub skip_schema_files: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            id_column: "ResponseId".to_string(),
            country_column: "Country".to_string(),
            role_column: "DevType".to_string(),
            year_column: "survey_year".to_string(),
            experience_column: "WorkExp".to_string(),
            compensation_columns: vec![
                "CompTotal".to_string(),
                "ConvertedCompYearly".to_string(),
            ],
            comp_tier_column: "ConvertedCompYearly".to_string(),
            required_columns: vec!["ResponseId".to_string(), "Country".to_string()],
            sample_pct: 0.05,
            min_per_stratum: 1,
            seed: 42,
            quarantine_null_threshold: 0.5,
            compensation_ceiling: 10_000_000.0,
            skip_schema_files: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Key columns used for the validator's null-fraction quarantine rule.
    pub fn key_columns(&self) -> Vec<String> {
        vec![
            self.id_column.clone(),
            self.role_column.clone(),
            self.year_column.clone(),
        ]
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_root.join("cache").join(CACHE_DB_NAME)
    }

    pub fn stage_root(&self) -> PathBuf {
        self.data_root.join("stages")
    }

    /// Create the data directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.data_root.join("cache"))?;
        fs::create_dir_all(self.stage_root())?;
        Ok(())
    }
}
