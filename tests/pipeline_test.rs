use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use survey_pipeline::cache::CacheStore;
use survey_pipeline::config::{self, PipelineConfig};
use survey_pipeline::pipeline::{PipelineRunner, RunParams, StageStats};
use tempfile::tempdir;

const HEADER: &str = "ResponseId,Country,DevType,WorkExp,ConvertedCompYearly";

fn test_config(data_root: &Path) -> PipelineConfig {
    PipelineConfig {
        data_root: data_root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn write_input_files(input_dir: &Path) -> Result<()> {
    fs::create_dir_all(input_dir)?;
    fs::write(
        input_dir.join("survey_2024.csv"),
        format!(
            "{HEADER}\n\
             1,USA,\"Developer, full-stack;Data scientist\",5,100000\n\
             2,United States of America,Data scientist,8,120000\n\
             3,Germany,Data scientist,3,-500\n\
             4,India,\"Developer, back-end\",2,50000000\n\
             5,UK,\"Developer, back-end\",10,75000\n\
             5,UK,\"Developer, back-end\",10,75000\n"
        ),
    )?;
    // The last row is blank apart from the compensation cell: with the year
    // stamped from the filename, two of three key columns are null, which
    // puts it over the quarantine threshold.
    fs::write(
        input_dir.join("survey_2025.csv"),
        format!(
            "{HEADER}\n\
             6,Japan,DevOps specialist,15,90000\n\
             7,Brazil,Data scientist,4,60000\n\
             ,,,,42\n"
        ),
    )?;
    Ok(())
}

fn run_full(
    config: &PipelineConfig,
    input: &Path,
    sample_pct: f64,
    seed: u64,
) -> Result<survey_pipeline::pipeline::RunReport> {
    let runner = PipelineRunner::new(config);
    let params = RunParams {
        input: input.to_path_buf(),
        sample_pct,
        seed,
        skip_cache: false,
    };
    Ok(runner.run(&params, None)?)
}

#[test]
fn test_end_to_end_run_produces_report_artifacts_and_cache() -> Result<()> {
    let workspace = tempdir()?;
    let input_dir = workspace.path().join("input");
    write_input_files(&input_dir)?;
    let config = test_config(&workspace.path().join("data"));

    let report = run_full(&config, &input_dir, 1.0, 42)?;
    
    assert!(report.ok, "run failed: {:?}", report.error);
    assert_eq!(report.stages.len(), 5);

    // Exact duplicate removed, sparse row quarantined.
    match report.stage(config::STAGE_VALIDATE) {
        Some(StageStats::Validate(stats)) => {
            assert_eq!(stats.duplicates_removed, 1);
            assert_eq!(stats.rows_quarantined, 1);
            assert_eq!(stats.rows_valid + stats.rows_quarantined, stats.rows_in - 1);
        }
        other => panic!("missing validate stats: {other:?}"),
    }

    // Stage artifacts on disk, one directory per stage plus the report.
    let run_dir = config.stage_root().join(&report.run_id);
    for stage in [
        config::STAGE_LOAD,
        config::STAGE_SAMPLE,
        config::STAGE_VALIDATE,
        config::STAGE_TRANSFORM,
        config::STAGE_ENRICH,
    ] {
        let dir = run_dir.join(stage);
        assert!(dir.join("output.csv").is_file(), "missing {stage} snapshot");
        assert!(dir.join("stats.json").is_file(), "missing {stage} stats");
        assert!(dir.join("manifest.json").is_file(), "missing {stage} manifest");
    }
    assert!(run_dir.join(config::STAGE_VALIDATE).join("quarantine.csv").is_file());
    assert!(config
        .stage_root()
        .join(format!("run_{}.json", report.run_id))
        .is_file());

    // Cache round-trip: the enriched row count survives into the snapshot.
    let cache = report.cache.as_ref().expect("cache outcome recorded");
    assert!(cache.ok, "cache build failed: {:?}", cache.message);
    let store = CacheStore::from_config(&config);
    let snapshot = store.read(None).expect("cache snapshot readable");
    assert_eq!(snapshot.len(), cache.rows);
    assert_eq!(store.stats().years, "2024, 2025");

    // Country aliases collapsed before materialization.
    let countries: BTreeSet<String> = snapshot
        .rows()
        .iter()
        .filter_map(|r| r.get("Country"))
        .map(|c| c.to_string())
        .collect();
    assert!(countries.contains("United States"));
    assert!(!countries.contains("USA"));
    assert!(!countries.contains("United States of America"));

    // Derived fields present with the fallback region bucket.
    assert!(snapshot.has_column("region_group"));
    assert!(snapshot.has_column("year_label"));
    assert!(snapshot
        .rows()
        .iter()
        .all(|r| r.get("_source") == Some(format!("pipeline-{}", report.run_id).as_str())));
    Ok(())
}

#[test]
fn test_first_token_rule_defines_strata() -> Result<()> {
    let workspace = tempdir()?;
    let input_dir = workspace.path().join("input");
    write_input_files(&input_dir)?;
    let config = test_config(&workspace.path().join("data"));

    let report = run_full(&config, &input_dir, 1.0, 42)?;
    match report.stage(config::STAGE_SAMPLE) {
        Some(StageStats::Sample(stats)) => {
            assert!(stats.strata.contains_key("Developer, full-stack"));
            assert!(stats.strata.contains_key("Data scientist"));
            assert!(stats.strata.contains_key("Unknown"));
            assert_eq!(stats.strata["Developer, full-stack"].original, 1);
        }
        other => panic!("missing sample stats: {other:?}"),
    }
    Ok(())
}

#[test]
fn test_sampling_reproducible_across_runs() -> Result<()> {
    let workspace = tempdir()?;
    let input_dir = workspace.path().join("input");
    write_input_files(&input_dir)?;

    let ids = |data_root: &Path| -> Result<BTreeSet<String>> {
        let config = test_config(data_root);
        let report = run_full(&config, &input_dir, 0.5, 7)?;
        assert!(report.ok);
        let snapshot = CacheStore::from_config(&config)
            .read(None)
            .expect("cache readable");
        Ok(snapshot
            .rows()
            .iter()
            .filter_map(|r| r.get("ResponseId"))
            .map(|v| v.to_string())
            .collect())
    };

    let first = ids(&workspace.path().join("data_a"))?;
    let second = ids(&workspace.path().join("data_b"))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_zip_archive_input() -> Result<()> {
    let workspace = tempdir()?;
    let zip_path = workspace.path().join("survey_2024.zip");
    {
        let file = fs::File::create(&zip_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<'_, ()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("survey_2024.csv", options)?;
        zip.write_all(
            format!("{HEADER}\n1,Canada,Data scientist,5,80000\n2,Spain,DevOps specialist,9,95000\n")
                .as_bytes(),
        )?;
        zip.finish()?;
    }
    let config = test_config(&workspace.path().join("data"));

    let report = run_full(&config, &zip_path, 1.0, 42)?;
    assert!(report.ok, "run failed: {:?}", report.error);
    let snapshot = CacheStore::from_config(&config)
        .read(Some("2024"))
        .expect("cache readable");
    assert_eq!(snapshot.len(), 2);
    Ok(())
}

#[test]
fn test_zero_input_files_is_precondition_failure() -> Result<()> {
    let workspace = tempdir()?;
    let input_dir = workspace.path().join("empty");
    fs::create_dir_all(&input_dir)?;
    let config = test_config(&workspace.path().join("data"));

    let report = run_full(&config, &input_dir, 0.05, 42)?;
    
    assert!(!report.ok);
    assert!(report
        .error
        .as_deref()
        .unwrap_or("")
        .contains("no CSV files"));
    assert!(report.stages.is_empty());
    assert!(report.cache.is_none());

    // The partial report is still persisted; no stage artifacts exist.
    assert!(config
        .stage_root()
        .join(format!("run_{}.json", report.run_id))
        .is_file());
    assert!(!config.stage_root().join(&report.run_id).exists());
    assert!(!CacheStore::from_config(&config).exists());
    Ok(())
}

#[test]
fn test_out_of_range_sample_pct_rejected_before_run() {
    let workspace = tempdir().unwrap();
    let config = test_config(&workspace.path().join("data"));
    let runner = PipelineRunner::new(&config);
    for pct in [0.0, -0.5, 1.5] {
        let params = RunParams {
            input: workspace.path().join("whatever"),
            sample_pct: pct,
            seed: 42,
            skip_cache: true,
        };
        assert!(runner.run(&params, None).is_err(), "pct {pct} accepted");
    }
    // Nothing was persisted for rejected parameters.
    assert!(!config.stage_root().exists() || fs::read_dir(config.stage_root()).unwrap().next().is_none());
}

#[test]
fn test_skip_cache_leaves_no_snapshot() -> Result<()> {
    let workspace = tempdir()?;
    let input_dir = workspace.path().join("input");
    write_input_files(&input_dir)?;
    let config = test_config(&workspace.path().join("data"));

    let runner = PipelineRunner::new(&config);
    let params = RunParams {
        input: input_dir,
        sample_pct: 1.0,
        seed: 42,
        skip_cache: true,
    };
    let report = runner.run(&params, None)?;
    assert!(report.ok);
    assert!(report.cache.is_none());
    assert!(!CacheStore::from_config(&config).exists());
    Ok(())
}

#[test]
fn test_progress_callback_receives_stage_lines() -> Result<()> {
    use std::sync::Mutex;

    let workspace = tempdir()?;
    let input_dir = workspace.path().join("input");
    write_input_files(&input_dir)?;
    let config = test_config(&workspace.path().join("data"));

    let lines: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let progress = |line: &str| lines.lock().unwrap().push(line.to_string());
    let runner = PipelineRunner::new(&config);
    let params = RunParams {
        input: input_dir,
        sample_pct: 1.0,
        seed: 42,
        skip_cache: false,
    };
    let report = runner.run(&params, Some(&progress))?;
    assert!(report.ok);

    let lines = lines.into_inner().unwrap();
    for marker in ["[1/6]", "[2/6]", "[3/6]", "[4/6]", "[5/6]", "[6/6]"] {
        assert!(
            lines.iter().any(|l| l.contains(marker)),
            "missing progress marker {marker}"
        );
    }
    assert!(lines.iter().any(|l| l.contains("Loaded survey_2024.csv")));
    Ok(())
}
