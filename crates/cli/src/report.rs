//! `microagg run|validate|totals`: config-driven aggregate reports.

use std::path::{Path, PathBuf};

use microagg::model::{Metric, Report, Source};
use microagg::{AggregatesConfig, TotalsLoader, TotalsStore};
use microagg_io::{default_report_name, load_scenario, save_report, store_from_config, ReportFormat};

use crate::CliError;

/// Read and validate a config; `year` overrides the simulated year.
fn load_config(config_path: &Path, year: Option<i32>) -> Result<AggregatesConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::runtime(format!("cannot read config: {e}")))?;
    let mut config = AggregatesConfig::from_toml(&config_str)?;
    if let Some(year) = year {
        config.year = year;
    }
    check_files(&config)?;
    log::info!("config '{}' for {} from {}", config.name, config.year, config_path.display());
    Ok(config)
}

/// Checks that need the config to describe files.
fn check_files(config: &AggregatesConfig) -> Result<(), CliError> {
    if config.data.reference.is_none() {
        return Err(CliError::config("no [data.reference] section")
            .with_hint("list the reference simulation's entity files under [data.reference]"));
    }
    if config.sources.contains(&Source::Actual) && config.totals.is_none() {
        return Err(CliError::config("source 'actual' needs a [totals] section")
            .with_hint("add [totals] with amounts/beneficiaries files, or drop 'actual' from sources"));
    }
    Ok(())
}

/// Paths in the config are relative to the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn totals_store(config: &AggregatesConfig, base_dir: &Path) -> Result<Option<Box<dyn TotalsStore>>, CliError> {
    match config.totals {
        Some(ref totals) => Ok(Some(store_from_config(totals, base_dir)?)),
        None => Ok(None),
    }
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output: Option<PathBuf>,
    year: Option<i32>,
) -> Result<(), CliError> {
    let config = load_config(&config_path, year)?;
    let base_dir = base_dir(&config_path);

    let scenario = load_scenario(&config, base_dir)?;
    let store = totals_store(&config, base_dir)?;
    let report = microagg::run(&config, scenario, store)?;

    if let Some(path) = output {
        let path = if path.is_dir() {
            let today = chrono::Local::now().date_naive();
            path.join(default_report_name(ReportFormat::Xlsx, today))
        } else {
            path
        };
        save_report(&report, &path)?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    print_summary(&report);
    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &Report) {
    let s = &report.summary;
    eprintln!(
        "{}: {} variables for {}, {} complete, {} degraded, {} warnings",
        report.description.config_name,
        s.variables,
        report.description.period,
        s.complete_rows,
        s.degraded_rows,
        s.warnings,
    );
    for (source, missing) in &s.missing_cells {
        if *missing > 0 {
            eprintln!("  {source}: {missing} missing cells");
        }
    }
    for w in &report.base.warnings {
        eprintln!("warning: {}", w.message);
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path, None)?;
    let sources: Vec<&str> = config.sources.iter().map(|s| s.as_str()).collect();
    eprintln!(
        "valid: '{}' for {} with {} variable(s), sources [{}], {} comparison(s)",
        config.name,
        config.year,
        config.variable_list().len(),
        sources.join(", "),
        config.comparisons.len(),
    );
    Ok(())
}

pub fn cmd_totals(config_path: PathBuf, year: Option<i32>, json_output: bool) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| CliError::runtime(format!("cannot read config: {e}")))?;
    let config = AggregatesConfig::from_toml(&config_str)?;
    let year = year.unwrap_or(config.year);

    let Some(store) = totals_store(&config, base_dir(&config_path))? else {
        return Err(CliError::args("config has no [totals] section"));
    };
    let mut loader = TotalsLoader::new(store);
    if let Some(corrections) = config.totals.as_ref().and_then(|t| t.corrections.clone()) {
        loader = loader.with_corrections(corrections);
    }
    let totals = loader.load(year)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&totals)
            .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    let cell = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".into());
    println!("{:<24} {:>14} {:>14}", "variable", "amount (M)", "benef. (k)");
    for (variable, measure) in &totals.rows {
        println!(
            "{:<24} {:>14} {:>14}",
            variable,
            cell(measure.get(Metric::Amount)),
            cell(measure.get(Metric::Beneficiaries)),
        );
    }
    Ok(())
}
