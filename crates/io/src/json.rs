// JSON export

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use microagg::{AggregatesError, Report, Result};

/// Export the full report (description, summary, tables, warnings) as JSON.
/// Missing cells are `null`.
pub fn export_report(report: &Report, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| AggregatesError::Io(format!("{}: {e}", path.display())))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report).map_err(|e| AggregatesError::Io(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use microagg::{run, AggregatesConfig, Entity, Scenario, TableSimulation};

    #[test]
    fn test_json_export() {
        let config = AggregatesConfig::from_toml(
            "name = \"json\"\nyear = 2013\nvariables = [\"rsa\", \"af\"]\nsources = [\"reference\"]\n[weights]\nhousehold = \"wprm\"\n",
        )
        .unwrap();
        let sim = TableSimulation::new(2013)
            .with_column("wprm", Entity::Household, vec![1_000.0, 500.0])
            .unwrap()
            .with_column("rsa", Entity::Household, vec![4_000.0, 0.0])
            .unwrap();
        let report = run(&config, Scenario::new(2013, Box::new(sim)), None).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_report(&report, &path).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let rows = parsed["base"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["measures"]["reference"]["amount"], 4.0);
        assert!(rows[1]["measures"]["reference"]["amount"].is_null());
        assert_eq!(parsed["summary"]["degraded_rows"], 1);
        assert_eq!(parsed["description"]["config_name"], "json");
    }
}
